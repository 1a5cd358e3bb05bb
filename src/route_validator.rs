//! Route origin authorizations of the lab and an offline origin validator over them.
//!
//! The ROAs are published by the RPKI server at startup; the validator predicts the state the
//! RPKI-enabled routers will assign to an announcement.

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use lru::LruCache;

use crate::address_plan::AddressPlan;
use crate::as_graph::ASN;
use crate::error::{Error, Result};
use crate::policy::route_map::RpkiState;
use crate::shared::CommonAddresses;

const CACHE_SIZE: usize = 1024;

/// Outcome of checking one announcement against one ROA. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ROAValidity {
    Valid = 0,
    Unknown = 1,
    InvalidLength = 2,
    InvalidOrigin = 3,
    InvalidLengthAndOrigin = 4,
}

impl ROAValidity {
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            ROAValidity::InvalidLength
                | ROAValidity::InvalidOrigin
                | ROAValidity::InvalidLengthAndOrigin
        )
    }

    /// State matched by `match rpki` in a route-map.
    pub fn rpki_state(&self) -> RpkiState {
        match self {
            ROAValidity::Valid => RpkiState::Valid,
            ROAValidity::Unknown => RpkiState::NotFound,
            _ => RpkiState::Invalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ROA {
    pub prefix: IpNetwork,
    pub origin: ASN,
    pub max_length: u8,
}

impl ROA {
    /// Without `max_length`, only the exact prefix length is authorized.
    pub fn new(prefix: IpNetwork, origin: ASN, max_length: Option<u8>) -> Self {
        let max_length = max_length.unwrap_or_else(|| prefix.prefix());
        ROA {
            prefix,
            origin,
            max_length,
        }
    }

    /// An origin of 0 authorizes nobody.
    pub fn is_routed(&self) -> bool {
        self.origin != 0
    }

    pub fn covers_prefix(&self, prefix: &IpNetwork) -> bool {
        match (self.prefix, prefix) {
            (IpNetwork::V4(roa_net), IpNetwork::V4(prefix_net)) => {
                roa_net.contains(prefix_net.ip()) && prefix_net.prefix() >= roa_net.prefix()
            }
            (IpNetwork::V6(roa_net), IpNetwork::V6(prefix_net)) => {
                roa_net.contains(prefix_net.ip()) && prefix_net.prefix() >= roa_net.prefix()
            }
            _ => false,
        }
    }

    pub fn get_validity(&self, prefix: &IpNetwork, origin: ASN) -> ROAValidity {
        if !self.covers_prefix(prefix) {
            return ROAValidity::Unknown;
        }
        let valid_length = prefix.prefix() <= self.max_length;
        let valid_origin = self.is_routed() && self.origin == origin;
        match (valid_length, valid_origin) {
            (true, true) => ROAValidity::Valid,
            (false, true) => ROAValidity::InvalidLength,
            (true, false) => ROAValidity::InvalidOrigin,
            (false, false) => ROAValidity::InvalidLengthAndOrigin,
        }
    }
}

/// `<prefix> => <asn>`, the form the RPKI server CLI takes.
impl fmt::Display for ROA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max_length == self.prefix.prefix() {
            write!(f, "{} => {}", self.prefix, self.origin)
        } else {
            write!(f, "{}-{} => {}", self.prefix, self.max_length, self.origin)
        }
    }
}

impl FromStr for ROA {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("malformed ROA {:?}", s));
        let (prefix_part, origin) = s.split_once("=>").ok_or_else(invalid)?;
        let origin: ASN = origin.trim().parse().map_err(|_| invalid())?;
        let (prefix, max_length) = match prefix_part.trim().split_once('-') {
            Some((prefix, max)) => (prefix, Some(max.parse().map_err(|_| invalid())?)),
            None => (prefix_part.trim(), None),
        };
        Ok(ROA::new(prefix.parse()?, origin, max_length))
    }
}

/// ROAs issued for the lab: one per RPKI-enabled AS for its internal /24. The first RPKI-enabled
/// AS in synthesis order also gets the RPKI server LAN, listed before its own prefix.
pub fn roa_entries(plan: &AddressPlan) -> Result<Vec<ROA>> {
    let mut roas = Vec::new();
    let mut first = true;
    for record in plan.iter().filter(|record| record.is_rpki()) {
        if first {
            roas.push(ROA::new(CommonAddresses::KRILL_LAN.parse()?, record.asn, None));
            first = false;
        }
        roas.push(ROA::new(
            IpNetwork::V4(record.internal_prefix()?),
            record.asn,
            None,
        ));
    }
    Ok(roas)
}

#[derive(Debug, Default)]
struct ROASNode {
    roas: Vec<ROA>,
    children: [Option<Box<ROASNode>>; 2],
}

fn prefix_bits(prefix: &IpNetwork) -> Vec<usize> {
    match prefix {
        IpNetwork::V4(net) => {
            let addr = u32::from(net.ip());
            (0..net.prefix() as u32)
                .map(|i| ((addr >> (31 - i)) & 1) as usize)
                .collect()
        }
        IpNetwork::V6(net) => {
            let addr = u128::from(net.ip());
            (0..net.prefix() as u32)
                .map(|i| ((addr >> (127 - i)) & 1) as usize)
                .collect()
        }
    }
}

/// Binary prefix trie of ROAs with a memo of recent lookups.
pub struct RouteValidator {
    v4: ROASNode,
    v6: ROASNode,
    cache: RefCell<LruCache<(IpNetwork, ASN), ROAValidity>>,
}

impl RouteValidator {
    pub fn new() -> Self {
        let size = NonZeroUsize::new(CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        RouteValidator {
            v4: ROASNode::default(),
            v6: ROASNode::default(),
            cache: RefCell::new(LruCache::new(size)),
        }
    }

    pub fn from_roas<I: IntoIterator<Item = ROA>>(roas: I) -> Self {
        let mut validator = Self::new();
        for roa in roas {
            validator.add_roa(roa);
        }
        validator
    }

    fn root(&self, prefix: &IpNetwork) -> &ROASNode {
        match prefix {
            IpNetwork::V4(_) => &self.v4,
            IpNetwork::V6(_) => &self.v6,
        }
    }

    pub fn add_roa(&mut self, roa: ROA) {
        let mut node = match roa.prefix {
            IpNetwork::V4(_) => &mut self.v4,
            IpNetwork::V6(_) => &mut self.v6,
        };
        for bit in prefix_bits(&roa.prefix) {
            node = &mut **node.children[bit].get_or_insert_with(Box::default);
        }
        if !node.roas.contains(&roa) {
            node.roas.push(roa);
        }
        self.cache.borrow_mut().clear();
    }

    /// Every ROA on the path from the trie root to `prefix`.
    fn get_relevant_roas(&self, prefix: &IpNetwork) -> Vec<&ROA> {
        let mut relevant = Vec::new();
        let mut node = self.root(prefix);
        let bits = prefix_bits(prefix);
        let mut remaining = bits.iter();
        loop {
            relevant.extend(node.roas.iter().filter(|roa| roa.covers_prefix(prefix)));
            let next = remaining
                .next()
                .and_then(|bit| node.children[*bit].as_deref());
            match next {
                Some(child) => node = child,
                None => break,
            }
        }
        relevant
    }

    /// Best validity of `prefix` originated by `origin` over all covering ROAs.
    pub fn get_roa_outcome(&self, prefix: &IpNetwork, origin: ASN) -> ROAValidity {
        if let Some(result) = self.cache.borrow_mut().get(&(*prefix, origin)) {
            return *result;
        }
        let result = self
            .get_relevant_roas(prefix)
            .into_iter()
            .map(|roa| roa.get_validity(prefix, origin))
            .min()
            .unwrap_or(ROAValidity::Unknown);
        self.cache.borrow_mut().put((*prefix, origin), result);
        result
    }

    /// State an RPKI-enabled router assigns to `prefix` originated by `origin`.
    pub fn predict(&self, prefix: &IpNetwork, origin: ASN) -> RpkiState {
        self.get_roa_outcome(prefix, origin).rpki_state()
    }
}

impl Default for RouteValidator {
    fn default() -> Self {
        Self::new()
    }
}
