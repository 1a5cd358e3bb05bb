use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Relationship kinds as seen from the AS owning the relation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relationships {
    /// `p2p`
    Peers,
    /// `p2c`: the listed neighbors are customers of this AS.
    Customers,
    /// `c2p`: the listed neighbors are providers of this AS.
    Providers,
}

impl Relationships {
    /// Iteration order used by every synthesis stage.
    pub const ALL: [Relationships; 3] = [
        Relationships::Peers,
        Relationships::Customers,
        Relationships::Providers,
    ];

    pub fn invert(&self) -> Self {
        match self {
            Relationships::Providers => Relationships::Customers,
            Relationships::Customers => Relationships::Providers,
            Relationships::Peers => Relationships::Peers,
        }
    }

    /// Key used in the topology artifacts.
    pub fn key(&self) -> &'static str {
        match self {
            Relationships::Peers => "p2p",
            Relationships::Customers => "p2c",
            Relationships::Providers => "c2p",
        }
    }

    /// FRR `local-role` of this AS towards a neighbor of this kind.
    pub fn local_role(&self) -> &'static str {
        match self {
            Relationships::Peers => "peer",
            Relationships::Customers => "provider",
            Relationships::Providers => "customer",
        }
    }
}

impl fmt::Display for Relationships {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// `"yes"` / `"no"` flag as written by the selection front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    #[default]
    No,
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

impl From<YesNo> for bool {
    fn from(value: YesNo) -> Self {
        value == YesNo::Yes
    }
}

/// Addresses of the RPKI server segment shared by every lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonAddresses;

impl CommonAddresses {
    pub const ROUTER_TO_KRILL: Ipv4Addr = Ipv4Addr::new(115, 115, 115, 1);
    pub const KRILL: Ipv4Addr = Ipv4Addr::new(115, 115, 115, 2);
    pub const KRILL_LAN: &'static str = "115.115.115.0/24";
}

/// Name of the emulated machine hosting the router of an AS.
pub fn router_name(asn: u32) -> String {
    format!("router{}", asn)
}

/// Inverse of [`router_name`].
pub fn asn_from_router_name(name: &str) -> Option<u32> {
    name.strip_prefix("router")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_name_round_trip() {
        assert_eq!(router_name(65001), "router65001");
        assert_eq!(asn_from_router_name("router65001"), Some(65001));
        assert_eq!(asn_from_router_name("krill"), None);
    }

    #[test]
    fn test_invert() {
        assert_eq!(Relationships::Customers.invert(), Relationships::Providers);
        assert_eq!(Relationships::Peers.invert(), Relationships::Peers);
    }
}
