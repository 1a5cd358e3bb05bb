use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::shared::Relationships;

pub type ASN = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AS {
    pub asn: ASN,
    pub peers: Vec<ASN>,
    pub providers: Vec<ASN>,
    pub customers: Vec<ASN>,
    pub tier_1: bool,
    pub ixp: bool,
}

impl AS {
    pub fn new(asn: ASN) -> Self {
        AS {
            asn,
            peers: Vec::new(),
            providers: Vec::new(),
            customers: Vec::new(),
            tier_1: false,
            ixp: false,
        }
    }

    pub fn from_asn_lists(
        asn: ASN,
        peer_asns: Vec<ASN>,
        provider_asns: Vec<ASN>,
        customer_asns: Vec<ASN>,
    ) -> Self {
        AS {
            asn,
            peers: peer_asns,
            providers: provider_asns,
            customers: customer_asns,
            tier_1: false,
            ixp: false,
        }
    }

    pub fn get_neighbors(&self, rel: Relationships) -> &[ASN] {
        match rel {
            Relationships::Providers => &self.providers,
            Relationships::Peers => &self.peers,
            Relationships::Customers => &self.customers,
        }
    }

    /// A leaf has no customers and therefore an empty customer cone.
    pub fn is_stub(&self) -> bool {
        self.customers.is_empty()
    }
}

/// Relation lists of one AS as stored in `as_graph.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RelationLists {
    #[serde(default, with = "crate::asn_serde::list")]
    p2p: Vec<ASN>,
    #[serde(default, with = "crate::asn_serde::list")]
    p2c: Vec<ASN>,
    #[serde(default, with = "crate::asn_serde::list")]
    c2p: Vec<ASN>,
}

/// Directed AS relationship graph.
///
/// Every relationship is mirrored: a customer edge on the provider implies a provider edge on the
/// customer, and peer edges exist on both ends. No relation list contains duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ASGraph {
    pub as_dict: BTreeMap<ASN, AS>,
}

impl ASGraph {
    pub fn new() -> Self {
        ASGraph {
            as_dict: BTreeMap::new(),
        }
    }

    pub fn get(&self, asn: &ASN) -> Option<&AS> {
        self.as_dict.get(asn)
    }

    pub fn get_mut(&mut self, asn: &ASN) -> Option<&mut AS> {
        self.as_dict.get_mut(asn)
    }

    pub fn insert(&mut self, as_obj: AS) {
        self.as_dict.insert(as_obj.asn, as_obj);
    }

    pub fn iter(&self) -> impl Iterator<Item = &AS> {
        self.as_dict.values()
    }

    pub fn len(&self) -> usize {
        self.as_dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_dict.is_empty()
    }

    fn entry(&mut self, asn: ASN) -> &mut AS {
        self.as_dict.entry(asn).or_insert_with(|| AS::new(asn))
    }

    /// Add a provider-to-customer relationship, creating both nodes if needed.
    pub fn add_provider_customer(&mut self, provider: ASN, customer: ASN) {
        push_unique(&mut self.entry(provider).customers, customer);
        push_unique(&mut self.entry(customer).providers, provider);
    }

    /// Add a peer relationship on both ends, creating both nodes if needed.
    pub fn add_peers(&mut self, a: ASN, b: ASN) {
        push_unique(&mut self.entry(a).peers, b);
        push_unique(&mut self.entry(b).peers, a);
    }

    /// Check that `root` can span a customer cone: it must exist and have at least one customer.
    pub fn validate_cone_root(&self, root: ASN) -> Result<()> {
        match self.get(&root) {
            None => Err(Error::RootNotFound(root)),
            Some(as_obj) if as_obj.is_stub() => Err(Error::RootIsLeaf(root)),
            Some(_) => Ok(()),
        }
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        let lists: BTreeMap<String, RelationLists> = self
            .as_dict
            .values()
            .map(|as_obj| {
                (
                    as_obj.asn.to_string(),
                    RelationLists {
                        p2p: as_obj.peers.clone(),
                        p2c: as_obj.customers.clone(),
                        c2p: as_obj.providers.clone(),
                    },
                )
            })
            .collect();
        Ok(serde_json::to_value(lists)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let lists: BTreeMap<ASN, RelationLists> = serde_json::from_str(json)?;
        Ok(Self::from_relation_lists(lists))
    }

    fn from_relation_lists(lists: BTreeMap<ASN, RelationLists>) -> Self {
        let as_dict = lists
            .into_iter()
            .map(|(asn, l)| (asn, AS::from_asn_lists(asn, l.p2p, l.c2p, l.p2c)))
            .collect();
        ASGraph { as_dict }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.to_json_value()?)?;
        log::info!("AS graph saved to {}", path.display());
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let lists: BTreeMap<ASN, RelationLists> = serde_json::from_reader(reader)?;
        Ok(Self::from_relation_lists(lists))
    }
}

fn push_unique(list: &mut Vec<ASN>, asn: ASN) {
    if !list.contains(&asn) {
        list.push(asn);
    }
}
