//! Extraction of the customer cone of a root AS.
//!
//! The cone contains every AS reachable from the root through zero or more provider-to-customer
//! hops, together with the smallest and largest hop count at which the traversal met it.

pub mod statistics;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::as_graph::{ASGraph, ASN};
use crate::error::{Error, Result};
use crate::shared::Relationships;

/// One member of a customer cone.
///
/// Levels are written as numbers but read from numbers or decimal strings, the form older
/// topology files use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConeNode {
    #[serde(rename = "levelMin", deserialize_with = "crate::asn_serde::deserialize")]
    pub level_min: u32,
    #[serde(rename = "levelMax", deserialize_with = "crate::asn_serde::deserialize")]
    pub level_max: u32,
    #[serde(default, with = "crate::asn_serde::list")]
    pub p2p: Vec<ASN>,
    #[serde(default, with = "crate::asn_serde::list")]
    pub p2c: Vec<ASN>,
    #[serde(default, with = "crate::asn_serde::list")]
    pub c2p: Vec<ASN>,
}

impl ConeNode {
    fn new(depth: u32, customers: Vec<ASN>) -> Self {
        ConeNode {
            level_min: depth,
            level_max: depth,
            p2p: Vec::new(),
            p2c: customers,
            c2p: Vec::new(),
        }
    }

    pub fn get_neighbors(&self, rel: Relationships) -> &[ASN] {
        match rel {
            Relationships::Peers => &self.p2p,
            Relationships::Customers => &self.p2c,
            Relationships::Providers => &self.c2p,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.p2c.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerCone {
    root: ASN,
    nodes: BTreeMap<ASN, ConeNode>,
}

impl CustomerCone {
    /// Compute the customer cone of `root`.
    ///
    /// The root is not validated here; see [`ASGraph::validate_cone_root`].
    pub fn build(graph: &ASGraph, root: ASN) -> Result<Self> {
        let mut nodes: BTreeMap<ASN, ConeNode> = BTreeMap::new();
        // no simple provider-to-customer path is longer than the graph
        let depth_limit = graph.len() as u32;
        let mut cycle_reported = false;

        // children are pushed in reverse, so the visiting order is the one of a recursive DFS
        let mut stack: Vec<(ASN, u32)> = vec![(root, 0)];
        while let Some((asn, depth)) = stack.pop() {
            let as_obj = graph.get(&asn).ok_or(Error::UnknownAs(asn))?;

            match nodes.get_mut(&asn) {
                // reached again through a customer cycle; the root stays at 0/0
                Some(_) if asn == root => continue,
                Some(node) => {
                    if depth < node.level_min {
                        node.level_min = depth;
                    }
                    if depth > node.level_max {
                        node.level_max = depth;
                    } else {
                        continue;
                    }
                }
                None => {
                    nodes.insert(asn, ConeNode::new(depth, as_obj.customers.clone()));
                }
            }

            if depth >= depth_limit {
                if !cycle_reported {
                    warn!("Customer relationships below AS {} form a cycle", root);
                    cycle_reported = true;
                }
                continue;
            }

            for &customer in as_obj.customers.iter().rev() {
                stack.push((customer, depth + 1));
            }
        }

        // restrict peers and providers to cone members
        let members: Vec<ASN> = nodes.keys().copied().collect();
        for asn in members {
            let as_obj = graph.get(&asn).ok_or(Error::UnknownAs(asn))?;
            let p2p: Vec<ASN> = as_obj
                .peers
                .iter()
                .copied()
                .filter(|peer| nodes.contains_key(peer))
                .collect();
            let c2p: Vec<ASN> = as_obj
                .providers
                .iter()
                .copied()
                .filter(|provider| nodes.contains_key(provider))
                .collect();
            if let Some(node) = nodes.get_mut(&asn) {
                node.p2p = p2p;
                node.c2p = c2p;
            }
        }

        info!("Customer cone of AS {} has {} members", root, nodes.len());
        Ok(CustomerCone { root, nodes })
    }

    /// Rebuild a cone from its serialized members. The root is the member at depth 0.
    pub fn from_nodes(nodes: BTreeMap<ASN, ConeNode>) -> Result<Self> {
        let root = nodes
            .iter()
            .find(|(_, node)| node.level_min == 0)
            .map(|(asn, _)| *asn)
            .ok_or_else(|| Error::InvalidConfig("customer cone without a root".to_string()))?;
        Ok(CustomerCone { root, nodes })
    }

    pub fn root(&self) -> ASN {
        self.root
    }

    pub fn get(&self, asn: &ASN) -> Option<&ConeNode> {
        self.nodes.get(asn)
    }

    pub fn contains(&self, asn: &ASN) -> bool {
        self.nodes.contains_key(asn)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ASN, &ConeNode)> {
        self.nodes.iter()
    }

    /// Order in which every synthesis stage visits the members: the root, then ascending AS
    /// numbers.
    pub fn synthesis_order(&self) -> Vec<ASN> {
        std::iter::once(self.root)
            .chain(self.nodes.keys().copied().filter(|asn| *asn != self.root))
            .collect()
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.nodes)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_nodes(serde_json::from_str(json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.nodes)?;
        info!("Customer cone saved to {}", path.display());
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Self::from_nodes(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revisit_at_lower_depth_does_not_redescend() {
        // 1 -> 2 -> 3 -> 4 and the shortcut 1 -> 3
        let mut graph = ASGraph::new();
        graph.add_provider_customer(1, 2);
        graph.add_provider_customer(2, 3);
        graph.add_provider_customer(3, 4);
        graph.add_provider_customer(1, 3);

        let cone = CustomerCone::build(&graph, 1).unwrap();
        let node3 = cone.get(&3).unwrap();
        assert_eq!((node3.level_min, node3.level_max), (1, 2));
        // 4 was only reached through the deeper path
        let node4 = cone.get(&4).unwrap();
        assert_eq!((node4.level_min, node4.level_max), (3, 3));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = ASGraph::new();
        graph.add_provider_customer(1, 2);
        graph.add_provider_customer(2, 3);
        graph.add_provider_customer(3, 2);

        let cone = CustomerCone::build(&graph, 1).unwrap();
        assert_eq!(cone.len(), 3);
        for (_, node) in cone.iter() {
            assert!(node.level_min <= node.level_max);
        }
    }
}
