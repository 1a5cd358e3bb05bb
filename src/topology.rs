//! The customer cone enriched with the per-node lab roles: RPKI validation, route collector
//! peering, and the hacker/victim pair of the experiment.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::as_graph::ASN;
use crate::customer_cone::{ConeNode, CustomerCone};
use crate::error::{Error, Result};
use crate::shared::{Relationships, YesNo};

/// Nodes picked for every role of the experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelection {
    #[serde(default)]
    pub rpki_nodes: BTreeSet<ASN>,
    #[serde(default)]
    pub collector_nodes: BTreeSet<ASN>,
    pub hacker_node: ASN,
    pub victim_node: ASN,
}

impl NodeSelection {
    /// Pick `adoption_rpki` percent of the members as RPKI validators and
    /// `adoption_collector` percent as collector peers, then a distinct hacker and victim.
    pub fn random(
        cone: &CustomerCone,
        adoption_rpki: f64,
        adoption_collector: f64,
        seed: u64,
    ) -> Result<Self> {
        let all_nodes: Vec<ASN> = cone.iter().map(|(asn, _)| *asn).collect();
        if all_nodes.len() < 2 {
            return Err(Error::InvalidConfig(
                "need at least two ASes to pick a hacker and a victim".to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);

        let amount = |percent: f64| ((all_nodes.len() as f64) * percent / 100.0) as usize;
        let rpki_nodes = all_nodes
            .choose_multiple(&mut rng, amount(adoption_rpki))
            .copied()
            .collect();
        let collector_nodes = all_nodes
            .choose_multiple(&mut rng, amount(adoption_collector))
            .copied()
            .collect();

        let hacker_node = *all_nodes
            .choose(&mut rng)
            .ok_or(Error::InvalidConfig("empty customer cone".to_string()))?;
        let others: Vec<ASN> = all_nodes
            .iter()
            .copied()
            .filter(|asn| *asn != hacker_node)
            .collect();
        let victim_node = *others
            .choose(&mut rng)
            .ok_or(Error::InvalidConfig("empty customer cone".to_string()))?;

        Ok(NodeSelection {
            rpki_nodes,
            collector_nodes,
            hacker_node,
            victim_node,
        })
    }

    /// Every selected node must belong to the cone and the hacker must differ from the victim.
    pub fn validate(&self, cone: &CustomerCone) -> Result<()> {
        if self.hacker_node == self.victim_node {
            return Err(Error::InvalidConfig(format!(
                "hacker and victim are both AS {}",
                self.hacker_node
            )));
        }
        let selected = self
            .rpki_nodes
            .iter()
            .chain(self.collector_nodes.iter())
            .chain([&self.hacker_node, &self.victim_node]);
        for asn in selected {
            if !cone.contains(asn) {
                return Err(Error::UnknownAs(*asn));
            }
        }
        Ok(())
    }
}

/// A cone member with its lab flags, as stored in `topology_rpki_coll.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    #[serde(flatten)]
    pub node: ConeNode,
    #[serde(default)]
    pub collector: YesNo,
    #[serde(default)]
    pub rpki: YesNo,
}

impl TopologyNode {
    pub fn get_neighbors(&self, rel: Relationships) -> &[ASN] {
        self.node.get_neighbors(rel)
    }

    pub fn is_rpki(&self) -> bool {
        self.rpki.into()
    }

    pub fn is_collector(&self) -> bool {
        self.collector.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    root: ASN,
    nodes: BTreeMap<ASN, TopologyNode>,
}

impl Topology {
    pub fn enrich(
        cone: &CustomerCone,
        rpki_nodes: &BTreeSet<ASN>,
        collector_nodes: &BTreeSet<ASN>,
    ) -> Self {
        let nodes = cone
            .iter()
            .map(|(asn, node)| {
                (
                    *asn,
                    TopologyNode {
                        node: node.clone(),
                        collector: collector_nodes.contains(asn).into(),
                        rpki: rpki_nodes.contains(asn).into(),
                    },
                )
            })
            .collect();
        Topology {
            root: cone.root(),
            nodes,
        }
    }

    pub fn from_nodes(nodes: BTreeMap<ASN, TopologyNode>) -> Result<Self> {
        let root = nodes
            .iter()
            .find(|(_, node)| node.node.level_min == 0)
            .map(|(asn, _)| *asn)
            .ok_or_else(|| Error::InvalidConfig("topology without a root".to_string()))?;
        Ok(Topology { root, nodes })
    }

    pub fn root(&self) -> ASN {
        self.root
    }

    pub fn get(&self, asn: &ASN) -> Option<&TopologyNode> {
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

    pub fn iter(&self) -> impl Iterator<Item = (&ASN, &TopologyNode)> {
        self.nodes.iter()
    }

    /// The root, then ascending AS numbers.
    pub fn synthesis_order(&self) -> Vec<ASN> {
        std::iter::once(self.root)
            .chain(self.nodes.keys().copied().filter(|asn| *asn != self.root))
            .collect()
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.nodes)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.nodes)?;
        info!("Topology saved to {}", path.display());
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Self::from_nodes(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_nodes(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::as_graph::ASGraph;

    fn cone() -> CustomerCone {
        let mut graph = ASGraph::new();
        for customer in 2..=9 {
            graph.add_provider_customer(1, customer);
        }
        CustomerCone::build(&graph, 1).unwrap()
    }

    #[test]
    fn test_random_selection_is_seeded() {
        let cone = cone();
        let first = NodeSelection::random(&cone, 50.0, 25.0, 7).unwrap();
        let second = NodeSelection::random(&cone, 50.0, 25.0, 7).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.rpki_nodes.len(), 4);
        assert_eq!(first.collector_nodes.len(), 2);
        assert_ne!(first.hacker_node, first.victim_node);
        first.validate(&cone).unwrap();
    }

    #[test]
    fn test_enriched_flags_serialize_as_yes_no() {
        let cone = cone();
        let topology = Topology::enrich(&cone, &BTreeSet::from([2]), &BTreeSet::from([3]));
        let json = serde_json::to_value(&topology.nodes).unwrap();
        assert_eq!(json["2"]["rpki"], "yes");
        assert_eq!(json["2"]["collector"], "no");
        assert_eq!(json["3"]["collector"], "yes");
        assert_eq!(json["1"]["levelMin"], 0);
    }

    #[test]
    fn test_string_levels_are_read() {
        let topology = Topology::from_json_str(
            r#"{
                "1": {"levelMin": "0", "levelMax": "0", "p2p": [], "p2c": ["2"], "c2p": [],
                      "collector": "no", "rpki": "yes"},
                "2": {"levelMin": "1", "levelMax": 1, "p2p": [], "p2c": [], "c2p": ["1"],
                      "collector": "yes", "rpki": "no"}
            }"#,
        )
        .unwrap();
        assert_eq!(topology.root(), 1);
        let leaf = topology.get(&2).unwrap();
        assert_eq!((leaf.node.level_min, leaf.node.level_max), (1, 1));
        assert!(leaf.is_collector());
        assert!(topology.get(&1).unwrap().is_rpki());
    }
}
