//! Summary figures of a customer cone, written next to the cone artifact on request.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;
use serde::Serialize;

use super::CustomerCone;
use crate::as_graph::ASN;
use crate::error::Result;
use crate::shared::Relationships;

/// Member with the largest neighbor list of one relationship kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegreeLeader {
    pub asn: ASN,
    pub degree: usize,
    pub level_min: u32,
    pub level_max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConeStatistics {
    #[serde(rename = "Size customer cone")]
    pub size: usize,
    #[serde(rename = "# p2c edges")]
    pub p2c_edges: usize,
    #[serde(rename = "# c2p edges")]
    pub c2p_edges: usize,
    /// Peer edges appear on both ends, so the sum is halved.
    #[serde(rename = "# p2p edges")]
    pub p2p_edges: usize,
    /// Members other than the root that have customers of their own.
    #[serde(rename = "Sub Customer Cones")]
    pub sub_cones: usize,
    #[serde(rename = "Shortest Maximum path length")]
    pub deepest_level_min: u32,
    #[serde(rename = "Maximum depth")]
    pub deepest_level_max: u32,
    #[serde(flatten)]
    pub leaders: LeaderTable,
}

/// Degree leaders per relationship, flattened into the `AS with most <rel>` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderTable(pub BTreeMap<Relationships, DegreeLeader>);

impl LeaderTable {
    pub fn get(&self, rel: Relationships) -> Option<&DegreeLeader> {
        self.0.get(&rel)
    }
}

impl Serialize for LeaderTable {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        for rel in [
            Relationships::Customers,
            Relationships::Providers,
            Relationships::Peers,
        ] {
            let leader = self.0.get(&rel);
            map.serialize_entry(
                &format!("AS with most {}", rel),
                &leader.map(|l| l.asn.to_string()),
            )?;
            map.serialize_entry(
                &format!("Degree AS with most {}", rel),
                &leader.map(|l| l.degree).unwrap_or(0),
            )?;
            map.serialize_entry(
                &format!("Min depth AS with most {}", rel),
                &leader.map(|l| l.level_min),
            )?;
            map.serialize_entry(
                &format!("Max depth AS with most {}", rel),
                &leader.map(|l| l.level_max),
            )?;
        }
        map.end()
    }
}

impl ConeStatistics {
    pub fn compute(cone: &CustomerCone) -> Self {
        let mut totals: BTreeMap<Relationships, usize> = BTreeMap::new();
        let mut leaders: BTreeMap<Relationships, DegreeLeader> = BTreeMap::new();
        let mut sub_cones = 0;
        let mut deepest_level_min = 0;
        let mut deepest_level_max = 0;

        // root first so it wins ties
        for asn in cone.synthesis_order() {
            let Some(node) = cone.get(&asn) else {
                continue;
            };
            if asn != cone.root() && !node.is_leaf() {
                sub_cones += 1;
            }
            deepest_level_min = deepest_level_min.max(node.level_min);
            deepest_level_max = deepest_level_max.max(node.level_max);

            for rel in Relationships::ALL {
                let degree = node.get_neighbors(rel).len();
                *totals.entry(rel).or_default() += degree;
                let best = leaders.get(&rel).map(|l| l.degree).unwrap_or(0);
                if degree > best {
                    leaders.insert(
                        rel,
                        DegreeLeader {
                            asn,
                            degree,
                            level_min: node.level_min,
                            level_max: node.level_max,
                        },
                    );
                }
            }
        }

        let total = |rel| totals.get(&rel).copied().unwrap_or(0);
        ConeStatistics {
            size: cone.len(),
            p2c_edges: total(Relationships::Customers),
            c2p_edges: total(Relationships::Providers),
            p2p_edges: total(Relationships::Peers) / 2,
            sub_cones,
            deepest_level_min,
            deepest_level_max,
            leaders: LeaderTable(leaders),
        }
    }

    /// Write the statistics keyed by the root AS.
    pub fn save_to_file(&self, root: ASN, path: &Path) -> Result<()> {
        let mut wrapper = BTreeMap::new();
        wrapper.insert(root.to_string(), self);
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &wrapper)?;
        info!("Statistics saved to {}", path.display());
        Ok(())
    }
}
