//! Collision domains (virtual LANs) of the lab and the `lab.conf` describing them.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::as_graph::ASN;
use crate::config::LabImages;
use crate::shared::{router_name, Relationships};
use crate::topology::Topology;

pub const KRILL_MACHINE: &str = "krill";
pub const KRILL_ENV: [&str; 3] = [
    "KRILL_CLI_TOKEN=kathara-secret-token",
    "KRILL_TEST=true",
    "KRILL_CLI_MY_CA=kathara-ca",
];

/// One interface of a router, named after the LAN it attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionDomain {
    /// Point-to-point LAN `<a>to<b>`, named by whichever end created it.
    Link { a: ASN, b: ASN },
    /// The router's own internal LAN, named after the AS.
    Internal(ASN),
    /// LAN towards the RPKI server.
    Krill,
}

impl CollisionDomain {
    /// The AS at the other end of a link LAN, as seen from `asn`.
    pub fn peer_of(&self, asn: ASN) -> Option<ASN> {
        match *self {
            CollisionDomain::Link { a, b } if a == asn => Some(b),
            CollisionDomain::Link { a, b } if b == asn => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for CollisionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionDomain::Link { a, b } => write!(f, "{}to{}", a, b),
            CollisionDomain::Internal(asn) => write!(f, "{}", asn),
            CollisionDomain::Krill => write!(f, "{}", KRILL_MACHINE),
        }
    }
}

impl Serialize for CollisionDomain {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Interfaces of every router; interface `ethN` is the N-th entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabWiring {
    order: Vec<ASN>,
    interfaces: BTreeMap<ASN, Vec<CollisionDomain>>,
    rpki: HashSet<ASN>,
}

impl LabWiring {
    pub fn build(topology: &Topology) -> Self {
        let order = topology.synthesis_order();
        let mut interfaces: BTreeMap<ASN, Vec<CollisionDomain>> = BTreeMap::new();
        let mut created: HashSet<(ASN, ASN)> = HashSet::new();
        let mut rpki = HashSet::new();

        for asn in &order {
            let Some(node) = topology.get(asn) else {
                continue;
            };
            if node.is_rpki() {
                rpki.insert(*asn);
            }
            let list = interfaces.entry(*asn).or_default();
            for rel in Relationships::ALL {
                for &peer in node.get_neighbors(rel) {
                    let domain = if created.contains(&(peer, *asn)) {
                        CollisionDomain::Link { a: peer, b: *asn }
                    } else {
                        created.insert((*asn, peer));
                        CollisionDomain::Link { a: *asn, b: peer }
                    };
                    list.push(domain);
                }
            }
            list.push(CollisionDomain::Internal(*asn));
        }

        if let Some(first) = order.first() {
            interfaces
                .entry(*first)
                .or_default()
                .push(CollisionDomain::Krill);
        }

        LabWiring {
            order,
            interfaces,
            rpki,
        }
    }

    pub fn interfaces(&self, asn: &ASN) -> &[CollisionDomain] {
        self.interfaces.get(asn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Router name to interface list, as stored in `Collision_domains.json`.
    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        let by_router: BTreeMap<String, &Vec<CollisionDomain>> = self
            .interfaces
            .iter()
            .map(|(asn, list)| (router_name(*asn), list))
            .collect();
        serde_json::to_value(by_router)
    }

    /// Lines of `lab.conf`.
    pub fn render_lab_conf(&self, images: &LabImages) -> Vec<String> {
        let mut lines = Vec::new();
        for asn in &self.order {
            let name = router_name(*asn);
            for (i, domain) in self.interfaces(asn).iter().enumerate() {
                lines.push(format!("{}[{}]=\"{}\"", name, i, domain));
            }
            let image = if self.rpki.contains(asn) {
                &images.routinator
            } else {
                &images.frr
            };
            lines.push(format!("{}[image]=\"{}\"", name, image));
            lines.push(String::new());
        }

        lines.push(format!("{}[image]=\"{}\"", KRILL_MACHINE, images.krill));
        lines.push(format!("{}[0]=\"{}\"", KRILL_MACHINE, CollisionDomain::Krill));
        for env in KRILL_ENV {
            lines.push(format!("{}[env]=\"{}\"", KRILL_MACHINE, env));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_of() {
        let link = CollisionDomain::Link { a: 1, b: 2 };
        assert_eq!(link.peer_of(1), Some(2));
        assert_eq!(link.peer_of(2), Some(1));
        assert_eq!(link.peer_of(3), None);
        assert_eq!(CollisionDomain::Internal(1).peer_of(1), None);
        assert_eq!(link.to_string(), "1to2");
    }
}
