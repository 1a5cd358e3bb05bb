//! Classification of the routers after a hijack by the origin of their best path.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::net::Ipv4Addr;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize, Serializer};

use crate::as_graph::ASN;
use crate::convergence::Clock;
use crate::error::Result;
use crate::executor::{RetryPolicy, RouterExecutor};
use crate::shared::{asn_from_router_name, router_name};

/// Directed hop between two ASes, written `a->b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathEdge {
    pub from: ASN,
    pub to: ASN,
}

impl PathEdge {
    pub fn new(from: ASN, to: ASN) -> Self {
        PathEdge { from, to }
    }

    pub fn reversed(&self) -> Self {
        PathEdge::new(self.to, self.from)
    }
}

impl fmt::Display for PathEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

impl Serialize for PathEdge {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Default, Deserialize)]
struct BestPathReply {
    #[serde(default)]
    paths: Vec<BestPath>,
    #[serde(default, rename = "advertisedTo")]
    advertised_to: BTreeMap<String, AdvertisedPeer>,
}

#[derive(Debug, Default, Deserialize)]
struct BestPath {
    #[serde(default)]
    aspath: Option<AsPathAttribute>,
}

#[derive(Debug, Default, Deserialize)]
struct AsPathAttribute {
    #[serde(default)]
    segments: Vec<AsPathSegment>,
}

#[derive(Debug, Default, Deserialize)]
struct AsPathSegment {
    #[serde(default, with = "crate::asn_serde::list")]
    list: Vec<ASN>,
}

#[derive(Debug, Default, Deserialize)]
struct AdvertisedPeer {
    #[serde(default)]
    hostname: Option<String>,
}

impl BestPathReply {
    /// AS path of the first segment of the best path.
    fn as_path(&self) -> &[ASN] {
        self.paths
            .first()
            .and_then(|path| path.aspath.as_ref())
            .and_then(|aspath| aspath.segments.first())
            .map(|segment| segment.list.as_slice())
            .unwrap_or(&[])
    }
}

/// Routers and links reached by the hacker's announcement (red) or still by the victim's
/// (green), as written to `bgp_analysis_results.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttackReport {
    #[serde(with = "crate::asn_serde")]
    pub hacker_node: ASN,
    #[serde(with = "crate::asn_serde")]
    pub victim_node: ASN,
    #[serde(with = "crate::asn_serde::list")]
    pub red_nodes: Vec<ASN>,
    pub red_edges: Vec<PathEdge>,
    #[serde(with = "crate::asn_serde::list")]
    pub green_nodes: Vec<ASN>,
    pub green_edges: Vec<PathEdge>,
    /// Hops of every router's best path, starting at the router itself.
    pub paths: BTreeMap<ASN, Vec<PathEdge>>,
}

fn push_node(nodes: &mut Vec<ASN>, asn: ASN) {
    if !nodes.contains(&asn) {
        nodes.push(asn);
    }
}

fn push_edge(edges: &mut Vec<PathEdge>, edge: PathEdge) {
    if !edges.contains(&edge) && !edges.contains(&edge.reversed()) {
        edges.push(edge);
    }
}

impl AttackReport {
    pub fn new(hacker_node: ASN, victim_node: ASN) -> Self {
        AttackReport {
            hacker_node,
            victim_node,
            ..Default::default()
        }
    }

    pub fn is_red(&self, asn: ASN) -> bool {
        self.red_nodes.contains(&asn)
    }

    pub fn is_green(&self, asn: ASN) -> bool {
        self.green_nodes.contains(&asn)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!("BGP route analysis results saved in {}", path.display());
        Ok(())
    }
}

/// Queries and classifies the best path towards the victim prefix on every router.
#[derive(Debug, Clone)]
pub struct PathAnalyzer {
    hacker: ASN,
    victim: ASN,
    prefix_address: Ipv4Addr,
    retry: RetryPolicy,
}

impl PathAnalyzer {
    /// `prefix_address` is the network address of the hijacked /24.
    pub fn new(hacker: ASN, victim: ASN, prefix_address: Ipv4Addr) -> Self {
        PathAnalyzer {
            hacker,
            victim,
            prefix_address,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn query(&self) -> Vec<String> {
        vec![
            "vtysh".to_string(),
            "-c".to_string(),
            format!("sh ip bgp {} bestpath json", self.prefix_address),
        ]
    }

    /// Fold the reply of `router` into `report`. Empty or malformed replies only mark the
    /// router by its own role.
    pub fn analyze_reply(&self, router: ASN, reply: &str, report: &mut AttackReport) {
        if router == self.hacker {
            push_node(&mut report.red_nodes, router);
        } else if router == self.victim {
            push_node(&mut report.green_nodes, router);
        }

        let reply = reply.trim();
        if reply.is_empty() || reply == "{}" {
            info!("No valid JSON output for router {}", router);
            return;
        }
        let parsed: BestPathReply = match serde_json::from_str(reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Malformed reply from router {}: {}", router, e);
                return;
            }
        };

        let as_path = parsed.as_path();
        let origin = as_path.last().copied();
        if let Some(origin) = origin {
            if origin == self.hacker {
                push_node(&mut report.red_nodes, router);
            } else if origin == self.victim {
                push_node(&mut report.green_nodes, router);
            }

            let hops = std::iter::once(router).chain(as_path.iter().copied());
            let edges = hops
                .clone()
                .zip(hops.skip(1))
                .map(|(from, to)| PathEdge::new(from, to))
                .collect();
            report.paths.insert(router, edges);
        }

        let towards_hacker = router == self.hacker || origin == Some(self.hacker);
        let towards_victim = router == self.victim || origin == Some(self.victim);
        for peer in parsed.advertised_to.values() {
            let Some(to) = peer.hostname.as_deref().and_then(asn_from_router_name) else {
                debug!("router {}: advertised-to entry without router hostname", router);
                continue;
            };
            let edge = PathEdge::new(router, to);
            if towards_hacker {
                push_edge(&mut report.red_edges, edge);
            } else if towards_victim {
                push_edge(&mut report.green_edges, edge);
            }
        }
    }

    /// Query every router in order and build the report.
    pub fn analyze<E, C>(&self, executor: &mut E, clock: &mut C, routers: &[ASN]) -> AttackReport
    where
        E: RouterExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        info!("Starting BGP route analysis on routers...");
        let query = self.query();
        let argv: Vec<&str> = query.iter().map(String::as_str).collect();
        let mut report = AttackReport::new(self.hacker, self.victim);
        for &asn in routers {
            let name = router_name(asn);
            info!("Analyzing router {}", asn);
            match self.retry.execute(executor, clock, &name, &argv) {
                Ok(output) => {
                    self.analyze_reply(asn, &String::from_utf8_lossy(&output), &mut report)
                }
                Err(e) => {
                    warn!("Error while analyzing {}: {}", name, e);
                    // the role of the router is known even without an answer
                    self.analyze_reply(asn, "", &mut report);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_dedup_includes_reverse() {
        let mut edges = Vec::new();
        push_edge(&mut edges, PathEdge::new(1, 2));
        push_edge(&mut edges, PathEdge::new(2, 1));
        push_edge(&mut edges, PathEdge::new(1, 2));
        assert_eq!(edges, vec![PathEdge::new(1, 2)]);
        assert_eq!(serde_json::to_string(&edges).unwrap(), r#"["1->2"]"#);
    }

    #[test]
    fn test_malformed_reply_only_marks_role() {
        let analyzer = PathAnalyzer::new(10, 20, Ipv4Addr::new(20, 0, 0, 0));
        let mut report = AttackReport::new(10, 20);
        analyzer.analyze_reply(10, "not json", &mut report);
        assert_eq!(report.red_nodes, vec![10]);
        assert!(report.paths.is_empty());
    }
}
