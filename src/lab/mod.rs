//! Emulation lab synthesized from a customer cone: addressing, router configurations, wiring,
//! startup scripts and the attack script.

pub mod attack_script;
pub mod collision_domain;
pub mod startup;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use ipnetwork::IpNetwork;
use log::info;

use crate::address_plan::{AddressPlan, LinkAllocator};
use crate::as_graph::ASN;
use crate::attack::AttackOrchestrator;
use crate::config::LabConfig;
use crate::customer_cone::CustomerCone;
use crate::error::Result;
use crate::policy::route_map::RpkiState;
use crate::policy::{compile_plan, RoutingPolicyDocument};
use crate::route_validator::{roa_entries, RouteValidator, ROA};
use crate::shared::router_name;
use crate::topology::{NodeSelection, Topology};

pub use attack_script::attack_script;
pub use collision_domain::{CollisionDomain, LabWiring};
pub use startup::{krill_startup, router_startup};

pub const TOPOLOGY_FILE: &str = "topology_rpki_coll.json";
pub const NEIGHBOR_FILE: &str = "neighbor_dict.json";
pub const COLLISION_DOMAINS_FILE: &str = "Collision_domains.json";
pub const LAB_CONF_FILE: &str = "lab.conf";
pub const ATTACK_SCRIPT_FILE: &str = "shared/attack.sh";
pub const NODE_SELECTION_FILE: &str = "node_selection.json";
pub const RESOLV_CONF: &str = "nameserver 8.8.8.8";

fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn vtysh_conf(router: &str) -> Vec<String> {
    vec![
        "service integrated-vtysh-config".to_string(),
        format!("hostname {}-frr", router),
    ]
}

/// Files of a lab keyed by their path relative to the lab directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabArtifacts {
    files: BTreeMap<PathBuf, String>,
}

impl LabArtifacts {
    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, content: String) {
        self.files.insert(path.into(), content);
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every file below `dir`, creating directories as needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let pb = ProgressBar::new(self.files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} files")?
                .progress_chars("##-"),
        );
        for (relative, content) in &self.files {
            let path = dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            pb.inc(1);
        }
        pb.finish_and_clear();
        info!("{} lab files written to {}", self.files.len(), dir.display());
        Ok(())
    }
}

/// Everything derived from a cone and a node selection.
#[derive(Debug, Clone)]
pub struct Lab {
    pub selection: NodeSelection,
    pub topology: Topology,
    pub plan: AddressPlan,
    pub wiring: LabWiring,
    pub roas: Vec<ROA>,
    pub policies: Vec<(ASN, RoutingPolicyDocument)>,
    pub orchestrator: AttackOrchestrator,
}

impl Lab {
    pub fn synthesize(
        config: &LabConfig,
        cone: &CustomerCone,
        selection: &NodeSelection,
    ) -> Result<Self> {
        selection.validate(cone)?;
        let topology = Topology::enrich(cone, &selection.rpki_nodes, &selection.collector_nodes);
        Self::from_topology(config, topology, selection.hacker_node, selection.victim_node)
    }

    /// Rebuild the lab of an already enriched topology.
    pub fn from_topology(
        config: &LabConfig,
        topology: Topology,
        hacker: ASN,
        victim: ASN,
    ) -> Result<Self> {
        let selection = NodeSelection {
            rpki_nodes: topology
                .iter()
                .filter(|(_, node)| node.is_rpki())
                .map(|(asn, _)| *asn)
                .collect(),
            collector_nodes: topology
                .iter()
                .filter(|(_, node)| node.is_collector())
                .map(|(asn, _)| *asn)
                .collect(),
            hacker_node: hacker,
            victim_node: victim,
        };
        let mut allocator = LinkAllocator::new();
        let plan = AddressPlan::synthesize(&topology, &mut allocator)?;
        let wiring = LabWiring::build(&topology);
        let roas = roa_entries(&plan)?;
        let policies = compile_plan(
            &plan,
            config.prefer_customer,
            config.invalid_prefixes_in_bgp_table,
        );
        let orchestrator = AttackOrchestrator::new(&plan, hacker, victim)?
            .with_retry(config.convergence.retry_policy());
        info!(
            "Lab of {} routers synthesized ({} ROAs)",
            plan.len(),
            roas.len()
        );
        Ok(Lab {
            selection,
            topology,
            plan,
            wiring,
            roas,
            policies,
            orchestrator,
        })
    }

    /// RPKI state a validating router would assign to the hijack announcement.
    pub fn predicted_hijack_state(&self) -> RpkiState {
        let validator = RouteValidator::from_roas(self.roas.iter().cloned());
        validator.predict(
            &IpNetwork::V4(self.orchestrator.victim_prefix()),
            self.orchestrator.hacker(),
        )
    }

    /// Render every lab file in memory.
    pub fn render(&self, config: &LabConfig) -> Result<LabArtifacts> {
        let mut artifacts = LabArtifacts::default();
        artifacts.insert(
            TOPOLOGY_FILE,
            serde_json::to_string_pretty(&self.topology.to_json_value()?)?,
        );
        artifacts.insert(
            NODE_SELECTION_FILE,
            serde_json::to_string_pretty(&self.selection)?,
        );
        artifacts.insert(
            NEIGHBOR_FILE,
            serde_json::to_string_pretty(&self.plan.to_json_value()?)?,
        );
        artifacts.insert(
            COLLISION_DOMAINS_FILE,
            serde_json::to_string_pretty(&self.wiring.to_json_value()?)?,
        );
        artifacts.insert(
            LAB_CONF_FILE,
            join_lines(&self.wiring.render_lab_conf(&config.images)),
        );

        for (asn, document) in &self.policies {
            let router = router_name(*asn);
            let etc = PathBuf::from(&router).join("etc");
            artifacts.insert(etc.join("frr").join("frr.conf"), join_lines(document.lines()));
            artifacts.insert(etc.join("frr").join("vtysh.conf"), join_lines(&vtysh_conf(&router)));
            artifacts.insert(etc.join("resolv.conf"), format!("{}\n", RESOLV_CONF));
        }

        for record in self.plan.iter() {
            let lines = router_startup(
                record,
                self.wiring.interfaces(&record.asn),
                self.plan.len(),
            );
            artifacts.insert(format!("{}.startup", router_name(record.asn)), join_lines(&lines));
        }
        artifacts.insert("krill.startup", join_lines(&krill_startup(&self.roas)));
        artifacts.insert(
            ATTACK_SCRIPT_FILE,
            join_lines(&attack_script(&self.orchestrator)),
        );
        Ok(artifacts)
    }
}
