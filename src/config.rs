//! Run configuration, read from a JSON file in the layout of the lab's `config.json`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::as_graph::ASN;
use crate::customer_cone::CustomerCone;
use crate::error::{Error, Result};
use crate::executor::RetryPolicy;
use crate::topology::NodeSelection;

/// Timing of the convergence wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub check_interval_secs: u64,
    pub max_wait_secs: u64,
    /// Consecutive stable ticks needed to declare convergence.
    pub stable_iterations: u32,
    /// Extra attempts of a failed router query within one tick.
    pub query_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        ConvergenceConfig {
            check_interval_secs: 5,
            max_wait_secs: 600,
            stable_iterations: 5,
            query_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl ConvergenceConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.query_retries, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    pub fn with_max_wait_secs(mut self, secs: u64) -> Self {
        self.max_wait_secs = secs;
        self
    }

    pub fn with_stable_iterations(mut self, iterations: u32) -> Self {
        self.stable_iterations = iterations;
        self
    }
}

/// Container images of the lab machines, written into `lab.conf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabImages {
    pub frr: String,
    pub routinator: String,
    pub krill: String,
}

impl Default for LabImages {
    fn default() -> Self {
        LabImages {
            frr: "kathara/frr3".to_string(),
            routinator: "kathara/routinator3".to_string(),
            krill: "kathara/krill3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub relations_file: Option<PathBuf>,
    /// Root of the customer cone.
    #[serde(with = "crate::asn_serde::option")]
    pub specified_as: Option<ASN>,
    pub show_statistics_ccone: bool,
    /// Pick the RPKI, collector, hacker and victim nodes at random.
    pub random_configuration: bool,
    /// Percentage of cone members validating with RPKI when picking at random.
    pub adoption_rpki: f64,
    /// Percentage of cone members peering with a route collector when picking at random.
    pub adoption_collector_peer: f64,
    pub prefer_customer: bool,
    /// Keep RPKI-invalid routes with a low preference instead of denying them.
    pub invalid_prefixes_in_bgp_table: bool,
    #[serde(with = "crate::asn_serde::list")]
    pub rpki_nodes: Vec<ASN>,
    #[serde(with = "crate::asn_serde::list")]
    pub collector_nodes: Vec<ASN>,
    #[serde(with = "crate::asn_serde::option")]
    pub hacker_node: Option<ASN>,
    #[serde(with = "crate::asn_serde::option")]
    pub victim_node: Option<ASN>,
    pub seed: u64,
    pub output_dir: PathBuf,
    /// Command prefix reaching a router; `{router}` is replaced by the machine name.
    pub executor: Vec<String>,
    pub images: LabImages,
    pub convergence: ConvergenceConfig,
}

impl Default for LabConfig {
    fn default() -> Self {
        LabConfig {
            relations_file: None,
            specified_as: None,
            show_statistics_ccone: false,
            random_configuration: false,
            adoption_rpki: 0.0,
            adoption_collector_peer: 0.0,
            prefer_customer: false,
            invalid_prefixes_in_bgp_table: false,
            rpki_nodes: Vec::new(),
            collector_nodes: Vec::new(),
            hacker_node: None,
            victim_node: None,
            seed: 0,
            output_dir: PathBuf::from("output"),
            executor: vec![
                "docker".to_string(),
                "exec".to_string(),
                "{router}".to_string(),
            ],
            images: LabImages::default(),
            convergence: ConvergenceConfig::default(),
        }
    }
}

impl LabConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: LabConfig = serde_json::from_reader(reader)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_relations_file(mut self, path: PathBuf) -> Self {
        self.relations_file = Some(path);
        self
    }

    pub fn with_specified_as(mut self, asn: ASN) -> Self {
        self.specified_as = Some(asn);
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_prefer_customer(mut self, prefer_customer: bool) -> Self {
        self.prefer_customer = prefer_customer;
        self
    }

    pub fn with_invalid_prefixes_in_bgp_table(mut self, permit: bool) -> Self {
        self.invalid_prefixes_in_bgp_table = permit;
        self
    }

    pub fn with_random_configuration(
        mut self,
        adoption_rpki: f64,
        adoption_collector: f64,
    ) -> Self {
        self.random_configuration = true;
        self.adoption_rpki = adoption_rpki;
        self.adoption_collector_peer = adoption_collector;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_attack(mut self, hacker: ASN, victim: ASN) -> Self {
        self.hacker_node = Some(hacker);
        self.victim_node = Some(victim);
        self
    }

    pub fn with_rpki_nodes(mut self, nodes: Vec<ASN>) -> Self {
        self.rpki_nodes = nodes;
        self
    }

    pub fn with_collector_nodes(mut self, nodes: Vec<ASN>) -> Self {
        self.collector_nodes = nodes;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("adoption_rpki", self.adoption_rpki),
            ("adoption_collector_peer", self.adoption_collector_peer),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "'{}' must be a percentage value between 0 and 100",
                    name
                )));
            }
        }
        if let (Some(hacker), Some(victim)) = (self.hacker_node, self.victim_node) {
            if hacker == victim {
                return Err(Error::InvalidConfig(
                    "hacker_node and victim_node must differ".to_string(),
                ));
            }
        }
        if self.executor.is_empty() {
            return Err(Error::InvalidConfig("executor command is empty".to_string()));
        }
        let convergence = &self.convergence;
        if convergence.stable_iterations == 0 || convergence.check_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "convergence interval and stable iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Node roles for the cone: drawn at random when `random_configuration` is set, otherwise
    /// taken from the explicit lists.
    pub fn node_selection(&self, cone: &CustomerCone) -> Result<NodeSelection> {
        let selection = if self.random_configuration {
            NodeSelection::random(
                cone,
                self.adoption_rpki,
                self.adoption_collector_peer,
                self.seed,
            )?
        } else {
            let missing = |role: &str| {
                Error::InvalidConfig(format!("{} is required without random_configuration", role))
            };
            NodeSelection {
                rpki_nodes: self.rpki_nodes.iter().copied().collect(),
                collector_nodes: self.collector_nodes.iter().copied().collect(),
                hacker_node: self.hacker_node.ok_or_else(|| missing("hacker_node"))?,
                victim_node: self.victim_node.ok_or_else(|| missing("victim_node"))?,
            }
        };
        selection.validate(cone)?;
        Ok(selection)
    }
}
