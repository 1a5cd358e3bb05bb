//! Polling of the routers' BGP tables until they stop changing.
//!
//! Every tick queries `show ip bgp` on each router. A tick is stable when every router answered
//! with at least as many lines as there are routers and nothing changed since the previous tick;
//! the network has converged after a configured number of consecutive stable ticks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::ConvergenceConfig;
use crate::executor::{RetryPolicy, RouterExecutor};

pub const SHOW_IP_BGP: [&str; 3] = ["vtysh", "-c", "show ip bgp"];

/// Source of time for the polling loop.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn elapsed(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

/// Wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration)
    }
}

/// Clock that only advances when slept on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.now = self.now.saturating_add(duration);
    }
}

/// Table of one router at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouterTable {
    /// Lines of the trimmed output.
    pub count: usize,
    pub output: String,
}

impl RouterTable {
    pub fn from_output(raw: &str) -> Self {
        let output = raw.trim().to_string();
        RouterTable {
            count: output.split('\n').count(),
            output,
        }
    }
}

/// Answers of every router at one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    tables: BTreeMap<String, RouterTable>,
    failed: BTreeSet<String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the table of `router`. An empty answer counts as a failure.
    pub fn record(&mut self, router: &str, raw: &str) {
        if raw.trim().is_empty() {
            self.record_failure(router);
            return;
        }
        self.tables
            .insert(router.to_string(), RouterTable::from_output(raw));
    }

    pub fn record_failure(&mut self, router: &str) {
        self.failed.insert(router.to_string());
    }

    pub fn get(&self, router: &str) -> Option<&RouterTable> {
        self.tables.get(router)
    }

    pub fn counts(&self) -> BTreeMap<&str, usize> {
        self.tables
            .iter()
            .map(|(router, table)| (router.as_str(), table.count))
            .collect()
    }

    /// Every router answered with at least `expected_routes` lines.
    pub fn is_locally_converged(&self, expected_routes: usize) -> bool {
        self.failed.is_empty()
            && self
                .tables
                .values()
                .all(|table| table.count >= expected_routes)
    }

    /// Routers whose table differs from the one in `previous`.
    pub fn changed_since<'a>(&'a self, previous: &Snapshot) -> Vec<&'a str> {
        self.tables
            .iter()
            .filter(|(router, table)| {
                previous
                    .tables
                    .get(router.as_str())
                    .map(|old| old != *table)
                    .unwrap_or(false)
            })
            .map(|(router, _)| router.as_str())
            .collect()
    }

    fn same_tables(&self, other: &Snapshot) -> bool {
        self.tables == other.tables
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvergenceState {
    Polling,
    /// Number of consecutive stable ticks so far.
    Stable(u32),
    Converged,
    TimedOut,
}

impl ConvergenceState {
    pub fn is_converged(&self) -> bool {
        *self == ConvergenceState::Converged
    }
}

impl fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceState::Polling => write!(f, "polling"),
            ConvergenceState::Stable(n) => write!(f, "stable for {} iterations", n),
            ConvergenceState::Converged => write!(f, "converged"),
            ConvergenceState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// State machine fed with one [`Snapshot`] per tick.
#[derive(Debug, Clone)]
pub struct ConvergenceOracle {
    expected_routes: usize,
    required_stable: u32,
    check_interval: Duration,
    max_wait: Duration,
    retry: RetryPolicy,
    previous: Option<Snapshot>,
    stable_iterations: u32,
    state: ConvergenceState,
}

impl ConvergenceOracle {
    /// `expected_routes` is the minimum table size of every router, normally the number of
    /// routers.
    pub fn new(expected_routes: usize, config: &ConvergenceConfig) -> Self {
        ConvergenceOracle {
            expected_routes,
            required_stable: config.stable_iterations.max(1),
            check_interval: config.check_interval(),
            max_wait: config.max_wait(),
            retry: config.retry_policy(),
            previous: None,
            stable_iterations: 0,
            state: ConvergenceState::Polling,
        }
    }

    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    pub fn stable_iterations(&self) -> u32 {
        self.stable_iterations
    }

    /// Advance the state machine by one tick.
    pub fn observe(&mut self, snapshot: Snapshot) -> ConvergenceState {
        let locally_converged = snapshot.is_locally_converged(self.expected_routes);
        for (router, count) in snapshot.counts() {
            if count < self.expected_routes {
                info!(
                    "Convergence not reached: {} has {} routes (expected: {})",
                    router, count, self.expected_routes
                );
            }
        }

        let stable = match &self.previous {
            Some(previous) => {
                for router in snapshot.changed_since(previous) {
                    info!("BGP table content has changed for {}", router);
                }
                locally_converged && snapshot.same_tables(previous)
            }
            None => false,
        };

        if stable {
            self.stable_iterations += 1;
            info!(
                "Stable iteration {}/{}",
                self.stable_iterations, self.required_stable
            );
        } else {
            self.stable_iterations = 0;
        }
        self.previous = Some(snapshot);

        self.state = if self.stable_iterations >= self.required_stable {
            ConvergenceState::Converged
        } else if self.stable_iterations > 0 {
            ConvergenceState::Stable(self.stable_iterations)
        } else {
            ConvergenceState::Polling
        };
        self.state
    }

    /// Query every router once. Routers that keep failing are logged and marked as failed.
    pub fn poll<E, C>(&self, executor: &mut E, clock: &mut C, routers: &[String]) -> Snapshot
    where
        E: RouterExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        let mut snapshot = Snapshot::new();
        for router in routers {
            match self.retry.execute(executor, clock, router, &SHOW_IP_BGP) {
                Ok(output) => snapshot.record(router, &String::from_utf8_lossy(&output)),
                Err(e) => {
                    warn!("Error on {}: {}", router, e);
                    snapshot.record_failure(router);
                }
            }
        }
        snapshot
    }

    /// Poll until convergence or until the configured ceiling has passed.
    pub fn wait_for_convergence<E, C>(
        &mut self,
        executor: &mut E,
        clock: &mut C,
        routers: &[String],
    ) -> ConvergenceState
    where
        E: RouterExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        info!("Waiting for route convergence...");
        let start = clock.elapsed();
        while clock.elapsed().saturating_sub(start) < self.max_wait {
            let snapshot = self.poll(executor, clock, routers);
            if self.observe(snapshot).is_converged() {
                info!("Convergence reached!");
                return self.state;
            }
            info!(
                "Convergence not yet reached, retrying in {} seconds...",
                self.check_interval.as_secs()
            );
            clock.sleep(self.check_interval);
        }
        warn!("Timeout reached: convergence not achieved");
        self.state = ConvergenceState::TimedOut;
        self.state
    }
}
