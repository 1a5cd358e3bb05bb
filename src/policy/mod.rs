//! Per-AS routing policy compiled to FRR configuration.

pub mod frr;
pub mod route_map;

use std::fmt;

pub use frr::{compile, compile_plan};

/// Inputs of the compiler besides the neighbor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PolicyToggles {
    /// The router validates origins against the RPKI cache.
    pub rpki: bool,
    /// Routes are ranked customer over peer over provider.
    pub prefer_customer: bool,
    /// RPKI-invalid routes are kept with a low preference instead of being dropped.
    pub permit_invalid: bool,
    /// The router also announces the RPKI server LAN.
    pub announce_collector: bool,
}

impl PolicyToggles {
    pub fn with_rpki(mut self, rpki: bool) -> Self {
        self.rpki = rpki;
        self
    }

    pub fn with_prefer_customer(mut self, prefer_customer: bool) -> Self {
        self.prefer_customer = prefer_customer;
        self
    }

    pub fn with_permit_invalid(mut self, permit_invalid: bool) -> Self {
        self.permit_invalid = permit_invalid;
        self
    }

    pub fn with_announce_collector(mut self, announce_collector: bool) -> Self {
        self.announce_collector = announce_collector;
        self
    }

    /// The single inbound route-map these toggles call for, if any.
    pub fn route_preference(&self) -> Option<RoutePreferencePolicy> {
        match (self.rpki, self.prefer_customer) {
            (true, true) => Some(RoutePreferencePolicy::RpkiPreferCustomer),
            (false, true) => Some(RoutePreferencePolicy::PreferCustomer),
            (true, false) => Some(RoutePreferencePolicy::OnlyRpki),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutePreferencePolicy {
    RpkiPreferCustomer,
    PreferCustomer,
    OnlyRpki,
}

impl RoutePreferencePolicy {
    /// Route-map name used in the router configuration.
    pub fn name(&self) -> &'static str {
        match self {
            RoutePreferencePolicy::RpkiPreferCustomer => "rpkiPreferCust",
            RoutePreferencePolicy::PreferCustomer => "preferCustomer",
            RoutePreferencePolicy::OnlyRpki => "onlyRpki",
        }
    }
}

impl fmt::Display for RoutePreferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered configuration lines of one router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RoutingPolicyDocument {
    lines: Vec<String>,
}

impl RoutingPolicyDocument {
    pub fn new(lines: Vec<String>) -> Self {
        RoutingPolicyDocument { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines joined with `\n`, without a trailing newline.
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn contains_line(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }
}

impl fmt::Display for RoutingPolicyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
