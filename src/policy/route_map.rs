//! Inbound route-maps setting the local preference from the RPKI state and the relationship
//! of the next hop.

use std::fmt;

use super::RoutePreferencePolicy;

/// RPKI origin validation state matched by an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpkiState {
    Valid,
    NotFound,
    Invalid,
}

impl fmt::Display for RpkiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpkiState::Valid => write!(f, "valid"),
            RpkiState::NotFound => write!(f, "notfound"),
            RpkiState::Invalid => write!(f, "invalid"),
        }
    }
}

/// Next-hop prefix-lists. The names describe the session from the neighbor's point of view:
/// routes learned from a customer come from `C2P`, from a provider from `P2C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NextHopList {
    P2P,
    P2C,
    C2P,
}

impl NextHopList {
    /// Emission order of the prefix-lists.
    pub const ALL: [NextHopList; 3] = [NextHopList::P2P, NextHopList::P2C, NextHopList::C2P];

    /// Tiers of customer preference, most preferred first.
    const PREFERENCE: [NextHopList; 3] = [NextHopList::C2P, NextHopList::P2P, NextHopList::P2C];
}

impl fmt::Display for NextHopList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextHopList::P2P => write!(f, "P2P"),
            NextHopList::P2C => write!(f, "P2C"),
            NextHopList::C2P => write!(f, "C2P"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Permit,
    Deny,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Permit => write!(f, "permit"),
            Action::Deny => write!(f, "deny"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteMapEntry {
    pub action: Action,
    pub seq: u32,
    pub rpki: Option<RpkiState>,
    pub next_hop: Option<NextHopList>,
    pub local_preference: Option<u32>,
}

impl RouteMapEntry {
    fn permit(seq: u32) -> Self {
        RouteMapEntry {
            action: Action::Permit,
            seq,
            rpki: None,
            next_hop: None,
            local_preference: None,
        }
    }

    fn deny(seq: u32, rpki: RpkiState) -> Self {
        RouteMapEntry {
            action: Action::Deny,
            rpki: Some(rpki),
            ..Self::permit(seq)
        }
    }

    fn matching(
        seq: u32,
        rpki: Option<RpkiState>,
        next_hop: Option<NextHopList>,
        pref: u32,
    ) -> Self {
        RouteMapEntry {
            rpki,
            next_hop,
            local_preference: Some(pref),
            ..Self::permit(seq)
        }
    }

    /// Whether the entry ends the map by accepting everything left.
    pub fn is_catch_all(&self) -> bool {
        self.action == Action::Permit && self.rpki.is_none() && self.next_hop.is_none()
    }
}

/// Preferences of the RPKI tiers crossed with the customer tiers.
const RPKI_CUSTOMER_PREFS: [(RpkiState, [u32; 3]); 2] = [
    (RpkiState::Valid, [500, 450, 400]),
    (RpkiState::NotFound, [350, 300, 250]),
];
const INVALID_CUSTOMER_PREFS: [u32; 3] = [30, 20, 10];
const CUSTOMER_PREFS: [u32; 3] = [350, 300, 250];
const RPKI_PREFS: [(RpkiState, u32); 2] = [(RpkiState::Valid, 500), (RpkiState::NotFound, 200)];
const INVALID_PREF: u32 = 10;
const SEQ_STEP: u32 = 10;

/// Entries of `policy` in rule order. With `permit_invalid`, invalid routes are accepted with a
/// low preference instead of being denied.
pub fn route_map_entries(
    policy: RoutePreferencePolicy,
    permit_invalid: bool,
) -> Vec<RouteMapEntry> {
    let mut entries = Vec::new();
    let mut seq = 0;
    let mut next_seq = || {
        seq += SEQ_STEP;
        seq
    };

    match policy {
        RoutePreferencePolicy::RpkiPreferCustomer => {
            for (state, prefs) in RPKI_CUSTOMER_PREFS {
                for (list, pref) in NextHopList::PREFERENCE.into_iter().zip(prefs) {
                    entries.push(RouteMapEntry::matching(
                        next_seq(),
                        Some(state),
                        Some(list),
                        pref,
                    ));
                }
            }
            if permit_invalid {
                let invalid_prefs = NextHopList::PREFERENCE
                    .into_iter()
                    .zip(INVALID_CUSTOMER_PREFS);
                for (list, pref) in invalid_prefs {
                    entries.push(RouteMapEntry::matching(
                        next_seq(),
                        Some(RpkiState::Invalid),
                        Some(list),
                        pref,
                    ));
                }
            } else {
                entries.push(RouteMapEntry::deny(next_seq(), RpkiState::Invalid));
            }
        }
        RoutePreferencePolicy::PreferCustomer => {
            for (list, pref) in NextHopList::PREFERENCE.into_iter().zip(CUSTOMER_PREFS) {
                entries.push(RouteMapEntry::matching(next_seq(), None, Some(list), pref));
            }
        }
        RoutePreferencePolicy::OnlyRpki => {
            for (state, pref) in RPKI_PREFS {
                entries.push(RouteMapEntry::matching(next_seq(), Some(state), None, pref));
            }
            if permit_invalid {
                entries.push(RouteMapEntry::matching(
                    next_seq(),
                    Some(RpkiState::Invalid),
                    None,
                    INVALID_PREF,
                ));
            } else {
                entries.push(RouteMapEntry::deny(next_seq(), RpkiState::Invalid));
            }
        }
    }
    entries.push(RouteMapEntry::permit(next_seq()));
    entries
}

/// Render the route-map of `policy` as configuration lines.
pub fn render_route_map(policy: RoutePreferencePolicy, permit_invalid: bool) -> Vec<String> {
    let name = policy.name();
    // preferCustomer entries take a three space indent
    let indent = match policy {
        RoutePreferencePolicy::PreferCustomer => "   ",
        _ => "  ",
    };

    let mut lines = Vec::new();
    match policy {
        RoutePreferencePolicy::RpkiPreferCustomer => {
            lines.push("!".to_string());
            lines.push(
                "! Route-maps for Local Preference based on next-hop and on RPKI".to_string(),
            );
        }
        RoutePreferencePolicy::OnlyRpki => {
            lines.push("!".to_string());
            lines.push("! Route-maps for Local Preference based only on RPKI".to_string());
        }
        RoutePreferencePolicy::PreferCustomer => {}
    }

    for entry in route_map_entries(policy, permit_invalid) {
        lines.push(format!("route-map {} {} {}", name, entry.action, entry.seq));
        if let Some(state) = entry.rpki {
            lines.push(format!("{}match rpki {}", indent, state));
        }
        if let Some(list) = entry.next_hop {
            lines.push(format!("{}match ip next-hop prefix-list {}", indent, list));
        }
        if let Some(pref) = entry.local_preference {
            lines.push(format!("{}set local-preference {}", indent, pref));
        }
        lines.push("!".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_variant_sequence_numbers() {
        let entries = route_map_entries(RoutePreferencePolicy::RpkiPreferCustomer, false);
        let seqs: Vec<u32> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![10, 20, 30, 40, 50, 60, 70, 80]);
        assert_eq!(entries[6].action, Action::Deny);
        assert!(entries[7].is_catch_all());
    }

    #[test]
    fn test_prefer_customer_rendering() {
        let lines = render_route_map(RoutePreferencePolicy::PreferCustomer, false);
        assert_eq!(
            lines,
            vec![
                "route-map preferCustomer permit 10",
                "   match ip next-hop prefix-list C2P",
                "   set local-preference 350",
                "!",
                "route-map preferCustomer permit 20",
                "   match ip next-hop prefix-list P2P",
                "   set local-preference 300",
                "!",
                "route-map preferCustomer permit 30",
                "   match ip next-hop prefix-list P2C",
                "   set local-preference 250",
                "!",
                "route-map preferCustomer permit 40",
                "!",
            ]
        );
    }
}
