use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::address_plan::{AddressPlan, NeighborRecord};
use crate::as_graph::ASN;
use crate::shared::{router_name, CommonAddresses, Relationships};

use super::route_map::{render_route_map, NextHopList};
use super::{PolicyToggles, RoutingPolicyDocument};

const RPKI_CACHE: &str = "rpki cache 127.0.0.1 3323 preference 1";
const FIRST_PREFIX_LIST_SEQ: u32 = 10;
const PREFIX_LIST_SEQ_STEP: u32 = 10;

/// Prefix-list holding the next hops of neighbors of kind `rel`.
fn next_hop_list(rel: Relationships) -> NextHopList {
    match rel {
        Relationships::Peers => NextHopList::P2P,
        Relationships::Customers => NextHopList::C2P,
        Relationships::Providers => NextHopList::P2C,
    }
}

fn header(record: &NeighborRecord, toggles: &PolicyToggles) -> Vec<String> {
    let mut lines: Vec<String> = [
        "!",
        "! FRRouting configuration file",
        "!",
        "password zebra",
        "enable password zebra",
        "!",
        "log file /var/log/frr/frr.log",
        "!",
        "! BGP CONFIGURATION",
        "!",
        "debug bgp keepalives",
        "debug bgp updates in",
        "debug bgp updates out",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if toggles.rpki {
        lines.push("debug rpki".to_string());
    }
    if record.is_collector() {
        lines.push("!".to_string());
        lines.push(format!(
            "dump bgp all-et /shared/dumps/dump-{}",
            router_name(record.asn)
        ));
        lines.push("!".to_string());
    }
    if toggles.rpki {
        lines.extend(
            [
                "!",
                "! RPKI CONFIGURATION",
                "!",
                "rpki",
                "rpki polling_period 10",
                "rpki retry_interval 10",
                "rpki revalidate_interval 5",
                RPKI_CACHE,
                "exit",
                "!",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }
    lines
}

fn bgp_block(record: &NeighborRecord, toggles: &PolicyToggles) -> Vec<String> {
    let [a, b, c, _] = record.internal_lan.octets();
    let internal_prefix = Ipv4Addr::new(a, b, c, 0);

    let mut lines = vec![
        "!".to_string(),
        format!("router bgp {}", record.asn),
        "no bgp ebgp-requires-policy".to_string(),
        "no bgp network import-check".to_string(),
        "!".to_string(),
        format!("bgp router-id {}", record.internal_lan),
        format!("network {}/24", internal_prefix),
    ];
    if toggles.announce_collector {
        lines.push(format!("network {}", CommonAddresses::KRILL_LAN));
    }
    lines.push("!".to_string());

    let route_map = toggles.route_preference();
    for (rel, link) in record.links() {
        let address = link.address;
        lines.push(format!("neighbor {} remote-as {}", address, link.peer));
        lines.push(format!("neighbor {} description Router {}", address, rel));
        lines.push(format!("neighbor {} local-role {}", address, rel.local_role()));
        if let Some(policy) = route_map {
            lines.push(format!("neighbor {} route-map {} in", address, policy.name()));
        }
        lines.push("!".to_string());
    }
    lines
}

fn prefix_lists(record: &NeighborRecord) -> Vec<String> {
    let mut next_hops: BTreeMap<NextHopList, Vec<Ipv4Addr>> = BTreeMap::new();
    for (rel, link) in record.links() {
        next_hops.entry(next_hop_list(rel)).or_default().push(link.address);
    }

    let mut lines = Vec::new();
    let mut seq = FIRST_PREFIX_LIST_SEQ;
    for list in NextHopList::ALL {
        for address in next_hops.get(&list).into_iter().flatten() {
            lines.push(format!("ip prefix-list {} seq {} permit {}/32", list, seq, address));
            seq += PREFIX_LIST_SEQ_STEP;
        }
        lines.push("!".to_string());
    }
    lines
}

fn source_route_map(record: &NeighborRecord) -> Vec<String> {
    vec![
        "ip prefix-list ANY permit 0.0.0.0/0 le 32".to_string(),
        "route-map correct_src permit 1".to_string(),
        "match ip address prefix-list ANY".to_string(),
        format!("set src {}", record.internal_lan),
        "ip protocol bgp route-map correct_src".to_string(),
        "!".to_string(),
    ]
}

/// Compile the `frr.conf` of one router.
///
/// The output depends only on the record and the toggles; `toggles.rpki` takes precedence over
/// the record's own flag.
pub fn compile(record: &NeighborRecord, toggles: &PolicyToggles) -> RoutingPolicyDocument {
    let mut lines = header(record, toggles);
    lines.extend(bgp_block(record, toggles));
    if toggles.prefer_customer {
        lines.extend(prefix_lists(record));
    }
    lines.extend(source_route_map(record));
    if let Some(policy) = toggles.route_preference() {
        lines.extend(render_route_map(policy, toggles.permit_invalid));
    }
    RoutingPolicyDocument::new(lines)
}

/// Compile every router of `plan`, in synthesis order. The first AS announces the RPKI server
/// LAN.
pub fn compile_plan(
    plan: &AddressPlan,
    prefer_customer: bool,
    permit_invalid: bool,
) -> Vec<(ASN, RoutingPolicyDocument)> {
    let first = plan.first_as();
    plan.iter()
        .map(|record| {
            let toggles = PolicyToggles::default()
                .with_rpki(record.is_rpki())
                .with_prefer_customer(prefer_customer)
                .with_permit_invalid(permit_invalid)
                .with_announce_collector(Some(record.asn) == first);
            (record.asn, compile(record, &toggles))
        })
        .collect()
}
