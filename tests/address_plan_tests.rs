use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;

use conelab::address_plan::{internal_lan, internal_prefix, AddressPlan, LinkAllocator};
use conelab::as_graph::ASGraph;
use conelab::customer_cone::CustomerCone;
use conelab::shared::Relationships;
use conelab::topology::Topology;
use conelab::Error;
use maplit::btreeset;

/// Root 1 with customers 2 and 3, 3 has customer 4, 2 and 3 peer.
fn topology(rpki: BTreeSet<u32>) -> Topology {
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(1, 2);
    as_graph.add_provider_customer(1, 3);
    as_graph.add_provider_customer(3, 4);
    as_graph.add_peers(2, 3);
    let cone = CustomerCone::build(&as_graph, 1).unwrap();
    Topology::enrich(&cone, &rpki, &BTreeSet::new())
}

#[test]
fn test_internal_lan_is_injective_up_to_six_digits() {
    let mut seen = HashSet::new();
    for asn in 1..=999_999u32 {
        assert!(seen.insert(internal_lan(asn).unwrap()), "AS {} collides", asn);
    }
}

#[test]
fn test_internal_lan_layout() {
    assert_eq!(internal_lan(1).unwrap(), Ipv4Addr::new(1, 0, 0, 1));
    assert_eq!(internal_lan(3356).unwrap(), Ipv4Addr::new(33, 56, 0, 1));
    assert_eq!(internal_lan(100).unwrap(), Ipv4Addr::new(10, 110, 0, 1));
    assert_eq!(internal_lan(1005).unwrap(), Ipv4Addr::new(10, 105, 0, 1));
    assert_eq!(internal_lan(123456).unwrap(), Ipv4Addr::new(12, 34, 56, 1));
    assert_eq!(internal_prefix(3356).unwrap().to_string(), "33.56.0.0/24");
}

#[test]
fn test_seven_digit_asn_fails() {
    assert!(matches!(
        internal_lan(1_000_000),
        Err(Error::AsnOutOfRange(1_000_000))
    ));
}

#[test]
fn test_link_addresses() {
    let topology = topology(BTreeSet::new());
    let mut allocator = LinkAllocator::new();
    let plan = AddressPlan::synthesize(&topology, &mut allocator).unwrap();

    assert_eq!(plan.order(), &[1, 2, 3, 4]);
    let root = plan.get(&1).unwrap();
    // the provider end is .2, the customer end .1
    assert_eq!(root.as_lan[&2], Ipv4Addr::new(120, 0, 0, 2));
    assert_eq!(plan.get(&2).unwrap().as_lan[&1], Ipv4Addr::new(120, 0, 0, 1));
    assert_eq!(root.as_lan[&3], Ipv4Addr::new(120, 0, 0, 6));
    // the peer link is resolved by AS 2, which takes .1
    assert_eq!(plan.get(&2).unwrap().as_lan[&3], Ipv4Addr::new(120, 0, 0, 9));
    assert_eq!(plan.get(&3).unwrap().as_lan[&2], Ipv4Addr::new(120, 0, 0, 10));
    assert_eq!(plan.get(&4).unwrap().as_lan[&3], Ipv4Addr::new(120, 0, 0, 13));
    assert_eq!(allocator.cursor(), Ipv4Addr::new(120, 0, 0, 16));
}

#[test]
fn test_every_edge_resolved_once_and_symmetric() {
    let topology = topology(BTreeSet::new());
    let plan = AddressPlan::synthesize(&topology, &mut LinkAllocator::new()).unwrap();

    let mut blocks = HashSet::new();
    for record in plan.iter() {
        for (rel, link) in record.links() {
            let peer = plan.get(&link.peer).unwrap();
            // the link carries the peer's own address
            assert_eq!(peer.as_lan[&record.asn], link.address);
            // and the peer sees this AS under the inverse relationship
            assert!(peer
                .get_links(rel.invert())
                .iter()
                .any(|back| back.peer == record.asn && back.address == record.as_lan[&link.peer]));

            let [a, b, c, d] = link.address.octets();
            let [_, _, _, own] = record.as_lan[&link.peer].octets();
            assert_eq!(d & !3, own & !3);
            blocks.insert(Ipv4Addr::new(a, b, c, d & !3));
        }
        let neighbors: usize = Relationships::ALL
            .iter()
            .map(|rel| record.get_links(*rel).len())
            .sum();
        assert_eq!(record.as_lan.len(), neighbors);
    }
    // 1-2, 1-3, 2-3, 3-4
    assert_eq!(blocks.len(), 4);
}

#[test]
fn test_synthesis_is_deterministic() {
    let first =
        AddressPlan::synthesize(&topology(btreeset! {2}), &mut LinkAllocator::new()).unwrap();
    let second =
        AddressPlan::synthesize(&topology(btreeset! {2}), &mut LinkAllocator::new()).unwrap();
    assert_eq!(first, second);
    assert!(first.get(&2).unwrap().is_rpki());
    assert!(!first.get(&3).unwrap().is_rpki());
}

#[test]
fn test_cursor_never_repeats() {
    let mut allocator = LinkAllocator::starting_at(Ipv4Addr::new(120, 0, 254, 240));
    let mut seen = HashSet::new();
    for _ in 0..200 {
        let block = allocator.allocate().unwrap();
        assert!(seen.insert(block.base()));
    }
    assert!(seen.contains(&Ipv4Addr::new(120, 0, 255, 252)));
    assert!(seen.contains(&Ipv4Addr::new(120, 1, 120, 0)));
}

#[test]
fn test_neighbor_record_json_shape() {
    let topology = topology(BTreeSet::new());
    let plan = AddressPlan::synthesize(&topology, &mut LinkAllocator::new()).unwrap();
    let value = plan.to_json_value().unwrap();

    assert_eq!(value["2"]["c2p"], serde_json::json!([{"1": "120.0.0.2"}]));
    assert_eq!(value["2"]["asLan"]["1"], serde_json::json!("120.0.0.1"));
    assert_eq!(value["2"]["internalLan"], serde_json::json!("2.0.0.1"));
    assert_eq!(value["2"]["rpki"], serde_json::json!("no"));
    assert_eq!(value["2"]["coll"], serde_json::json!("no"));
}

#[test]
fn test_customer_resolving_before_its_provider() {
    // 10 -> 30 -> 3: AS 3 comes before its provider 30 in synthesis order
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(10, 30);
    as_graph.add_provider_customer(30, 3);
    let cone = CustomerCone::build(&as_graph, 10).unwrap();
    let topology = Topology::enrich(&cone, &BTreeSet::new(), &BTreeSet::new());
    let mut allocator = LinkAllocator::new();
    let plan = AddressPlan::synthesize(&topology, &mut allocator).unwrap();

    assert_eq!(plan.order(), &[10, 3, 30]);
    let provider = plan.get(&30).unwrap();
    let customer = plan.get(&3).unwrap();
    // still provider .2 and customer .1
    assert_eq!(provider.as_lan[&3], Ipv4Addr::new(120, 0, 0, 6));
    assert_eq!(customer.as_lan[&30], Ipv4Addr::new(120, 0, 0, 5));
    assert_eq!(provider.as_lan[&10], Ipv4Addr::new(120, 0, 0, 1));
    assert_eq!(plan.get(&10).unwrap().as_lan[&30], Ipv4Addr::new(120, 0, 0, 2));

    let up = customer.get_links(Relationships::Providers);
    assert_eq!(up.len(), 1);
    assert_eq!((up[0].peer, up[0].address), (30, Ipv4Addr::new(120, 0, 0, 6)));
    let down = provider.get_links(Relationships::Customers);
    assert_eq!(down.len(), 1);
    assert_eq!((down[0].peer, down[0].address), (3, Ipv4Addr::new(120, 0, 0, 5)));
    assert_eq!(allocator.cursor(), Ipv4Addr::new(120, 0, 0, 8));
}
