use conelab::as_graph::ASGraph;
use conelab::customer_cone::statistics::ConeStatistics;
use conelab::customer_cone::CustomerCone;
use conelab::shared::Relationships;

/// Root 1 with customers 2 and 3; 3 has customer 4.
fn four_as_graph() -> ASGraph {
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(1, 2);
    as_graph.add_provider_customer(1, 3);
    as_graph.add_provider_customer(3, 4);
    as_graph
}

#[test]
fn test_four_as_cone() {
    let cone = CustomerCone::build(&four_as_graph(), 1).unwrap();

    assert_eq!(cone.len(), 4);
    assert_eq!(cone.root(), 1);
    let root = cone.get(&1).unwrap();
    assert_eq!(root.p2c.len(), 2);
    assert_eq!((root.level_min, root.level_max), (0, 0));
    let leaf = cone.get(&4).unwrap();
    assert_eq!(leaf.level_max, 2);
    assert!(leaf.is_leaf());
    assert_eq!(leaf.c2p, vec![3]);
}

#[test]
fn test_root_on_customer_cycle_stays_at_level_zero() {
    // 1 -> 2 -> 3 -> 1
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(1, 2);
    as_graph.add_provider_customer(2, 3);
    as_graph.add_provider_customer(3, 1);

    let cone = CustomerCone::build(&as_graph, 1).unwrap();
    assert_eq!(cone.len(), 3);
    let root = cone.get(&1).unwrap();
    assert_eq!((root.level_min, root.level_max), (0, 0));
    assert_eq!(root.c2p, vec![3]);
    let last = cone.get(&3).unwrap();
    assert_eq!((last.level_min, last.level_max), (2, 2));
}

#[test]
fn test_levels_track_shortest_and_longest_path() {
    // 5 is reachable directly from the root and through 2 -> 3
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(1, 2);
    as_graph.add_provider_customer(2, 3);
    as_graph.add_provider_customer(3, 5);
    as_graph.add_provider_customer(1, 5);
    as_graph.add_provider_customer(5, 6);

    let cone = CustomerCone::build(&as_graph, 1).unwrap();
    let node = cone.get(&5).unwrap();
    assert_eq!((node.level_min, node.level_max), (1, 3));
    // the deeper path is walked first; the shallower revisit does not descend again
    let below = cone.get(&6).unwrap();
    assert_eq!((below.level_min, below.level_max), (4, 4));

    for (_, node) in cone.iter() {
        assert!(node.level_min <= node.level_max);
    }
}

#[test]
fn test_edges_leaving_the_cone_are_dropped() {
    let mut as_graph = four_as_graph();
    as_graph.add_provider_customer(100, 2);
    as_graph.add_peers(2, 3);
    as_graph.add_peers(3, 200);

    let cone = CustomerCone::build(&as_graph, 1).unwrap();
    assert!(!cone.contains(&100));
    assert!(!cone.contains(&200));
    assert_eq!(cone.get(&2).unwrap().c2p, vec![1]);
    assert_eq!(cone.get(&2).unwrap().get_neighbors(Relationships::Peers), &[3]);
    assert_eq!(cone.get(&3).unwrap().p2p, vec![2]);
}

#[test]
fn test_sub_cone_root() {
    let cone = CustomerCone::build(&four_as_graph(), 3).unwrap();
    assert_eq!(cone.len(), 2);
    assert!(cone.get(&3).unwrap().c2p.is_empty());
    assert_eq!(cone.synthesis_order(), vec![3, 4]);
}

#[test]
fn test_json_uses_level_keys_and_restores_root() {
    let cone = CustomerCone::build(&four_as_graph(), 1).unwrap();
    let value = cone.to_json_value().unwrap();
    assert_eq!(value["4"]["levelMin"], serde_json::json!(2));
    assert_eq!(value["1"]["p2c"], serde_json::json!(["2", "3"]));

    let restored = CustomerCone::from_json_str(&value.to_string()).unwrap();
    assert_eq!(restored, cone);
}

#[test]
fn test_statistics() {
    let cone = CustomerCone::build(&four_as_graph(), 1).unwrap();
    let stats = ConeStatistics::compute(&cone);
    assert_eq!(stats.size, 4);
    assert_eq!(stats.p2c_edges, 3);
    assert_eq!(stats.c2p_edges, 3);
    assert_eq!(stats.p2p_edges, 0);
    assert_eq!(stats.sub_cones, 1);
    assert_eq!(stats.deepest_level_max, 2);
    assert_eq!(stats.leaders.get(Relationships::Customers).unwrap().asn, 1);
}
