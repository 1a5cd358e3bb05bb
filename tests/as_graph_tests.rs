use std::io::Cursor;

use conelab::as_graph::{ASGraph, AS};
use conelab::as_graph_generators::caida::{generate_as_graph, ASRelation, CAIDAASGraphJSONConverter};
use conelab::shared::Relationships;
use conelab::Error;

const RELATIONS: &str = "\
# source:topology|BGP|20240101|arin
# input clique: 1 2
# IXP ASes: 9
1|2|0|bgp
1|10|-1
1|11|-1
10|20|-1
11|20|-1
2|30|-1
this line is garbage
10|11|0
";

#[test]
fn test_as_creation() {
    let as1 = AS::from_asn_lists(100, vec![200, 300], vec![400], vec![500, 600]);

    assert_eq!(as1.asn, 100);
    assert_eq!(as1.peers.len(), 2);
    assert_eq!(as1.providers.len(), 1);
    assert_eq!(as1.customers.len(), 2);
    assert_eq!(as1.get_neighbors(Relationships::Peers), &[200, 300]);
    assert_eq!(as1.get_neighbors(Relationships::Providers), &[400]);
    assert_eq!(as1.get_neighbors(Relationships::Customers), &[500, 600]);
    assert!(!as1.is_stub());
}

#[test]
fn test_relationships_are_mirrored() {
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(1, 2);
    as_graph.add_peers(2, 3);
    as_graph.add_peers(3, 2);
    as_graph.add_provider_customer(1, 2);

    assert_eq!(as_graph.len(), 3);
    assert_eq!(as_graph.get(&1).unwrap().customers, vec![2]);
    assert_eq!(as_graph.get(&2).unwrap().providers, vec![1]);
    assert_eq!(as_graph.get(&2).unwrap().peers, vec![3]);
    assert_eq!(as_graph.get(&3).unwrap().peers, vec![2]);
}

#[test]
fn test_parse_relationship_records() {
    let metadata = CAIDAASGraphJSONConverter::parse_reader(Cursor::new(RELATIONS)).unwrap();

    assert_eq!(metadata.clique, vec![1, 2]);
    assert_eq!(metadata.ixp_ases, vec![9]);
    assert_eq!(metadata.as_relations.len(), 7);
    assert_eq!(
        metadata.as_relations[0],
        ASRelation::Peers {
            a: 1,
            b: 2,
            source: Some("bgp".to_string())
        }
    );
    assert_eq!(
        metadata.as_relations[1],
        ASRelation::ProviderCustomer {
            provider: 1,
            customer: 10
        }
    );

    let as_graph = generate_as_graph(&metadata);
    assert_eq!(as_graph.len(), 6);
    assert!(as_graph.get(&1).unwrap().tier_1);
    assert_eq!(as_graph.get(&20).unwrap().providers, vec![10, 11]);
    assert_eq!(as_graph.get(&11).unwrap().peers, vec![10]);
}

#[test]
fn test_validate_cone_root() {
    let metadata = CAIDAASGraphJSONConverter::parse_reader(Cursor::new(RELATIONS)).unwrap();
    let as_graph = generate_as_graph(&metadata);

    assert!(as_graph.validate_cone_root(1).is_ok());
    assert!(matches!(as_graph.validate_cone_root(20), Err(Error::RootIsLeaf(20))));
    assert!(matches!(as_graph.validate_cone_root(99), Err(Error::RootNotFound(99))));
}

#[test]
fn test_json_round_trip_uses_string_keys() {
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(3356, 174);
    as_graph.add_peers(3356, 1299);

    let value = as_graph.to_json_value().unwrap();
    assert_eq!(value["3356"]["p2c"], serde_json::json!(["174"]));
    assert_eq!(value["174"]["c2p"], serde_json::json!(["3356"]));

    let restored = ASGraph::from_json_str(&value.to_string()).unwrap();
    assert_eq!(restored, as_graph);
}
