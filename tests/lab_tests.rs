use std::collections::BTreeSet;
use std::fs;

use conelab::as_graph::ASGraph;
use conelab::config::LabConfig;
use conelab::customer_cone::CustomerCone;
use conelab::lab::{
    Lab, ATTACK_SCRIPT_FILE, COLLISION_DOMAINS_FILE, LAB_CONF_FILE, NODE_SELECTION_FILE,
};
use conelab::policy::route_map::RpkiState;
use conelab::topology::NodeSelection;
use conelab::Error;
use maplit::btreeset;

/// Root 1 with customers 2 and 3, 3 has customer 4, 2 and 3 peer.
fn cone() -> CustomerCone {
    let mut as_graph = ASGraph::new();
    as_graph.add_provider_customer(1, 2);
    as_graph.add_provider_customer(1, 3);
    as_graph.add_provider_customer(3, 4);
    as_graph.add_peers(2, 3);
    CustomerCone::build(&as_graph, 1).unwrap()
}

fn selection(rpki_nodes: BTreeSet<u32>) -> NodeSelection {
    NodeSelection {
        rpki_nodes,
        collector_nodes: btreeset! {4},
        hacker_node: 2,
        victim_node: 4,
    }
}

fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

#[test]
fn test_lab_conf() {
    let config = LabConfig::default();
    let lab = Lab::synthesize(&config, &cone(), &selection(btreeset! {3})).unwrap();
    let artifacts = lab.render(&config).unwrap();
    let lab_conf = lines(artifacts.get(LAB_CONF_FILE).unwrap());

    assert_eq!(
        &lab_conf[..6],
        &[
            "router1[0]=\"1to2\"",
            "router1[1]=\"1to3\"",
            "router1[2]=\"1\"",
            "router1[3]=\"krill\"",
            "router1[image]=\"kathara/frr3\"",
            "",
        ]
    );
    assert_eq!(
        &lab_conf[6..10],
        &[
            "router2[0]=\"2to3\"",
            "router2[1]=\"1to2\"",
            "router2[2]=\"2\"",
            "router2[image]=\"kathara/frr3\"",
        ]
    );
    assert!(lab_conf.contains(&"router3[image]=\"kathara/routinator3\""));
    assert_eq!(
        &lab_conf[lab_conf.len() - 5..],
        &[
            "krill[image]=\"kathara/krill3\"",
            "krill[0]=\"krill\"",
            "krill[env]=\"KRILL_CLI_TOKEN=kathara-secret-token\"",
            "krill[env]=\"KRILL_TEST=true\"",
            "krill[env]=\"KRILL_CLI_MY_CA=kathara-ca\"",
        ]
    );

    let domains: serde_json::Value =
        serde_json::from_str(artifacts.get(COLLISION_DOMAINS_FILE).unwrap()).unwrap();
    assert_eq!(domains["router3"], serde_json::json!(["2to3", "3to4", "1to3", "3"]));
    assert_eq!(domains["router4"], serde_json::json!(["3to4", "4"]));
}

#[test]
fn test_router_startup_addressing() {
    let config = LabConfig::default();
    let lab = Lab::synthesize(&config, &cone(), &selection(btreeset! {3})).unwrap();
    let artifacts = lab.render(&config).unwrap();

    assert_eq!(
        lines(artifacts.get("router1.startup").unwrap()),
        vec![
            "ip addr add 120.0.0.2/30 dev eth0",
            "ip addr add 120.0.0.6/30 dev eth1",
            "ip addr add 1.0.0.1/24 dev eth2",
            "ip addr add 115.115.115.1/24 dev eth3",
            "systemctl start frr",
        ]
    );

    let rpki_router = lines(artifacts.get("router3.startup").unwrap());
    assert_eq!(
        &rpki_router[..5],
        &[
            "ip addr add 120.0.0.10/30 dev eth0",
            "ip addr add 120.0.0.14/30 dev eth1",
            "ip addr add 120.0.0.5/30 dev eth2",
            "ip addr add 3.0.0.1/24 dev eth3",
            "update-ca-certificates --fresh",
        ]
    );
    assert!(rpki_router.contains(&"MAX_ROUTES=5"));
    assert!(rpki_router.contains(&"vtysh -c \"rpki start\""));

    let collector = lines(artifacts.get("router4.startup").unwrap());
    assert_eq!(
        collector,
        vec![
            "ip addr add 120.0.0.13/30 dev eth0",
            "ip addr add 4.0.0.1/24 dev eth1",
            "mkdir -p /shared/dumps",
            "chmod 777 /shared",
            "chmod 777 /shared/dumps",
            "systemctl start frr",
        ]
    );
}

#[test]
fn test_krill_publishes_lab_roas() {
    let config = LabConfig::default();
    let lab = Lab::synthesize(&config, &cone(), &selection(btreeset! {3})).unwrap();
    let artifacts = lab.render(&config).unwrap();
    let krill = lines(artifacts.get("krill.startup").unwrap());

    assert_eq!(krill[0], "ip addr add 115.115.115.2/24 dev eth0");
    assert_eq!(
        &krill[krill.len() - 3..],
        &[
            "krillc roas update --ca $CA --remove \"0.0.0.0/0 => 0\"",
            "krillc roas update --ca $CA --add \"115.115.115.0/24 => 3\"",
            "krillc roas update --ca $CA --add \"3.0.0.0/24 => 3\"",
        ]
    );
}

#[test]
fn test_attack_script() {
    let config = LabConfig::default();
    let lab = Lab::synthesize(&config, &cone(), &selection(BTreeSet::new())).unwrap();
    let artifacts = lab.render(&config).unwrap();

    assert_eq!(
        lines(artifacts.get(ATTACK_SCRIPT_FILE).unwrap()),
        vec![
            "#!/bin/bash",
            "ip addr add 4.0.0.1/24 dev lo",
            "vtysh -c \"conf t\" \\",
            "      -c \"router bgp 2\" \\",
            "      -c \"network 4.0.0.0/24\" \\",
            "      -c \"ip prefix-list export permit 4.0.0.0/24\" \\",
            "      -c \"exit\" \\",
            "      -c \"exit\" \\",
            "      -c \"clear ip bgp * out\"",
        ]
    );
}

#[test]
fn test_router_files() {
    let config = LabConfig::default();
    let lab = Lab::synthesize(&config, &cone(), &selection(BTreeSet::new())).unwrap();
    let artifacts = lab.render(&config).unwrap();

    // 5 lab-wide files, 3 per router, 4 router startups, krill and the attack script
    assert_eq!(artifacts.len(), 23);
    assert_eq!(
        artifacts.get("router2/etc/frr/vtysh.conf").unwrap(),
        "service integrated-vtysh-config\nhostname router2-frr\n"
    );
    assert_eq!(
        artifacts.get("router2/etc/resolv.conf").unwrap(),
        "nameserver 8.8.8.8\n"
    );
    let frr = artifacts.get("router2/etc/frr/frr.conf").unwrap();
    assert!(frr.lines().any(|line| line == "router bgp 2"));

    let selection: NodeSelection =
        serde_json::from_str(artifacts.get(NODE_SELECTION_FILE).unwrap()).unwrap();
    assert_eq!(selection.hacker_node, 2);
    assert_eq!(selection.victim_node, 4);
    assert_eq!(selection.collector_nodes, btreeset! {4});
}

#[test]
fn test_hijack_prediction() {
    let config = LabConfig::default();
    let without_roa = Lab::synthesize(&config, &cone(), &selection(btreeset! {3})).unwrap();
    assert_eq!(without_roa.predicted_hijack_state(), RpkiState::NotFound);

    let with_roa = Lab::synthesize(&config, &cone(), &selection(btreeset! {3, 4})).unwrap();
    assert_eq!(with_roa.predicted_hijack_state(), RpkiState::Invalid);
}

#[test]
fn test_invalid_selection_is_rejected() {
    let config = LabConfig::default();
    let mut outside = selection(BTreeSet::new());
    outside.victim_node = 42;
    assert!(matches!(
        Lab::synthesize(&config, &cone(), &outside),
        Err(Error::UnknownAs(42))
    ));

    let mut same = selection(BTreeSet::new());
    same.victim_node = 2;
    assert!(matches!(
        Lab::synthesize(&config, &cone(), &same),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_write_to_directory() {
    let config = LabConfig::default();
    let lab = Lab::synthesize(&config, &cone(), &selection(BTreeSet::new())).unwrap();
    let artifacts = lab.render(&config).unwrap();

    let dir = std::env::temp_dir().join(format!("conelab-lab-{}", std::process::id()));
    artifacts.write_to(&dir).unwrap();
    assert_eq!(
        fs::read_to_string(dir.join("router4/etc/resolv.conf")).unwrap(),
        "nameserver 8.8.8.8\n"
    );
    assert!(dir.join(ATTACK_SCRIPT_FILE).is_file());
    fs::remove_dir_all(&dir).unwrap();
}
