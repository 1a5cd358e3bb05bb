//! Shell scripts run by the lab machines when they boot.

use crate::address_plan::NeighborRecord;
use crate::route_validator::ROA;
use crate::shared::CommonAddresses;

use super::collision_domain::CollisionDomain;

/// Seconds between two checks of the soft-clear loop.
const SOFT_CLEAR_INTERVAL: u32 = 40;
const SOFT_CLEAR_ATTEMPTS: u32 = 15;

fn addressing(record: &NeighborRecord, interfaces: &[CollisionDomain]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut internal_index = None;
    let mut krill_index = None;
    for (idx, domain) in interfaces.iter().enumerate() {
        match domain {
            CollisionDomain::Link { .. } => {
                let address = domain
                    .peer_of(record.asn)
                    .and_then(|peer| record.as_lan.get(&peer));
                if let Some(address) = address {
                    lines.push(format!("ip addr add {}/30 dev eth{}", address, idx));
                }
            }
            CollisionDomain::Internal(_) => internal_index = Some(idx),
            CollisionDomain::Krill => krill_index = Some(idx),
        }
    }
    if let Some(idx) = internal_index {
        lines.push(format!("ip addr add {}/24 dev eth{}", record.internal_lan, idx));
    }
    if let Some(idx) = krill_index {
        lines.push(format!(
            "ip addr add {}/24 dev eth{}",
            CommonAddresses::ROUTER_TO_KRILL,
            idx
        ));
    }
    lines
}

fn rpki_bootstrap(record: &NeighborRecord) -> Vec<String> {
    let lan = record.internal_lan;
    let tal_fetch = format!(
        "wget --bind-address={} https://rpki-server.org:3000/ta/ta.tal -P /root/.rpki-cache/tals/",
        lan
    );
    vec![
        "update-ca-certificates --fresh".to_string(),
        format!("echo \"{} rpki-server.org\" >> /etc/hosts", CommonAddresses::KRILL),
        "mkdir -p /root/.rpki-cache/tals/".to_string(),
        "mkdir -p /root/.rpki-cache/repository".to_string(),
        "systemctl start frr".to_string(),
        tal_fetch.clone(),
        "while true; do".to_string(),
        format!("    {} 2>&1 | grep \"HTTP\" | grep -q \"200\"", tal_fetch),
        "    if [ $? -eq 0 ]; then".to_string(),
        "        echo \"Correct response received\"".to_string(),
        "        break".to_string(),
        "    else".to_string(),
        "        echo \"Request not successful, trying again...\"".to_string(),
        "    fi".to_string(),
        "    sleep 1".to_string(),
        "done".to_string(),
        format!(
            "routinator --rrdp-local-addr {} --rrdp-root-cert=/usr/local/share/ca-certificates/root.crt -c root/.routinator.conf -v server &",
            lan
        ),
        "vtysh -c \"rpki start\"".to_string(),
    ]
}

/// Keeps soft-clearing the sessions while the table grows or changes, so routes learned before
/// the validator was ready are revalidated.
fn soft_clear_loop(router_count: usize) -> Vec<String> {
    let mut lines = vec![
        format!("MAX_ROUTES={}", router_count + 1),
        format!("INTERVAL={}", SOFT_CLEAR_INTERVAL),
        "PREVIOUS_BGP_OUTPUT=\"\"".to_string(),
        "VALID_ROUTES_DETECTED=False".to_string(),
        format!("MAX_ITERATIONS={}", SOFT_CLEAR_ATTEMPTS),
    ];
    lines.extend(
        [
            "while true; do",
            "    # Check the number of routes with flag N, V o I",
            "    ROUTE_COUNT=$(vtysh -c \"show ip bgp\" | grep -c \"^\\s*\\(N\\|V\\|I\\)\\*\")",
            "    CURRENT_BGP_OUTPUT=$(vtysh -c \"show ip bgp\")",
            "    if [ \"$ROUTE_COUNT\" -gt 0 ]; then",
            "        VALID_ROUTES_DETECTED=true",
            "    fi",
            "    if [ \"$VALID_ROUTES_DETECTED\" = true ]; then",
            "        echo \"Current route count: $ROUTE_COUNT\"",
            "        if [ \"$ROUTE_COUNT\" -ge \"$MAX_ROUTES\" ]; then",
            "            echo \"Route count ($ROUTE_COUNT) has reached or exceeded the limit ($MAX_ROUTES). Checking for changes in the content.\"",
            "            if [ \"$CURRENT_BGP_OUTPUT\" != \"$PREVIOUS_BGP_OUTPUT\" ]; then",
            "                echo \"BGP table content has changed. Clearing BGP sessions.\"",
            "                for ((i=1; i<=MAX_ITERATIONS; i++)); do",
            "                    echo \"Attempt #$i: clear ip bgp * soft\"",
            "                    vtysh -c \"clear ip bgp * soft\"",
            "                    sleep \"$INTERVAL\"",
            "                    CURRENT_BGP_OUTPUT=$(vtysh -c \"show ip bgp\")",
            "                    if [ \"$CURRENT_BGP_OUTPUT\" == \"$PREVIOUS_BGP_OUTPUT\" ]; then",
            "                        echo \"BGP table no longer changing after $i attempts. Done.\"",
            "                        break",
            "                    fi",
            "                done",
            "            else",
            "                echo \"BGP table content has not changed. No action needed.\"",
            "            fi",
            "            PREVIOUS_BGP_OUTPUT=\"$CURRENT_BGP_OUTPUT\"",
            "        else",
            "            echo \"Route count ($ROUTE_COUNT) is below the expected limit ($MAX_ROUTES).\"",
            "            vtysh -c \"clear ip bgp * soft\"",
            "        fi",
            "    else",
            "        echo \"Waiting for valid routes to appear (N, V, I).\"",
            "    fi",
            "    sleep \"$INTERVAL\"",
            "done",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines
}

/// `router<ASN>.startup`.
pub fn router_startup(
    record: &NeighborRecord,
    interfaces: &[CollisionDomain],
    router_count: usize,
) -> Vec<String> {
    let mut lines = addressing(record, interfaces);
    if record.is_collector() {
        lines.extend([
            "mkdir -p /shared/dumps".to_string(),
            "chmod 777 /shared".to_string(),
            "chmod 777 /shared/dumps".to_string(),
        ]);
    }
    if record.is_rpki() {
        lines.extend(rpki_bootstrap(record));
        lines.extend(soft_clear_loop(router_count));
    } else {
        lines.push("systemctl start frr".to_string());
    }
    lines
}

/// `krill.startup`: bring up the RPKI server and publish `roas`.
pub fn krill_startup(roas: &[ROA]) -> Vec<String> {
    let bootstrap_roa = "krillc roas update --ca $CA --add \"0.0.0.0/0 => 0\" > /dev/null 2>&1";
    let mut lines = vec![
        format!("ip addr add {}/24 dev eth0", CommonAddresses::KRILL),
        format!("ip route add default via {}", CommonAddresses::ROUTER_TO_KRILL),
        "update-ca-certificates --fresh".to_string(),
        format!("echo \"{} rpki-server.org\" >> /etc/hosts", CommonAddresses::KRILL),
        String::new(),
        "sed -i 's/\\r$//' /etc/init.d/krill-start".to_string(),
        "sed -i 's/\\r$//' /etc/init.d/krill-stop".to_string(),
        String::new(),
        "# Start HAProxy".to_string(),
        "service haproxy start".to_string(),
        String::new(),
        "# Start Krill".to_string(),
        "/etc/init.d/krill-start".to_string(),
        "krillc health > /dev/null 2>&1".to_string(),
        "while [ $? -ne 0 ]".to_string(),
        "do".to_string(),
        "    sleep 1".to_string(),
        "    krillc health > /dev/null 2>&1".to_string(),
        "done".to_string(),
        String::new(),
        "# Configure CA".to_string(),
        "CA=\"kathara-ca\"".to_string(),
        "krillc add --ca $CA".to_string(),
        "krillc repo request --ca $CA > /tmp/publisher_request.xml".to_string(),
        "krillc pubserver publishers add --publisher $CA --request /tmp/publisher_request.xml > /tmp/repository_response.xml".to_string(),
        "krillc repo configure --ca $CA --format text --response /tmp/repository_response.xml".to_string(),
        "krillc parents request --ca $CA > /tmp/myid.xml".to_string(),
        "krillc children add --ca ta --child $CA --asn \"AS0-65535\" --ipv4 \"0.0.0.0/0\" --request /tmp/myid.xml > /tmp/parent_response.xml".to_string(),
        "krillc parents add --ca $CA --parent ta --response /tmp/parent_response.xml".to_string(),
        String::new(),
        "# Add ROAs dynamically".to_string(),
        bootstrap_roa.to_string(),
        "while [ $? -ne 0 ]".to_string(),
        "do".to_string(),
        "    sleep 1".to_string(),
        format!("    {}", bootstrap_roa),
        "done".to_string(),
        "krillc roas update --ca $CA --remove \"0.0.0.0/0 => 0\"".to_string(),
    ];
    for roa in roas {
        lines.push(format!("krillc roas update --ca $CA --add \"{}\"", roa));
    }
    lines
}
