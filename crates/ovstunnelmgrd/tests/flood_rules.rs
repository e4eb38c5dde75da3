//! Flood rule computation over a growing tunnel mesh.

use ovsmgr_ovstunnelmgrd::{flood, BridgePort};

fn mesh(host_count: u64) -> Vec<BridgePort> {
    // one local vif plus a tunnel to every other host
    let mut ports = vec![BridgePort::new("vif1.0", 1)];
    for host in 2..=host_count {
        ports.push(BridgePort::new(
            format!("t900-1-{}", host),
            10 + host as u32,
        ));
    }
    ports
}

#[test]
fn every_port_gets_exactly_one_rule_plus_default() {
    for hosts in [1, 2, 5, 9] {
        let ports = mesh(hosts);
        let flows = flood::flood_flows(&ports);
        assert_eq!(flows.len(), ports.len() + 1, "hosts={}", hosts);
    }
}

#[test]
fn mesh_growth_never_creates_tunnel_to_tunnel_paths() {
    let ports = mesh(6);
    let flows = flood::flood_flows(&ports);

    for flow in &flows {
        let rendered = flow.render();
        let Some(in_port) = ports.iter().find(|p| {
            rendered.contains(&format!("in_port={},", p.ofport))
        }) else {
            continue; // the table default
        };
        if !in_port.is_tunnel() {
            continue;
        }
        for other in ports.iter().filter(|p| p.is_tunnel()) {
            assert!(
                !rendered.contains(&format!("output:{}", other.ofport)),
                "tunnel {} floods to tunnel {}",
                in_port.name,
                other.name
            );
        }
    }
}

#[test]
fn vif_only_bridge_floods_between_vifs() {
    let ports = vec![BridgePort::new("vif1.0", 1), BridgePort::new("vif2.0", 2)];
    let flows = flood::flood_flows(&ports);
    let rendered: Vec<String> = flows.iter().map(|f| f.render()).collect();

    assert!(rendered
        .iter()
        .any(|f| f.contains("in_port=1,") && f.ends_with("actions=output:2")));
    assert!(rendered
        .iter()
        .any(|f| f.contains("in_port=2,") && f.ends_with("actions=output:1")));
}
