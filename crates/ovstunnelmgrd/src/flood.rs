//! Flood rule computation for overlay bridges.
//!
//! Broadcast and multicast are replicated through an explicit flood table
//! instead of the switch's flood semantics, so the tunnel mesh can apply
//! split horizon: a frame arriving from one tunnel must never be flooded
//! back into another, or two bridges replicating to each other would loop
//! it forever.

use ovsmgr_common::flow::{Action, FlowMatch, FlowSpec};
use ovsmgr_common::pipeline::{
    CLASSIFIER_TABLE, IPV4_MULTICAST, L2_FLOOD_TABLE, MAC_BROADCAST, PRIO_CLASSIFIER,
    PRIO_DEFAULT, PRIO_FLOOD,
};

use crate::types::BridgePort;

/// Base flows installed once at bridge setup.
///
/// Unicast is left to the switch's MAC learning; only broadcast and
/// link-local multicast are steered into the flood table.
pub fn base_bridge_flows() -> Vec<FlowSpec> {
    vec![
        FlowSpec::new(
            FlowMatch::new()
                .table(CLASSIFIER_TABLE)
                .dl_dst(MAC_BROADCAST),
        )
        .priority(PRIO_CLASSIFIER)
        .action(Action::Resubmit(L2_FLOOD_TABLE)),
        FlowSpec::new(
            FlowMatch::new()
                .table(CLASSIFIER_TABLE)
                .nw_dst(IPV4_MULTICAST),
        )
        .priority(PRIO_CLASSIFIER)
        .action(Action::Resubmit(L2_FLOOD_TABLE)),
        FlowSpec::new(FlowMatch::new().table(CLASSIFIER_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Normal),
        FlowSpec::new(FlowMatch::new().table(L2_FLOOD_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Drop),
    ]
}

/// Per-port flood rules for the current port set.
///
/// A VIF floods to every other port; a tunnel floods to VIFs only. A port
/// with nothing to flood to gets an explicit drop entry so its traffic
/// does not fall through to a stale rule.
pub fn flood_flows(ports: &[BridgePort]) -> Vec<FlowSpec> {
    let mut flows = Vec::with_capacity(ports.len() + 1);

    for port in ports {
        let outputs: Vec<Action> = ports
            .iter()
            .filter(|other| other.ofport != port.ofport)
            .filter(|other| !(port.is_tunnel() && other.is_tunnel()))
            .map(|other| Action::Output(other.ofport))
            .collect();

        flows.push(
            FlowSpec::new(
                FlowMatch::new()
                    .table(L2_FLOOD_TABLE)
                    .in_port(port.ofport),
            )
            .priority(PRIO_FLOOD)
            .actions(outputs),
        );
    }

    // re-established every refresh since the whole table is flushed first
    flows.push(
        FlowSpec::new(FlowMatch::new().table(L2_FLOOD_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Drop),
    );

    flows
}
