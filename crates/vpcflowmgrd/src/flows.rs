//! Flow computation for VPC topology and routing-policy updates.
//!
//! Everything here is pure: given parsed configuration and resolved ofports,
//! these functions return the exact flow set to program. Resolution and
//! execution live in [`crate::vpc_mgr`].

use tracing::warn;

use ovsmgr_common::flow::{Action, FlowMatch, FlowSpec, Protocol};
use ovsmgr_common::pipeline::{
    ACL_PRIORITY_BASE, CLASSIFIER_TABLE, EGRESS_ACL_TABLE, INGRESS_ACL_TABLE, IPV4_MULTICAST,
    L2_FLOOD_TABLE, L2_LOOKUP_TABLE, L3_LOOKUP_TABLE, MAC_BROADCAST, PRIO_CLASSIFIER,
    PRIO_DEFAULT, PRIO_LOCAL, PRIO_REMOTE,
};
use ovsmgr_common::FlowMgrResult;

use crate::config::{AclAction, AclDirection, AclItem, Vpc, VpcNic, VpcTier};

/// Port ranges wider than this are programmed anyway but flagged, since
/// each port becomes its own flow entry.
const PORT_RANGE_WARN: u16 = 256;

/// Base pipeline for a VPC bridge: classifier steering and table defaults.
pub fn default_pipeline_flows(vpc: &Vpc) -> Vec<FlowSpec> {
    let mut flows = vec![
        // broadcast and link-local multicast replicate through the flood table
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
        // anything else is switched
        FlowSpec::new(FlowMatch::new().table(CLASSIFIER_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Resubmit(L2_LOOKUP_TABLE)),
        // unknown unicast floods
        FlowSpec::new(FlowMatch::new().table(L2_LOOKUP_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Resubmit(L2_FLOOD_TABLE)),
        // flood table only forwards through explicit per-port rules
        FlowSpec::new(FlowMatch::new().table(L2_FLOOD_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Drop),
        // unroutable destinations die here
        FlowSpec::new(FlowMatch::new().table(L3_LOOKUP_TABLE))
            .priority(PRIO_DEFAULT)
            .action(Action::Drop),
    ];

    // traffic addressed to a tier gateway is routed, not switched
    for tier in &vpc.tiers {
        flows.push(
            FlowSpec::new(
                FlowMatch::new()
                    .table(CLASSIFIER_TABLE)
                    .dl_dst(&tier.gatewaymac),
            )
            .priority(PRIO_CLASSIFIER)
            .action(Action::Resubmit(EGRESS_ACL_TABLE)),
        );
    }

    flows
}

/// Flows for a NIC attached on this host.
pub fn local_nic_flows(nic: &VpcNic, tier: &VpcTier, vif_ofport: u32) -> Vec<FlowSpec> {
    vec![
        FlowSpec::new(
            FlowMatch::new()
                .table(L2_LOOKUP_TABLE)
                .dl_dst(&nic.macaddress),
        )
        .priority(PRIO_LOCAL)
        .action(Action::Output(vif_ofport)),
        FlowSpec::new(
            FlowMatch::new()
                .table(L3_LOOKUP_TABLE)
                .nw_dst(&nic.ipaddress),
        )
        .priority(PRIO_LOCAL)
        .action(Action::ModDlSrc(tier.gatewaymac.clone()))
        .action(Action::ModDlDst(nic.macaddress.clone()))
        .action(Action::Resubmit(INGRESS_ACL_TABLE)),
    ]
}

/// Flows for a NIC attached on another host, reached through a tunnel.
///
/// Routed traffic is rewritten here and emitted on the tunnel; the sending
/// host already ran the ACL tables.
pub fn remote_nic_flows(nic: &VpcNic, tier: &VpcTier, tunnel_ofport: u32) -> Vec<FlowSpec> {
    vec![
        FlowSpec::new(
            FlowMatch::new()
                .table(L2_LOOKUP_TABLE)
                .dl_dst(&nic.macaddress),
        )
        .priority(PRIO_REMOTE)
        .action(Action::Output(tunnel_ofport)),
        FlowSpec::new(
            FlowMatch::new()
                .table(L3_LOOKUP_TABLE)
                .nw_dst(&nic.ipaddress),
        )
        .priority(PRIO_REMOTE)
        .action(Action::ModDlSrc(tier.gatewaymac.clone()))
        .action(Action::ModDlDst(nic.macaddress.clone()))
        .action(Action::Output(tunnel_ofport)),
    ]
}

/// Expands one ACL rule into flows for the tier it protects.
pub fn acl_item_flows(tier_cidr: &str, item: &AclItem) -> FlowMgrResult<Vec<FlowSpec>> {
    let proto: Protocol = item.protocol.parse()?;
    let priority = ACL_PRIORITY_BASE.saturating_add(item.number);

    let verdict = match (item.direction, item.action) {
        (_, AclAction::Deny) => Action::Drop,
        (AclDirection::Ingress, AclAction::Allow) => Action::Resubmit(L2_LOOKUP_TABLE),
        (AclDirection::Egress, AclAction::Allow) => Action::Resubmit(L3_LOOKUP_TABLE),
    };

    let table = match item.direction {
        AclDirection::Ingress => INGRESS_ACL_TABLE,
        AclDirection::Egress => EGRESS_ACL_TABLE,
    };

    let ports = port_range(item, proto);
    if let Some(range) = &ports {
        let span = range.end() - range.start() + 1;
        if span > PORT_RANGE_WARN {
            warn!(
                rule = item.number,
                ports = span,
                "Wide ACL port range expands to one flow per port"
            );
        }
    }

    let mut flows = Vec::new();
    for source_cidr in &item.sourcecidrs {
        // ingress rules constrain where traffic into the tier may come
        // from; egress rules constrain where tier traffic may go
        let (nw_src, nw_dst) = match item.direction {
            AclDirection::Ingress => (source_cidr.as_str(), tier_cidr),
            AclDirection::Egress => (tier_cidr, source_cidr.as_str()),
        };
        match &ports {
            Some(range) => {
                for port in range.clone() {
                    flows.push(
                        FlowSpec::new(
                            FlowMatch::new()
                                .table(table)
                                .proto(proto)
                                .nw_src(nw_src)
                                .nw_dst(nw_dst)
                                .tp_dst(port),
                        )
                        .priority(priority)
                        .action(verdict.clone()),
                    );
                }
            }
            None => {
                flows.push(
                    FlowSpec::new(
                        FlowMatch::new()
                            .table(table)
                            .proto(proto)
                            .nw_src(nw_src)
                            .nw_dst(nw_dst),
                    )
                    .priority(priority)
                    .action(verdict.clone()),
                );
            }
        }
    }
    Ok(flows)
}

/// The destination-port range a rule covers, if the protocol has ports and
/// a range was given. A reversed range collapses to the start port.
fn port_range(item: &AclItem, proto: Protocol) -> Option<std::ops::RangeInclusive<u16>> {
    if !proto.has_ports() || item.sourceportstart == 0 {
        return None;
    }
    let end = item.sourceportend.max(item.sourceportstart);
    Some(item.sourceportstart..=end)
}

/// Table defaults applied after the explicit ACL rules: traffic leaving a
/// tier passes unless a rule says otherwise, traffic entering a tier is
/// dropped unless a rule admits it.
pub fn acl_default_flows(any_egress: bool, any_ingress: bool) -> Vec<FlowSpec> {
    let mut flows = Vec::new();
    if !any_egress {
        flows.push(
            FlowSpec::new(FlowMatch::new().table(EGRESS_ACL_TABLE))
                .priority(PRIO_DEFAULT)
                .action(Action::Resubmit(L3_LOOKUP_TABLE)),
        );
    }
    if !any_ingress {
        flows.push(
            FlowSpec::new(FlowMatch::new().table(INGRESS_ACL_TABLE))
                .priority(PRIO_DEFAULT)
                .action(Action::Drop),
        );
    }
    flows
}

/// Full ACL flow set for a routing-policy push.
pub fn routing_policy_flows(vpc: &Vpc) -> FlowMgrResult<Vec<FlowSpec>> {
    let mut flows = Vec::new();
    let mut any_egress = false;
    let mut any_ingress = false;

    for tier in &vpc.tiers {
        let acl_id = match &tier.aclid {
            Some(id) => id,
            None => continue,
        };
        let acl = match vpc.acl_by_id(acl_id) {
            Some(acl) => acl,
            None => {
                warn!(tier = %tier.networkuuid, acl = %acl_id, "Tier references unknown ACL");
                continue;
            }
        };
        for item in &acl.aclitems {
            let emitted = acl_item_flows(&tier.cidr, item)?;
            // an item with no source cidrs emits nothing and must not
            // suppress the direction's default
            if !emitted.is_empty() {
                match item.direction {
                    AclDirection::Egress => any_egress = true,
                    AclDirection::Ingress => any_ingress = true,
                }
            }
            flows.extend(emitted);
        }
    }

    flows.extend(acl_default_flows(any_egress, any_ingress));
    Ok(flows)
}
