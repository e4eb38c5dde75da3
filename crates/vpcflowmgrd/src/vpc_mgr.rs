//! VpcFlowMgr - programs a VPC bridge from pushed configuration.

use tracing::{debug, info, instrument, warn};

use ovsmgr_common::flow::{FlowMatch, FlowSpec};
use ovsmgr_common::pipeline::{EGRESS_ACL_TABLE, INGRESS_ACL_TABLE};
use ovsmgr_common::{
    ovs, shell, FlowMgrError, FlowMgrResult, PortLookup, SeqStatus, SequenceKind, SequenceStore,
};

use crate::config::Vpc;
use crate::flows;
use ovsmgr_common::naming::tunnel_port_name;

/// What a configuration push amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Flows were programmed and the sequence recorded.
    Applied {
        /// Number of flow entries written.
        flows: usize,
    },
    /// The push was older than the applied state and was ignored.
    Stale {
        /// The sequence currently applied on the bridge.
        current: u64,
    },
}

/// VPC flow manager.
///
/// Update flow:
/// 1. Topology push → classifier/lookup/flood tables rebuilt from the
///    VM and host placement
/// 2. Routing-policy push → ACL tables flushed and rebuilt
pub struct VpcFlowMgr<L: PortLookup> {
    lookup: L,
    sequences: SequenceStore,

    #[cfg(test)]
    mock_mode: bool,

    #[cfg(test)]
    captured_commands: Vec<String>,
}

impl<L: PortLookup> VpcFlowMgr<L> {
    /// Creates a manager resolving ports through the given lookup.
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            sequences: SequenceStore::default(),
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            captured_commands: Vec::new(),
        }
    }

    /// Overrides the sequence store location.
    pub fn with_sequence_store(mut self, store: SequenceStore) -> Self {
        self.sequences = store;
        self
    }

    #[cfg(test)]
    pub fn with_mock_mode(mut self) -> Self {
        self.mock_mode = true;
        self
    }

    #[cfg(test)]
    pub fn captured_commands(&self) -> &[String] {
        &self.captured_commands
    }

    /// Execute a shell command (with mock mode support)
    async fn exec(&mut self, cmd: &str) -> FlowMgrResult<()> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.push(cmd.to_string());
            return Ok(());
        }

        shell::exec_or_throw(cmd).await?;
        Ok(())
    }

    async fn program(&mut self, bridge: &str, flow_set: &[FlowSpec]) -> FlowMgrResult<()> {
        for flow in flow_set {
            let cmd = ovs::build_add_flow_cmd(bridge, flow);
            self.exec(&cmd).await?;
        }
        Ok(())
    }

    /// Resolves a lookup, turning a missing port into `None` so one
    /// unplugged VIF or absent tunnel does not abort the whole update.
    fn skip_missing<T>(result: FlowMgrResult<T>, what: &str) -> FlowMgrResult<Option<T>> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(FlowMgrError::PortNotFound { .. }) => {
                warn!(port = %what, "Port not attached yet, skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuilds the bridge's forwarding tables from a topology push.
    #[instrument(skip(self, vpc), fields(vpc = %vpc.id))]
    pub async fn configure_network_topology(
        &mut self,
        bridge: &str,
        host_id: u64,
        vpc: &Vpc,
        sequence_no: u64,
    ) -> FlowMgrResult<ApplyOutcome> {
        if let SeqStatus::Stale { current } = self
            .sequences
            .check(bridge, SequenceKind::Topology, sequence_no)
            .await?
        {
            info!(
                bridge = %bridge,
                incoming = sequence_no,
                current = current,
                "Topology push is stale, ignoring"
            );
            return Ok(ApplyOutcome::Stale { current });
        }

        let mut flow_set = flows::default_pipeline_flows(vpc);

        // VMs on this host, reached through their VIFs
        for vm in vpc.vms_on_host(host_id) {
            for nic in &vm.nics {
                let tier = match vpc.tier_for_network(&nic.networkuuid) {
                    Some(t) => t,
                    None => {
                        warn!(network = %nic.networkuuid, "NIC references unknown tier");
                        continue;
                    }
                };
                let vif = match Self::skip_missing(
                    self.lookup.iface_by_mac(&nic.macaddress).await,
                    &nic.macaddress,
                )? {
                    Some(v) => v,
                    None => continue,
                };
                let ofport = match Self::skip_missing(self.lookup.ofport(&vif).await, &vif)? {
                    Some(p) => p,
                    None => continue,
                };
                flow_set.extend(flows::local_nic_flows(nic, tier, ofport));
            }
        }

        // VMs on the other hosts the VPC spans, reached through tunnels
        for host in vpc.remote_hosts(host_id) {
            for vm in vpc.vms_on_host(host.id) {
                for nic in &vm.nics {
                    let tier = match vpc.tier_for_network(&nic.networkuuid) {
                        Some(t) => t,
                        None => {
                            warn!(network = %nic.networkuuid, "NIC references unknown tier");
                            continue;
                        }
                    };
                    let tunnel = tunnel_port_name(tier.grekey, host_id, host.id);
                    let ofport =
                        match Self::skip_missing(self.lookup.ofport(&tunnel).await, &tunnel)? {
                            Some(p) => p,
                            None => continue,
                        };
                    flow_set.extend(flows::remote_nic_flows(nic, tier, ofport));
                }
            }
        }

        self.program(bridge, &flow_set).await?;
        self.sequences
            .store(bridge, SequenceKind::Topology, sequence_no)
            .await?;

        info!(
            bridge = %bridge,
            flows = flow_set.len(),
            seq = sequence_no,
            "Topology applied"
        );
        Ok(ApplyOutcome::Applied {
            flows: flow_set.len(),
        })
    }

    /// Rebuilds the ACL tables from a routing-policy push.
    #[instrument(skip(self, vpc), fields(vpc = %vpc.id))]
    pub async fn configure_routing_policies(
        &mut self,
        bridge: &str,
        vpc: &Vpc,
        sequence_no: u64,
    ) -> FlowMgrResult<ApplyOutcome> {
        if let SeqStatus::Stale { current } = self
            .sequences
            .check(bridge, SequenceKind::Policy, sequence_no)
            .await?
        {
            info!(
                bridge = %bridge,
                incoming = sequence_no,
                current = current,
                "Policy push is stale, ignoring"
            );
            return Ok(ApplyOutcome::Stale { current });
        }

        let flow_set = flows::routing_policy_flows(vpc)?;

        // flush before reapplying so removed rules disappear
        for table in [INGRESS_ACL_TABLE, EGRESS_ACL_TABLE] {
            let cmd = ovs::build_del_flows_cmd(bridge, &FlowMatch::new().table(table));
            self.exec(&cmd).await?;
        }
        debug!(bridge = %bridge, "ACL tables flushed");

        self.program(bridge, &flow_set).await?;
        self.sequences
            .store(bridge, SequenceKind::Policy, sequence_no)
            .await?;

        info!(
            bridge = %bridge,
            flows = flow_set.len(),
            seq = sequence_no,
            "Routing policies applied"
        );
        Ok(ApplyOutcome::Applied {
            flows: flow_set.len(),
        })
    }
}
