//! TunnelFlowMgr - overlay bridge and GRE tunnel lifecycle.

use tracing::{debug, info, instrument, warn};

use ovsmgr_common::flow::{FlowMatch, FlowSpec};
use ovsmgr_common::naming::tunnel_port_name;
use ovsmgr_common::pipeline::L2_FLOOD_TABLE;
use ovsmgr_common::{ovs, shell, FlowMgrError, FlowMgrResult, PortLookup};

use crate::flood;
use crate::types::{BridgePort, EXTERNAL_ID_NETWORK_UUID};

/// Tunnel and flooding manager for one host.
///
/// Lifecycle per overlay network:
/// 1. `setup_bridge` when the network first reaches the host
/// 2. `create_tunnel`/`destroy_tunnel` as the host set changes
/// 3. `vif_plugged`/`vif_unplugged` as guests come and go
/// 4. `destroy_bridge` when the last guest leaves
pub struct TunnelFlowMgr<L: PortLookup> {
    lookup: L,

    #[cfg(test)]
    mock_mode: bool,

    #[cfg(test)]
    captured_commands: Vec<String>,
}

impl<L: PortLookup> TunnelFlowMgr<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            captured_commands: Vec::new(),
        }
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

    /// Creates the overlay bridge and installs its base pipeline.
    #[instrument(skip(self))]
    pub async fn setup_bridge(&mut self, bridge: &str, network_uuid: &str) -> FlowMgrResult<()> {
        self.exec(&ovs::build_add_bridge_cmd(bridge)).await?;
        self.exec(&ovs::build_set_bridge_external_id_cmd(
            bridge,
            EXTERNAL_ID_NETWORK_UUID,
            network_uuid,
        ))
        .await?;

        // start from a clean table set
        self.exec(&ovs::build_del_all_flows_cmd(bridge)).await?;
        let base = flood::base_bridge_flows();
        self.program(bridge, &base).await?;

        info!(bridge = %bridge, network = %network_uuid, "Bridge ready");
        Ok(())
    }

    /// Removes the overlay bridge entirely.
    #[instrument(skip(self))]
    pub async fn destroy_bridge(&mut self, bridge: &str) -> FlowMgrResult<()> {
        self.exec(&ovs::build_del_bridge_cmd(bridge)).await?;
        info!(bridge = %bridge, "Bridge destroyed");
        Ok(())
    }

    /// Creates the GRE port toward a peer host and refreshes flooding.
    #[instrument(skip(self))]
    pub async fn create_tunnel(
        &mut self,
        bridge: &str,
        remote_ip: &str,
        key: u32,
        src_host: u64,
        dst_host: u64,
    ) -> FlowMgrResult<String> {
        let name = tunnel_port_name(key, src_host, dst_host);
        self.exec(&ovs::build_add_gre_port_cmd(bridge, &name, remote_ip, key))
            .await?;

        // the port only forwards once the switch assigned it an ofport
        let ofport = self.lookup.ofport(&name).await?;
        debug!(port = %name, ofport = ofport, "Tunnel port attached");

        self.refresh_flooding(bridge).await?;
        info!(bridge = %bridge, port = %name, remote = %remote_ip, "Tunnel created");
        Ok(name)
    }

    /// Removes a tunnel port and refreshes flooding.
    #[instrument(skip(self))]
    pub async fn destroy_tunnel(&mut self, bridge: &str, port: &str) -> FlowMgrResult<()> {
        self.clear_port_flooding(bridge, port).await?;
        self.exec(&ovs::build_del_port_cmd(bridge, port)).await?;
        self.refresh_flooding(bridge).await?;
        info!(bridge = %bridge, port = %port, "Tunnel destroyed");
        Ok(())
    }

    /// Called after a guest VIF was attached to the bridge.
    #[instrument(skip(self))]
    pub async fn vif_plugged(&mut self, bridge: &str, vif: &str) -> FlowMgrResult<()> {
        // make sure the VIF is actually attached before recomputing
        let ofport = self.lookup.ofport(vif).await?;
        debug!(vif = %vif, ofport = ofport, "VIF attached");
        self.refresh_flooding(bridge).await
    }

    /// Called after a guest VIF was detached from the bridge.
    #[instrument(skip(self))]
    pub async fn vif_unplugged(&mut self, bridge: &str, vif: &str) -> FlowMgrResult<()> {
        self.clear_port_flooding(bridge, vif).await?;
        self.refresh_flooding(bridge).await
    }

    /// Drops the flood rules keyed on a port that is about to go away.
    async fn clear_port_flooding(&mut self, bridge: &str, port: &str) -> FlowMgrResult<()> {
        match self.lookup.ofport(port).await {
            Ok(ofport) => {
                let matching = FlowMatch::new().table(L2_FLOOD_TABLE).in_port(ofport);
                self.exec(&ovs::build_del_flows_cmd(bridge, &matching)).await
            }
            Err(FlowMgrError::PortNotFound { .. }) => {
                // already gone; the refresh will rebuild the rest
                warn!(port = %port, "Port already detached");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuilds the flood table from the bridge's current port set.
    async fn refresh_flooding(&mut self, bridge: &str) -> FlowMgrResult<()> {
        let names = self.lookup.bridge_ports(bridge).await?;

        let mut ports = Vec::with_capacity(names.len());
        for name in names {
            match self.lookup.ofport(&name).await {
                Ok(ofport) => ports.push(BridgePort::new(name, ofport)),
                Err(FlowMgrError::PortNotFound { .. }) => {
                    warn!(port = %name, "Port has no ofport yet, left out of flooding");
                }
                Err(e) => return Err(e),
            }
        }

        let matching = FlowMatch::new().table(L2_FLOOD_TABLE);
        self.exec(&ovs::build_del_flows_cmd(bridge, &matching))
            .await?;
        let flows = flood::flood_flows(&ports);
        self.program(bridge, &flows).await?;

        debug!(bridge = %bridge, ports = ports.len(), "Flood rules refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticLookup {
        ports: HashMap<String, u32>,
        bridges: HashMap<String, Vec<String>>,
    }

    impl StaticLookup {
        fn new() -> Self {
            Self {
                ports: HashMap::new(),
                bridges: HashMap::new(),
            }
        }

        fn with_bridge(mut self, bridge: &str, ports: &[(&str, u32)]) -> Self {
            self.bridges.insert(
                bridge.to_string(),
                ports.iter().map(|(n, _)| n.to_string()).collect(),
            );
            for (name, ofport) in ports {
                self.ports.insert(name.to_string(), *ofport);
            }
            self
        }
    }

    #[async_trait]
    impl PortLookup for StaticLookup {
        async fn ofport(&self, iface: &str) -> FlowMgrResult<u32> {
            self.ports
                .get(iface)
                .copied()
                .ok_or_else(|| FlowMgrError::port_not_found(iface))
        }

        async fn iface_by_mac(&self, mac: &str) -> FlowMgrResult<String> {
            Err(FlowMgrError::port_not_found(mac))
        }

        async fn bridge_ports(&self, bridge: &str) -> FlowMgrResult<Vec<String>> {
            Ok(self.bridges.get(bridge).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_setup_bridge() {
        let lookup = StaticLookup::new().with_bridge("br100", &[]);
        let mut mgr = TunnelFlowMgr::new(lookup).with_mock_mode();

        mgr.setup_bridge("br100", "net-uuid-1").await.unwrap();

        let cmds = mgr.captured_commands();
        assert!(cmds[0].contains("--may-exist add-br \"br100\""));
        assert!(cmds[1].contains("br-set-external-id \"br100\" \"cloud-network-uuid\" \"net-uuid-1\""));
        assert!(cmds[2].contains("del-flows \"br100\""));
        // base pipeline lands after the wipe
        assert!(cmds[3..].iter().any(|c| c.contains("dl_dst=ff:ff:ff:ff:ff:ff")));
        assert!(cmds[3..].iter().any(|c| c.contains("actions=normal")));
    }

    #[tokio::test]
    async fn test_create_tunnel_programs_split_horizon() {
        let lookup = StaticLookup::new().with_bridge(
            "br100",
            &[("vif1.0", 1), ("t500-1-2", 10), ("t500-1-3", 11)],
        );
        let mut mgr = TunnelFlowMgr::new(lookup).with_mock_mode();

        let name = mgr
            .create_tunnel("br100", "172.16.0.3", 500, 1, 3)
            .await
            .unwrap();
        assert_eq!(name, "t500-1-3");

        let cmds = mgr.captured_commands();
        assert!(cmds[0].contains("add-port \"br100\" \"t500-1-3\""));
        assert!(cmds[0].contains("options:remote_ip=\"172.16.0.3\""));
        // flood table rebuilt
        assert!(cmds.iter().any(|c| c.contains("del-flows \"br100\" \"table=2\"")));
        // vif floods to both tunnels
        let vif_rule = cmds
            .iter()
            .find(|c| c.contains("in_port=1,actions"))
            .unwrap();
        assert!(vif_rule.contains("output:10"));
        assert!(vif_rule.contains("output:11"));
        // tunnels flood only to the vif
        let tun_rule = cmds
            .iter()
            .find(|c| c.contains("in_port=10,actions"))
            .unwrap();
        assert!(tun_rule.contains("output:1"));
        assert!(!tun_rule.contains("output:11"));
    }

    #[tokio::test]
    async fn test_create_tunnel_requires_ofport() {
        // bridge listing knows nothing about the new port
        let lookup = StaticLookup::new().with_bridge("br100", &[]);
        let mut mgr = TunnelFlowMgr::new(lookup).with_mock_mode();

        let err = mgr
            .create_tunnel("br100", "172.16.0.3", 500, 1, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowMgrError::PortNotFound { .. }));
    }

    #[tokio::test]
    async fn test_destroy_tunnel_clears_rules_first() {
        let lookup = StaticLookup::new()
            .with_bridge("br100", &[("vif1.0", 1), ("t500-1-2", 10)]);
        let mut mgr = TunnelFlowMgr::new(lookup).with_mock_mode();

        mgr.destroy_tunnel("br100", "t500-1-2").await.unwrap();

        let cmds = mgr.captured_commands();
        assert!(cmds[0].contains("del-flows \"br100\" \"table=2,in_port=10\""));
        assert!(cmds[1].contains("--if-exists del-port \"br100\" \"t500-1-2\""));
    }

    #[tokio::test]
    async fn test_vif_unplugged_tolerates_missing_port() {
        let lookup = StaticLookup::new().with_bridge("br100", &[("vif1.0", 1)]);
        let mut mgr = TunnelFlowMgr::new(lookup).with_mock_mode();

        // vif9.0 is already gone from the switch
        mgr.vif_unplugged("br100", "vif9.0").await.unwrap();

        let cmds = mgr.captured_commands();
        // no per-port flush, straight to the rebuild
        assert!(cmds[0].contains("del-flows \"br100\" \"table=2\""));
    }

    #[tokio::test]
    async fn test_vif_plugged_requires_attachment() {
        let lookup = StaticLookup::new().with_bridge("br100", &[("vif1.0", 1)]);
        let mut mgr = TunnelFlowMgr::new(lookup).with_mock_mode();

        let err = mgr.vif_plugged("br100", "vif9.0").await.unwrap_err();
        assert!(matches!(err, FlowMgrError::PortNotFound { .. }));
    }
}
