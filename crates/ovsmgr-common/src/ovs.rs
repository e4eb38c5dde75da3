//! Command builders and queries for the Open vSwitch CLI tools.
//!
//! Builders return the full command line as a string; execution stays with
//! the callers so managers can capture commands in tests. Lookups that need
//! the command output go through the [`PortLookup`] trait, with [`OvsCtl`]
//! as the implementation that actually shells out.

use async_trait::async_trait;

use crate::error::{FlowMgrError, FlowMgrResult};
use crate::flow::{FlowMatch, FlowSpec};
use crate::shell::{self, shellquote};

/// Build an `ovs-ofctl add-flow` command.
pub fn build_add_flow_cmd(bridge: &str, flow: &FlowSpec) -> String {
    format!(
        "{} add-flow {} {}",
        shell::OFCTL_CMD,
        shellquote(bridge),
        shellquote(&flow.render())
    )
}

/// Build an `ovs-ofctl del-flows` command for the given match.
///
/// An empty match deletes every flow on the bridge.
pub fn build_del_flows_cmd(bridge: &str, matching: &FlowMatch) -> String {
    if matching.is_empty() {
        build_del_all_flows_cmd(bridge)
    } else {
        format!(
            "{} del-flows {} {}",
            shell::OFCTL_CMD,
            shellquote(bridge),
            shellquote(&matching.render())
        )
    }
}

/// Build an `ovs-ofctl del-flows` command with no match (wipe the bridge).
pub fn build_del_all_flows_cmd(bridge: &str) -> String {
    format!("{} del-flows {}", shell::OFCTL_CMD, shellquote(bridge))
}

/// Build a bridge creation command. `--may-exist` keeps it idempotent.
pub fn build_add_bridge_cmd(bridge: &str) -> String {
    format!(
        "{} --may-exist add-br {}",
        shell::VSCTL_CMD,
        shellquote(bridge)
    )
}

/// Build a bridge deletion command.
pub fn build_del_bridge_cmd(bridge: &str) -> String {
    format!(
        "{} --if-exists del-br {}",
        shell::VSCTL_CMD,
        shellquote(bridge)
    )
}

/// Build a GRE tunnel port creation command.
///
/// The interface carries the tunnel key and remote endpoint in its
/// `options` column.
pub fn build_add_gre_port_cmd(bridge: &str, port: &str, remote_ip: &str, key: u32) -> String {
    format!(
        "{} --may-exist add-port {} {} -- set interface {} type=gre options:key={} options:remote_ip={}",
        shell::VSCTL_CMD,
        shellquote(bridge),
        shellquote(port),
        shellquote(port),
        key,
        shellquote(remote_ip)
    )
}

/// Build a port deletion command.
pub fn build_del_port_cmd(bridge: &str, port: &str) -> String {
    format!(
        "{} --if-exists del-port {} {}",
        shell::VSCTL_CMD,
        shellquote(bridge),
        shellquote(port)
    )
}

/// Build a bridge external-id set command.
pub fn build_set_bridge_external_id_cmd(bridge: &str, key: &str, value: &str) -> String {
    format!(
        "{} br-set-external-id {} {} {}",
        shell::VSCTL_CMD,
        shellquote(bridge),
        shellquote(key),
        shellquote(value)
    )
}

/// Build a bridge external-id get command.
pub fn build_get_bridge_external_id_cmd(bridge: &str, key: &str) -> String {
    format!(
        "{} br-get-external-id {} {}",
        shell::VSCTL_CMD,
        shellquote(bridge),
        shellquote(key)
    )
}

/// Build the OpenFlow port number query for an interface.
pub fn build_get_ofport_cmd(iface: &str) -> String {
    format!(
        "{} get interface {} ofport",
        shell::VSCTL_CMD,
        shellquote(iface)
    )
}

/// Build the interface-by-MAC query.
///
/// VIFs carry the guest MAC in `external-ids:attached-mac`.
pub fn build_find_iface_by_mac_cmd(mac: &str) -> String {
    format!(
        "{} --data=bare --no-heading --columns=name find interface external-ids:attached-mac={}",
        shell::VSCTL_CMD,
        shellquote(mac)
    )
}

/// Build the bridge port listing command.
pub fn build_list_ports_cmd(bridge: &str) -> String {
    format!("{} list-ports {}", shell::VSCTL_CMD, shellquote(bridge))
}

/// Parses `ovs-vsctl get interface ... ofport` output.
///
/// OVS reports `-1` while the port has no OpenFlow assignment yet, and the
/// empty set `[]` right after port creation; both surface as
/// [`FlowMgrError::PortNotFound`] so callers can skip or retry.
pub fn parse_ofport(iface: &str, output: &str) -> FlowMgrResult<u32> {
    let trimmed = output.trim();
    if trimmed == "[]" {
        return Err(FlowMgrError::port_not_found(iface));
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|_| FlowMgrError::internal(format!("Unparsable ofport '{}'", trimmed)))?;
    if value <= 0 {
        return Err(FlowMgrError::port_not_found(iface));
    }
    Ok(value as u32)
}

/// Interface resolution against the switch.
#[async_trait]
pub trait PortLookup: Send + Sync {
    /// OpenFlow port number of an interface.
    async fn ofport(&self, iface: &str) -> FlowMgrResult<u32>;

    /// Interface name carrying the given attached MAC, if any.
    async fn iface_by_mac(&self, mac: &str) -> FlowMgrResult<String>;

    /// Names of all ports on a bridge.
    async fn bridge_ports(&self, bridge: &str) -> FlowMgrResult<Vec<String>>;
}

/// [`PortLookup`] implementation backed by `ovs-vsctl`.
#[derive(Debug, Clone, Default)]
pub struct OvsCtl;

#[async_trait]
impl PortLookup for OvsCtl {
    async fn ofport(&self, iface: &str) -> FlowMgrResult<u32> {
        let cmd = build_get_ofport_cmd(iface);
        let result = shell::exec(&cmd).await?;
        if !result.success() {
            // an interface the switch does not know is "no row ... in
            // table Interface", not a tool failure
            if result.stderr.contains("no row") {
                return Err(FlowMgrError::port_not_found(iface));
            }
            return Err(FlowMgrError::ShellCommandFailed {
                command: cmd,
                exit_code: result.exit_code,
                output: result.combined_output(),
            });
        }
        parse_ofport(iface, &result.stdout)
    }

    async fn iface_by_mac(&self, mac: &str) -> FlowMgrResult<String> {
        let output = shell::exec_or_throw(&build_find_iface_by_mac_cmd(mac)).await?;
        let name = output.lines().next().unwrap_or("").trim();
        if name.is_empty() {
            return Err(FlowMgrError::port_not_found(mac));
        }
        Ok(name.to_string())
    }

    async fn bridge_ports(&self, bridge: &str) -> FlowMgrResult<Vec<String>> {
        let output = shell::exec_or_throw(&build_list_ports_cmd(bridge)).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}
