//! Open vSwitch liveness checks.
//!
//! The daemons refuse to program anything while the switch is down, so a
//! half-configured bridge is never mistaken for an applied update.

use std::path::Path;

use crate::error::{FlowMgrError, FlowMgrResult};
use crate::shell;

/// `/proc/<pid>/comm` truncates the process name.
const COMM_MAX: usize = 15;

/// Returns true if the pid recorded in `pid_file` is a live process with
/// the given name.
pub async fn is_process_running(pid_file: &str, name: &str) -> bool {
    let contents = match tokio::fs::read_to_string(pid_file).await {
        Ok(c) => c,
        Err(_) => return false,
    };
    let pid: u32 = match contents.trim().parse() {
        Ok(p) => p,
        Err(_) => {
            tracing::warn!(pid_file = %pid_file, "Unparsable pid file");
            return false;
        }
    };
    let comm = match tokio::fs::read_to_string(format!("/proc/{}/comm", pid)).await {
        Ok(c) => c,
        Err(_) => return false,
    };
    let expected: String = name.chars().take(COMM_MAX).collect();
    comm.trim() == expected
}

/// Returns true if the tool exists at its expected path.
pub async fn is_tool_present(path: &str) -> bool {
    tokio::fs::metadata(Path::new(path)).await.is_ok()
}

/// Verifies that both OVS daemons are running and both CLI tools exist.
pub async fn check_switch() -> FlowMgrResult<()> {
    if !is_process_running(shell::OVSDB_SERVER_PID_FILE, shell::OVSDB_SERVER_NAME).await {
        return Err(FlowMgrError::switch_not_running(shell::OVSDB_SERVER_NAME));
    }
    if !is_process_running(shell::VSWITCHD_PID_FILE, shell::VSWITCHD_NAME).await {
        return Err(FlowMgrError::switch_not_running(shell::VSWITCHD_NAME));
    }
    for tool in [shell::VSCTL_CMD, shell::OFCTL_CMD] {
        if !is_tool_present(tool).await {
            return Err(FlowMgrError::switch_not_running(tool));
        }
    }
    tracing::debug!("Open vSwitch daemons and tools present");
    Ok(())
}
