//! Shell command execution for the flow manager daemons.
//!
//! All interaction with Open vSwitch goes through its CLI tools, so every
//! command string assembled from configuration or CLI input must pass
//! through [`shellquote`] before execution.

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{FlowMgrError, FlowMgrResult};

/// Path to the `ovs-vsctl` tool for OVSDB configuration.
pub const VSCTL_CMD: &str = "/usr/bin/ovs-vsctl";

/// Path to the `ovs-ofctl` tool for OpenFlow table programming.
pub const OFCTL_CMD: &str = "/usr/bin/ovs-ofctl";

/// Pid file of the OVSDB server daemon.
pub const OVSDB_SERVER_PID_FILE: &str = "/var/run/openvswitch/ovsdb-server.pid";

/// Pid file of the OVS forwarding daemon.
pub const VSWITCHD_PID_FILE: &str = "/var/run/openvswitch/ovs-vswitchd.pid";

/// Process name of the OVSDB server daemon.
pub const OVSDB_SERVER_NAME: &str = "ovsdb-server";

/// Process name of the OVS forwarding daemon.
pub const VSWITCHD_NAME: &str = "ovs-vswitchd";

/// Characters that need escaping inside shell double-quotes:
/// `$`, backtick, `"`, `\`, and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// Wraps the string in double quotes and escapes any character with
/// special meaning inside them, preventing command injection through
/// interface names, MAC addresses, or CIDRs taken from configuration.
///
/// # Example
///
/// ```
/// use ovsmgr_common::shell::shellquote;
///
/// assert_eq!(shellquote("vif1.0"), "\"vif1.0\"");
/// assert_eq!(shellquote("br$0"), "\"br\\$0\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// Trimmed stdout output.
    pub stdout: String,
    /// Trimmed stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command asynchronously.
///
/// Runs through `/bin/sh -c` so command chaining with `--`/`&&` works.
/// The exit code is reported in the result rather than as an error; only
/// a failure to spawn the process at all is an `Err`.
pub async fn exec(cmd: &str) -> FlowMgrResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| FlowMgrError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        if !result.stderr.is_empty() {
            // ovs tools warn on stderr even when they succeed
            tracing::debug!(command = %cmd, stderr = %result.stderr, "Command stderr");
        }
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Executes a shell command and returns an error on non-zero exit.
///
/// Returns the trimmed stdout on success.
pub async fn exec_or_throw(cmd: &str) -> FlowMgrResult<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(FlowMgrError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
