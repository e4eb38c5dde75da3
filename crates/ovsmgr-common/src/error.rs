//! Error types for flow manager operations.

use std::io;
use thiserror::Error;

/// Result type alias for flow manager operations.
pub type FlowMgrResult<T> = Result<T, FlowMgrError>;

/// Errors that can occur while programming an OVS bridge.
#[derive(Debug, Error)]
pub enum FlowMgrError {
    /// Failed to spawn a shell command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that could not be spawned.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned a non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Open vSwitch is not usable on this host.
    #[error("Open vSwitch is not running: {component}")]
    SwitchNotRunning {
        /// The daemon or tool that is missing.
        component: String,
    },

    /// Configuration payload failed validation.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Interface exists but has no OpenFlow port, or does not exist at all.
    #[error("Port '{port}' not found or not attached to the switch")]
    PortNotFound {
        /// Interface name or MAC address used for the lookup.
        port: String,
    },

    /// A flow expression could not be built.
    #[error("Invalid flow: {message}")]
    InvalidFlow {
        /// Error message.
        message: String,
    },

    /// Sequence number persistence failed.
    #[error("Sequence store failure at {path}: {source}")]
    SequenceStore {
        /// The file or directory involved.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl FlowMgrError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a port not found error.
    pub fn port_not_found(port: impl Into<String>) -> Self {
        Self::PortNotFound { port: port.into() }
    }

    /// Creates a switch not running error.
    pub fn switch_not_running(component: impl Into<String>) -> Self {
        Self::SwitchNotRunning {
            component: component.into(),
        }
    }

    /// Creates an invalid flow error.
    pub fn invalid_flow(message: impl Into<String>) -> Self {
        Self::InvalidFlow {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlowMgrError::PortNotFound { .. }
                | FlowMgrError::ShellCommandFailed { .. }
                | FlowMgrError::SwitchNotRunning { .. }
        )
    }
}
