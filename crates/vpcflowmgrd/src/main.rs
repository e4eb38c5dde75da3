//! vpcflowmgrd - VPC Flow Manager Daemon
//!
//! Entry point. One invocation applies one pushed update.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ovsmgr_common::{switch, OvsCtl};
use ovsmgr_vpcflowmgrd::{ApplyOutcome, VpcFlowMgr, VpcPayload};

#[derive(Parser)]
#[command(name = "vpcflowmgrd", about = "VPC flow manager for Open vSwitch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Program the bridge to reflect the VPC network topology
    Topology {
        /// Bridge carrying the VPC
        #[arg(long)]
        bridge: String,
        /// Id of this hypervisor host
        #[arg(long)]
        host_id: u64,
        /// Path to the pushed JSON payload, or '-' for stdin
        #[arg(long)]
        config: String,
        /// Sequence number of this push
        #[arg(long)]
        sequence_no: u64,
    },
    /// Apply the VPC routing policies (network ACLs)
    Policies {
        /// Bridge carrying the VPC
        #[arg(long)]
        bridge: String,
        /// Path to the pushed JSON payload, or '-' for stdin
        #[arg(long)]
        config: String,
        /// Sequence number of this push
        #[arg(long)]
        sequence_no: u64,
    },
}

/// Initializes tracing/logging subsystem
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn read_payload(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read payload from stdin")?;
        Ok(raw)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read payload from {}", path))
    }
}

async fn run(cli: Cli) -> anyhow::Result<ApplyOutcome> {
    switch::check_switch().await?;

    let mut mgr = VpcFlowMgr::new(OvsCtl);
    match cli.command {
        Command::Topology {
            bridge,
            host_id,
            config,
            sequence_no,
        } => {
            let raw = read_payload(&config).await?;
            let vpc = VpcPayload::parse(&raw)?;
            Ok(mgr
                .configure_network_topology(&bridge, host_id, &vpc, sequence_no)
                .await?)
        }
        Command::Policies {
            bridge,
            config,
            sequence_no,
        } => {
            let raw = read_payload(&config).await?;
            let vpc = VpcPayload::parse(&raw)?;
            Ok(mgr
                .configure_routing_policies(&bridge, &vpc, sequence_no)
                .await?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(ApplyOutcome::Applied { flows }) => {
            info!(flows = flows, "Update applied");
            ExitCode::SUCCESS
        }
        Ok(ApplyOutcome::Stale { current }) => {
            // a retried older push is expected, not a failure
            info!(current = current, "Update was stale, nothing changed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Update failed");
            ExitCode::FAILURE
        }
    }
}
