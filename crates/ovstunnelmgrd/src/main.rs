//! ovstunnelmgrd - Overlay Tunnel Manager Daemon
//!
//! Entry point. One invocation applies one lifecycle event.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ovsmgr_common::{switch, OvsCtl};
use ovsmgr_ovstunnelmgrd::TunnelFlowMgr;

#[derive(Parser)]
#[command(name = "ovstunnelmgrd", about = "Overlay tunnel manager for Open vSwitch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the overlay bridge for a network and install its base flows
    SetupBridge {
        #[arg(long)]
        bridge: String,
        /// Overlay network uuid recorded on the bridge
        #[arg(long)]
        network_uuid: String,
    },
    /// Delete the overlay bridge
    DestroyBridge {
        #[arg(long)]
        bridge: String,
    },
    /// Create the GRE tunnel toward a peer host
    CreateTunnel {
        #[arg(long)]
        bridge: String,
        /// Peer host tunnel endpoint
        #[arg(long)]
        remote_ip: String,
        /// Tunnel key of the overlay network
        #[arg(long)]
        key: u32,
        /// Id of this host
        #[arg(long)]
        src_host: u64,
        /// Id of the peer host
        #[arg(long)]
        dst_host: u64,
    },
    /// Remove a tunnel port
    DestroyTunnel {
        #[arg(long)]
        bridge: String,
        /// Tunnel port name
        #[arg(long)]
        port: String,
    },
    /// Recompute flooding after a guest VIF was attached
    VifPlugged {
        #[arg(long)]
        bridge: String,
        #[arg(long)]
        vif: String,
    },
    /// Recompute flooding after a guest VIF was detached
    VifUnplugged {
        #[arg(long)]
        bridge: String,
        #[arg(long)]
        vif: String,
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    switch::check_switch().await?;

    let mut mgr = TunnelFlowMgr::new(OvsCtl);
    match cli.command {
        Command::SetupBridge {
            bridge,
            network_uuid,
        } => mgr.setup_bridge(&bridge, &network_uuid).await?,
        Command::DestroyBridge { bridge } => mgr.destroy_bridge(&bridge).await?,
        Command::CreateTunnel {
            bridge,
            remote_ip,
            key,
            src_host,
            dst_host,
        } => {
            let name = mgr
                .create_tunnel(&bridge, &remote_ip, key, src_host, dst_host)
                .await?;
            info!(port = %name, "Tunnel port ready");
        }
        Command::DestroyTunnel { bridge, port } => mgr.destroy_tunnel(&bridge, &port).await?,
        Command::VifPlugged { bridge, vif } => mgr.vif_plugged(&bridge, &vif).await?,
        Command::VifUnplugged { bridge, vif } => mgr.vif_unplugged(&bridge, &vif).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Operation failed");
            ExitCode::FAILURE
        }
    }
}
