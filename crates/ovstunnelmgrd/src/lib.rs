//! ovstunnelmgrd - overlay tunnel and flooding manager for Open vSwitch
//!
//! Maintains the transport side of the overlay: the per-network bridge,
//! GRE tunnel ports toward peer hosts, and the split-horizon flood rules
//! that keep broadcast out of tunnel loops.

pub mod flood;
mod tunnel_mgr;
pub mod types;

pub use tunnel_mgr::TunnelFlowMgr;
pub use types::{BridgePort, PortKind, EXTERNAL_ID_NETWORK_UUID};
