//! vpcflowmgrd - VPC distributed-routing flow manager for Open vSwitch
//!
//! Translates VPC topology and routing-policy pushes from the management
//! server into OpenFlow table state on the host's VPC bridge.

pub mod config;
pub mod flows;
mod vpc_mgr;

pub use config::{AclAction, AclDirection, AclItem, Vpc, VpcAcl, VpcHost, VpcNic, VpcPayload, VpcTier, VpcVm};
pub use ovsmgr_common::naming::tunnel_port_name;
pub use vpc_mgr::{ApplyOutcome, VpcFlowMgr};
