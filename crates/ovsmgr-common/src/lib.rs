//! Common infrastructure for the OVS flow manager daemons.
//!
//! The daemons (`vpcflowmgrd`, `ovstunnelmgrd`) program OpenFlow state on
//! Open vSwitch bridges through the switch's CLI tools. This crate holds
//! everything they share:
//!
//! - [`shell`]: shell execution with injection-safe quoting and the OVS
//!   tool paths
//! - [`flow`]: typed flow expressions ([`FlowSpec`]/[`FlowMatch`])
//! - [`ovs`]: `ovs-vsctl`/`ovs-ofctl` command builders and the
//!   [`PortLookup`] resolution seam
//! - [`pipeline`]: the OpenFlow table layout and priority bands
//! - [`switch`]: OVS daemon liveness checks
//! - [`sequence`]: per-bridge applied-sequence persistence
//!
//! # Example
//!
//! ```ignore
//! use ovsmgr_common::{
//!     flow::{Action, FlowMatch, FlowSpec},
//!     ovs, pipeline, shell,
//! };
//!
//! async fn pin_mac(bridge: &str, mac: &str, ofport: u32) -> ovsmgr_common::FlowMgrResult<()> {
//!     let flow = FlowSpec::new(FlowMatch::new().table(pipeline::L2_LOOKUP_TABLE).dl_dst(mac))
//!         .priority(pipeline::PRIO_LOCAL)
//!         .action(Action::Output(ofport));
//!     shell::exec_or_throw(&ovs::build_add_flow_cmd(bridge, &flow)).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod flow;
pub mod naming;
pub mod ovs;
pub mod pipeline;
pub mod sequence;
pub mod shell;
pub mod switch;

// Re-export commonly used items at crate root
pub use error::{FlowMgrError, FlowMgrResult};
pub use flow::{Action, FlowMatch, FlowSpec, Protocol};
pub use ovs::{OvsCtl, PortLookup};
pub use sequence::{SeqStatus, SequenceKind, SequenceStore};
