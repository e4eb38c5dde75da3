//! OpenFlow pipeline layout shared by the flow manager daemons.
//!
//! A packet enters at the classifier. Switched intra-tier traffic goes
//! straight to L2 lookup; traffic addressed to a tier gateway MAC is routed:
//! egress ACL, then L3 lookup (which rewrites the Ethernet header), then
//! ingress ACL, then L2 lookup. Broadcast and IPv4 multicast are steered
//! into the flood table, where split horizon over the tunnel mesh is
//! enforced.

/// Entry table.
pub const CLASSIFIER_TABLE: u8 = 0;

/// Destination MAC to output port.
pub const L2_LOOKUP_TABLE: u8 = 1;

/// Broadcast/multicast/unknown-destination replication.
pub const L2_FLOOD_TABLE: u8 = 2;

/// Destination IP to Ethernet rewrite for inter-tier routing.
pub const L3_LOOKUP_TABLE: u8 = 3;

/// Network ACLs applied to traffic entering a tier.
pub const INGRESS_ACL_TABLE: u8 = 4;

/// Network ACLs applied to traffic leaving a tier.
pub const EGRESS_ACL_TABLE: u8 = 5;

/// Priority of entries whose destination is on this host.
pub const PRIO_LOCAL: u16 = 1200;

/// Priority of entries whose destination is behind a tunnel.
pub const PRIO_REMOTE: u16 = 1100;

/// Priority of per-port flood rules.
pub const PRIO_FLOOD: u16 = 1100;

/// Priority of classifier rules for broadcast/multicast and gateway MACs.
pub const PRIO_CLASSIFIER: u16 = 1000;

/// ACL rule priority is this base plus the rule number.
pub const ACL_PRIORITY_BASE: u16 = 1000;

/// Priority of table-default rules.
pub const PRIO_DEFAULT: u16 = 0;

/// Ethernet broadcast destination.
pub const MAC_BROADCAST: &str = "ff:ff:ff:ff:ff:ff";

/// Link-local IPv4 multicast block.
pub const IPV4_MULTICAST: &str = "224.0.0.0/24";
