//! Port and bridge type definitions for the tunnel manager.

use ovsmgr_common::naming;

/// Bridge external-id carrying the overlay network uuid.
pub const EXTERNAL_ID_NETWORK_UUID: &str = "cloud-network-uuid";

/// What role a port plays on an overlay bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Guest-facing interface.
    Vif,
    /// GRE port toward a peer host.
    Tunnel,
}

/// A resolved port on the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgePort {
    pub name: String,
    pub ofport: u32,
    pub kind: PortKind,
}

impl BridgePort {
    /// Classifies a port by the shared naming convention.
    pub fn new(name: impl Into<String>, ofport: u32) -> Self {
        let name = name.into();
        let kind = if naming::is_tunnel_port(&name) {
            PortKind::Tunnel
        } else {
            PortKind::Vif
        };
        Self { name, ofport, kind }
    }

    pub fn is_tunnel(&self) -> bool {
        self.kind == PortKind::Tunnel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_classification() {
        assert_eq!(BridgePort::new("t1001-1-2", 5).kind, PortKind::Tunnel);
        assert_eq!(BridgePort::new("vif3.0", 4).kind, PortKind::Vif);
        assert_eq!(BridgePort::new("tap7", 6).kind, PortKind::Vif);
        assert!(BridgePort::new("t9-2-3", 1).is_tunnel());
    }
}
