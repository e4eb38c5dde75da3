//! Port naming conventions on overlay bridges.
//!
//! The tunnel manager creates GRE ports and the VPC flow manager later
//! resolves them by name, so the convention is the contract between the
//! two daemons: `t<key>-<src_host>-<dst_host>`.

/// Name of the GRE tunnel port from `src_host` toward `dst_host` for the
/// given tunnel key.
pub fn tunnel_port_name(key: u32, src_host: u64, dst_host: u64) -> String {
    format!("t{}-{}-{}", key, src_host, dst_host)
}

/// Returns true if a port name follows the tunnel convention.
///
/// Everything else on an overlay bridge is treated as a VIF.
pub fn is_tunnel_port(name: &str) -> bool {
    parse_tunnel_port(name).is_some()
}

/// Splits a tunnel port name into (key, src_host, dst_host).
pub fn parse_tunnel_port(name: &str) -> Option<(u32, u64, u64)> {
    let rest = name.strip_prefix('t')?;
    let mut parts = rest.split('-');
    let key = parts.next()?.parse().ok()?;
    let src = parts.next()?.parse().ok()?;
    let dst = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((key, src, dst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_port_name() {
        assert_eq!(tunnel_port_name(1001, 1, 2), "t1001-1-2");
        assert_eq!(tunnel_port_name(7, 12, 3), "t7-12-3");
    }

    #[test]
    fn test_parse_round_trip() {
        let name = tunnel_port_name(2002, 3, 4);
        assert_eq!(parse_tunnel_port(&name), Some((2002, 3, 4)));
    }

    #[test]
    fn test_vif_names_are_not_tunnels() {
        assert!(is_tunnel_port("t1001-1-2"));
        assert!(!is_tunnel_port("vif3.0"));
        assert!(!is_tunnel_port("tap1"));
        assert!(!is_tunnel_port("t1001-1"));
        assert!(!is_tunnel_port("t1001-1-2-3"));
        assert!(!is_tunnel_port("eth0"));
    }
}
