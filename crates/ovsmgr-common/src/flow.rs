//! Typed OpenFlow flow expressions.
//!
//! Flow programming code composes [`FlowSpec`] values and hands them to the
//! `ovs-ofctl` builders in [`crate::ovs`]. The rendered text follows the
//! `ovs-ofctl` flow syntax: `add-flow` takes timeouts, priority, match
//! fields and actions, while `del-flows` accepts match fields only, so the
//! two renderings are kept distinct ([`FlowSpec::render`] vs.
//! [`FlowMatch::render`]).

use std::fmt;
use std::str::FromStr;

use crate::error::FlowMgrError;

/// IP protocol selector for L3/L4 matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Any IPv4 traffic.
    Ip,
    /// Explicit protocol number, rendered as `ip,nw_proto=N`.
    Number(u8),
}

impl Protocol {
    /// Returns the match keyword(s) for this protocol.
    pub fn as_match(&self) -> String {
        match self {
            Protocol::Tcp => "tcp".to_string(),
            Protocol::Udp => "udp".to_string(),
            Protocol::Icmp => "icmp".to_string(),
            Protocol::Ip => "ip".to_string(),
            Protocol::Number(n) => format!("ip,nw_proto={}", n),
        }
    }

    /// Returns true if transport port matches make sense for this protocol.
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

impl FromStr for Protocol {
    type Err = FlowMgrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            "ip" | "all" => Ok(Protocol::Ip),
            other => other
                .parse::<u8>()
                .map(Protocol::Number)
                .map_err(|_| FlowMgrError::invalid_flow(format!("Unknown protocol: {}", s))),
        }
    }
}

/// OpenFlow match expression.
///
/// Fields render in the canonical order `ovs-ofctl` prints them back:
/// table, in_port, dl_type, dl_src, dl_dst, protocol, nw_src, nw_dst,
/// tp_dst. When an L3 or L4 field is present without a protocol, an `ip`
/// keyword is injected since `ovs-ofctl` rejects bare `nw_*` matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatch {
    table: Option<u8>,
    in_port: Option<u32>,
    dl_type: Option<u16>,
    dl_src: Option<String>,
    dl_dst: Option<String>,
    proto: Option<Protocol>,
    nw_src: Option<String>,
    nw_dst: Option<String>,
    tp_dst: Option<u16>,
}

impl FlowMatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: u8) -> Self {
        self.table = Some(table);
        self
    }

    pub fn in_port(mut self, port: u32) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn dl_type(mut self, ethertype: u16) -> Self {
        self.dl_type = Some(ethertype);
        self
    }

    pub fn dl_src(mut self, mac: impl Into<String>) -> Self {
        self.dl_src = Some(mac.into());
        self
    }

    pub fn dl_dst(mut self, mac: impl Into<String>) -> Self {
        self.dl_dst = Some(mac.into());
        self
    }

    pub fn proto(mut self, proto: Protocol) -> Self {
        self.proto = Some(proto);
        self
    }

    pub fn nw_src(mut self, cidr: impl Into<String>) -> Self {
        self.nw_src = Some(cidr.into());
        self
    }

    pub fn nw_dst(mut self, cidr: impl Into<String>) -> Self {
        self.nw_dst = Some(cidr.into());
        self
    }

    pub fn tp_dst(mut self, port: u16) -> Self {
        self.tp_dst = Some(port);
        self
    }

    /// Returns true when no field is matched (wildcard).
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn needs_ip_keyword(&self) -> bool {
        self.proto.is_none()
            && (self.nw_src.is_some() || self.nw_dst.is_some() || self.tp_dst.is_some())
    }

    /// Renders the match-only expression, as accepted by `del-flows`.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(table) = self.table {
            parts.push(format!("table={}", table));
        }
        if let Some(in_port) = self.in_port {
            parts.push(format!("in_port={}", in_port));
        }
        if let Some(dl_type) = self.dl_type {
            parts.push(format!("dl_type=0x{:04x}", dl_type));
        }
        if let Some(ref dl_src) = self.dl_src {
            parts.push(format!("dl_src={}", dl_src));
        }
        if let Some(ref dl_dst) = self.dl_dst {
            parts.push(format!("dl_dst={}", dl_dst));
        }
        if let Some(ref proto) = self.proto {
            parts.push(proto.as_match());
        } else if self.needs_ip_keyword() {
            parts.push("ip".to_string());
        }
        if let Some(ref nw_src) = self.nw_src {
            parts.push(format!("nw_src={}", nw_src));
        }
        if let Some(ref nw_dst) = self.nw_dst {
            parts.push(format!("nw_dst={}", nw_dst));
        }
        if let Some(tp_dst) = self.tp_dst {
            parts.push(format!("tp_dst={}", tp_dst));
        }
        parts.join(",")
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// A single OpenFlow action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit on the given OpenFlow port.
    Output(u32),
    Drop,
    /// Hand the packet to the switch's learning pipeline.
    Normal,
    /// Continue processing in another table.
    Resubmit(u8),
    ModDlSrc(String),
    ModDlDst(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Output(port) => write!(f, "output:{}", port),
            Action::Drop => write!(f, "drop"),
            Action::Normal => write!(f, "normal"),
            Action::Resubmit(table) => write!(f, "resubmit(,{})", table),
            Action::ModDlSrc(mac) => write!(f, "mod_dl_src:{}", mac),
            Action::ModDlDst(mac) => write!(f, "mod_dl_dst:{}", mac),
        }
    }
}

/// A complete flow entry: timeouts, priority, match and actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    matching: FlowMatch,
    priority: u16,
    hard_timeout: u32,
    idle_timeout: u32,
    actions: Vec<Action>,
}

impl FlowSpec {
    /// Creates a flow with default priority 1 and no timeouts.
    pub fn new(matching: FlowMatch) -> Self {
        Self {
            matching,
            priority: 1,
            hard_timeout: 0,
            idle_timeout: 0,
            actions: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn hard_timeout(mut self, seconds: u32) -> Self {
        self.hard_timeout = seconds;
        self
    }

    pub fn idle_timeout(mut self, seconds: u32) -> Self {
        self.idle_timeout = seconds;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// The match portion of this flow.
    pub fn matching(&self) -> &FlowMatch {
        &self.matching
    }

    /// Renders the full `add-flow` expression.
    ///
    /// A flow without actions renders as `actions=drop`, which is what an
    /// empty action list means to the switch.
    pub fn render(&self) -> String {
        let mut expr = format!(
            "hard_timeout={},idle_timeout={},priority={}",
            self.hard_timeout, self.idle_timeout, self.priority
        );
        let matching = self.matching.render();
        if !matching.is_empty() {
            expr.push(',');
            expr.push_str(&matching);
        }
        expr.push_str(",actions=");
        if self.actions.is_empty() {
            expr.push_str("drop");
        } else {
            let actions: Vec<String> = self.actions.iter().map(|a| a.to_string()).collect();
            expr.push_str(&actions.join(","));
        }
        expr
    }
}

impl fmt::Display for FlowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_render_order() {
        let m = FlowMatch::new()
            .table(1)
            .in_port(5)
            .dl_dst("aa:bb:cc:dd:ee:ff");
        assert_eq!(m.render(), "table=1,in_port=5,dl_dst=aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_match_injects_ip_keyword() {
        let m = FlowMatch::new().nw_dst("10.1.1.0/24");
        assert_eq!(m.render(), "ip,nw_dst=10.1.1.0/24");
    }

    #[test]
    fn test_match_proto_suppresses_ip_keyword() {
        let m = FlowMatch::new()
            .proto(Protocol::Tcp)
            .nw_src("10.1.1.0/24")
            .tp_dst(80);
        assert_eq!(m.render(), "tcp,nw_src=10.1.1.0/24,tp_dst=80");
    }

    #[test]
    fn test_match_numeric_proto() {
        let m = FlowMatch::new().proto(Protocol::Number(47)).nw_dst("10.0.0.1");
        assert_eq!(m.render(), "ip,nw_proto=47,nw_dst=10.0.0.1");
    }

    #[test]
    fn test_match_dl_type_hex() {
        let m = FlowMatch::new().dl_type(0x0806);
        assert_eq!(m.render(), "dl_type=0x0806");
    }

    #[test]
    fn test_empty_match() {
        assert!(FlowMatch::new().is_empty());
        assert_eq!(FlowMatch::new().render(), "");
        assert!(!FlowMatch::new().table(2).is_empty());
    }

    #[test]
    fn test_flow_defaults() {
        let flow = FlowSpec::new(FlowMatch::new().in_port(3)).action(Action::Output(7));
        assert_eq!(
            flow.render(),
            "hard_timeout=0,idle_timeout=0,priority=1,in_port=3,actions=output:7"
        );
    }

    #[test]
    fn test_flow_priority_and_timeouts() {
        let flow = FlowSpec::new(FlowMatch::new().table(4).nw_src("192.168.1.0/24"))
            .priority(1100)
            .hard_timeout(30)
            .idle_timeout(10)
            .action(Action::Drop);
        assert_eq!(
            flow.render(),
            "hard_timeout=30,idle_timeout=10,priority=1100,table=4,ip,nw_src=192.168.1.0/24,actions=drop"
        );
    }

    #[test]
    fn test_flow_action_chain() {
        let flow = FlowSpec::new(FlowMatch::new().table(3).nw_dst("10.1.1.5"))
            .priority(1200)
            .action(Action::ModDlSrc("02:00:00:00:00:01".to_string()))
            .action(Action::ModDlDst("02:00:00:00:00:02".to_string()))
            .action(Action::Resubmit(4));
        assert_eq!(
            flow.render(),
            "hard_timeout=0,idle_timeout=0,priority=1200,table=3,ip,nw_dst=10.1.1.5,\
             actions=mod_dl_src:02:00:00:00:00:01,mod_dl_dst:02:00:00:00:00:02,resubmit(,4)"
        );
    }

    #[test]
    fn test_flow_without_actions_drops() {
        let flow = FlowSpec::new(FlowMatch::new().table(2)).priority(0);
        assert!(flow.render().ends_with("actions=drop"));
    }

    #[test]
    fn test_wildcard_flow_render() {
        let flow = FlowSpec::new(FlowMatch::new()).priority(0).action(Action::Normal);
        assert_eq!(
            flow.render(),
            "hard_timeout=0,idle_timeout=0,priority=0,actions=normal"
        );
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("all".parse::<Protocol>().unwrap(), Protocol::Ip);
        assert_eq!("47".parse::<Protocol>().unwrap(), Protocol::Number(47));
        assert!("bogus".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_protocol_ports() {
        assert!(Protocol::Tcp.has_ports());
        assert!(Protocol::Udp.has_ports());
        assert!(!Protocol::Icmp.has_ports());
        assert!(!Protocol::Ip.has_ports());
    }
}
