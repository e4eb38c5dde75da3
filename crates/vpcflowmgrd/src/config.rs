//! VPC configuration payload parsing.
//!
//! The management server pushes one JSON document per update. Topology
//! pushes carry hosts, VMs and tiers; routing-policy pushes carry tiers and
//! ACLs. Both share the same envelope, so one model with defaulted
//! collections covers them.

use serde::{Deserialize, Serialize};

use ovsmgr_common::{FlowMgrError, FlowMgrResult};

/// Envelope of every pushed document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpcPayload {
    pub vpc: Option<Vpc>,
}

impl VpcPayload {
    /// Parses a payload and unwraps the VPC object.
    pub fn parse(json: &str) -> FlowMgrResult<Vpc> {
        let payload: VpcPayload = serde_json::from_str(json)
            .map_err(|e| FlowMgrError::invalid_config("payload", e.to_string()))?;
        payload
            .vpc
            .ok_or_else(|| FlowMgrError::invalid_config("vpc", "Missing vpc object"))
    }
}

/// A VPC as the management server describes it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Vpc {
    pub id: String,
    pub cidr: String,
    #[serde(default)]
    pub hosts: Vec<VpcHost>,
    #[serde(default)]
    pub vms: Vec<VpcVm>,
    #[serde(default)]
    pub tiers: Vec<VpcTier>,
    #[serde(default)]
    pub acls: Vec<VpcAcl>,
}

impl Vpc {
    /// The tier a NIC belongs to, by network uuid.
    pub fn tier_for_network(&self, network_uuid: &str) -> Option<&VpcTier> {
        self.tiers.iter().find(|t| t.networkuuid == network_uuid)
    }

    /// An ACL by its id.
    pub fn acl_by_id(&self, acl_id: &str) -> Option<&VpcAcl> {
        self.acls.iter().find(|a| a.id == acl_id)
    }

    /// VMs placed on the given host.
    pub fn vms_on_host(&self, host_id: u64) -> impl Iterator<Item = &VpcVm> {
        self.vms.iter().filter(move |vm| vm.hostid == host_id)
    }

    /// Hosts the VPC spans, excluding the given one.
    pub fn remote_hosts(&self, this_host_id: u64) -> impl Iterator<Item = &VpcHost> {
        self.hosts.iter().filter(move |h| h.id != this_host_id)
    }
}

/// A hypervisor host the VPC spans.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpcHost {
    pub id: u64,
    pub ipaddress: String,
}

/// A guest VM and its NICs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpcVm {
    #[serde(default)]
    pub id: u64,
    pub hostid: u64,
    #[serde(default)]
    pub nics: Vec<VpcNic>,
}

/// One guest NIC.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpcNic {
    pub macaddress: String,
    pub ipaddress: String,
    pub networkuuid: String,
}

/// One VPC tier (network segment).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpcTier {
    pub networkuuid: String,
    pub gatewayip: String,
    pub gatewaymac: String,
    pub cidr: String,
    pub grekey: u32,
    #[serde(default)]
    pub aclid: Option<String>,
}

/// A network ACL.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpcAcl {
    pub id: String,
    #[serde(default)]
    pub aclitems: Vec<AclItem>,
}

/// One ACL rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AclItem {
    pub number: u16,
    #[serde(default)]
    pub uuid: String,
    pub action: AclAction,
    pub direction: AclDirection,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub sourceportstart: u16,
    #[serde(default)]
    pub sourceportend: u16,
    #[serde(default)]
    pub sourcecidrs: Vec<String>,
}

fn default_protocol() -> String {
    "ip".to_string()
}

/// ACL verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    #[serde(alias = "Allow")]
    Allow,
    #[serde(alias = "Deny")]
    Deny,
}

/// Direction a rule applies to, relative to the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AclDirection {
    #[serde(alias = "Ingress")]
    Ingress,
    #[serde(alias = "Egress")]
    Egress,
}
