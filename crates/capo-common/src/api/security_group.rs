//! Security group value types
//!
//! [`SecurityGroupRule`] mirrors the body accepted by the OpenStack
//! Networking security-group-rule-create API, so a rule serializes straight
//! into a request. Rules are built once per reconciliation and never mutated
//! after they leave the rule tables.
//!
//! Reference: <https://docs.openstack.org/api-ref/network/v2/#security-group-rules-security-group-rules>

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Traffic direction a rule applies to
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic entering the instance
    Ingress,
    /// Traffic leaving the instance
    Egress,
}

/// IP family a rule applies to
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum EtherType {
    /// IPv4 traffic
    IPv4,
    /// IPv6 traffic
    IPv6,
}

/// CNI plugins with a dedicated rule group
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CniPlugin {
    /// Calico: BGP peering and IP-in-IP encapsulation
    Calico,
    /// Cilium: health checks, VXLAN overlay and ICMP echo checks
    Cilium,
}

impl CniPlugin {
    /// Every plugin with a rule group, in table order
    pub const ALL: [CniPlugin; 2] = [CniPlugin::Calico, CniPlugin::Cilium];

    /// Lowercase plugin name
    pub fn as_str(&self) -> &'static str {
        match self {
            CniPlugin::Calico => "calico",
            CniPlugin::Cilium => "cilium",
        }
    }
}

impl fmt::Display for CniPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CniPlugin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calico" => Ok(CniPlugin::Calico),
            "cilium" => Ok(CniPlugin::Cilium),
            other => Err(Error::validation_for_field(
                "cni",
                format!("unknown CNI plugin '{}' (expected calico or cilium)", other),
            )),
        }
    }
}

/// A desired security group rule
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct SecurityGroupRule {
    /// Human readable label (e.g., "Etcd")
    #[serde(default, deserialize_with = "null_as_empty")]
    #[schemars(with = "String")]
    pub description: String,

    /// Ingress or egress
    pub direction: Direction,

    /// IPv4 or IPv6
    #[serde(rename = "ethertype")]
    pub ether_type: EtherType,

    /// Lowest port in range; for ICMP the ICMP type. `None` matches all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,

    /// Highest port in range; for ICMP the ICMP code. `None` matches all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,

    /// IP protocol name (tcp, udp, icmp, ipip). `None` matches any protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Security group whose members are the allowed peers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,

    /// CIDR of the allowed peers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,
}

impl SecurityGroupRule {
    /// Start an IPv4 ingress rule open to any protocol and any peer
    pub fn ingress(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            direction: Direction::Ingress,
            ether_type: EtherType::IPv4,
            port_range_min: None,
            port_range_max: None,
            protocol: None,
            remote_group_id: None,
            remote_ip_prefix: None,
        }
    }

    /// Start an egress rule for the given IP family
    pub fn egress(description: impl Into<String>, ether_type: EtherType) -> Self {
        Self {
            direction: Direction::Egress,
            ether_type,
            ..Self::ingress(description)
        }
    }

    /// Restrict to a TCP port range
    pub fn tcp(self, min: u16, max: u16) -> Self {
        self.protocol("tcp").ports(min, max)
    }

    /// Restrict to a UDP port range
    pub fn udp(self, min: u16, max: u16) -> Self {
        self.protocol("udp").ports(min, max)
    }

    /// Restrict to one ICMP type, any code
    pub fn icmp(self, icmp_type: u16) -> Self {
        let mut rule = self.protocol("icmp");
        rule.port_range_min = Some(icmp_type);
        rule.port_range_max = None;
        rule
    }

    /// Set the IP protocol
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the port range
    pub fn ports(mut self, min: u16, max: u16) -> Self {
        self.port_range_min = Some(min);
        self.port_range_max = Some(max);
        self
    }

    /// Allow traffic from members of a security group
    pub fn from_group(mut self, group_id: impl Into<String>) -> Self {
        self.remote_group_id = Some(group_id.into());
        self.remote_ip_prefix = None;
        self
    }

    /// Allow traffic from a CIDR
    ///
    /// The ethertype follows the prefix's address family.
    pub fn from_prefix(mut self, cidr: impl Into<String>) -> Self {
        let cidr = cidr.into();
        if let Ok(ether_type) = cidr_ether_type(&cidr) {
            self.ether_type = ether_type;
        }
        self.remote_ip_prefix = Some(cidr);
        self.remote_group_id = None;
        self
    }

    /// Compare the traffic a rule matches, ignoring its description
    pub fn same_traffic(&self, other: &SecurityGroupRule) -> bool {
        self.direction == other.direction
            && self.ether_type == other.ether_type
            && self.port_range_min == other.port_range_min
            && self.port_range_max == other.port_range_max
            && self.protocol == other.protocol
            && self.remote_group_id == other.remote_group_id
            && self.remote_ip_prefix == other.remote_ip_prefix
    }
}

/// A rule as it exists in OpenStack
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ObservedSecurityGroupRule {
    /// Rule UUID
    pub id: String,
    /// UUID of the group the rule belongs to
    pub security_group_id: String,
    /// The rule body
    #[serde(flatten)]
    pub rule: SecurityGroupRule,
}

/// A security group as it exists in OpenStack
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SecurityGroup {
    /// Group UUID
    pub id: String,
    /// Group name
    pub name: String,
    /// Group description
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// Rules currently attached to the group
    #[serde(default)]
    pub security_group_rules: Vec<ObservedSecurityGroupRule>,
}

/// Managed security group settings for a cluster
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSecurityGroups {
    /// Allow all traffic between cluster nodes instead of per-port rules
    #[serde(default)]
    pub allow_all_in_cluster_traffic: bool,

    /// CNI plugins whose rule groups are opened (default: calico and cilium)
    #[serde(default = "default_cni")]
    pub cni: Vec<CniPlugin>,

    /// Create a bastion group and allow SSH from it to the nodes
    #[serde(default)]
    pub bastion_enabled: bool,

    /// CIDRs allowed to reach the Kubernetes API (empty allows any source)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_api_cidrs: Vec<String>,

    /// Open the NodePort service range on workers (default: true)
    #[serde(default = "default_true")]
    pub node_port_access: bool,
}

impl ManagedSecurityGroups {
    /// Reject settings Neutron would refuse
    pub fn validate(&self) -> Result<(), Error> {
        for cidr in &self.allowed_api_cidrs {
            cidr_ether_type(cidr)?;
        }
        Ok(())
    }
}

/// Address family of a CIDR such as `10.0.0.0/8` or `2001:db8::/32`
pub fn cidr_ether_type(cidr: &str) -> Result<EtherType, Error> {
    let invalid = || {
        Error::validation_for_field("allowedApiCidrs", format!("'{}' is not a valid CIDR", cidr))
    };

    let (addr, prefix_len) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let prefix_len: u8 = prefix_len.parse().map_err(|_| invalid())?;

    let (ether_type, max_len) = match addr {
        IpAddr::V4(_) => (EtherType::IPv4, 32),
        IpAddr::V6(_) => (EtherType::IPv6, 128),
    };
    if prefix_len > max_len {
        return Err(invalid());
    }
    Ok(ether_type)
}

/// Neutron reports unset descriptions as `null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_cni() -> Vec<CniPlugin> {
    CniPlugin::ALL.to_vec()
}

fn default_true() -> bool {
    true
}

impl Default for ManagedSecurityGroups {
    fn default() -> Self {
        Self {
            allow_all_in_cluster_traffic: false,
            cni: default_cni(),
            bastion_enabled: false,
            allowed_api_cidrs: Vec::new(),
            node_port_access: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_serializes_with_neutron_field_names() {
        let rule = SecurityGroupRule::ingress("Etcd")
            .tcp(2379, 2380)
            .from_group("sg-cp");
        let json = serde_json::to_value(&rule).expect("rule should serialize");

        assert_eq!(json["direction"], "ingress");
        assert_eq!(json["ethertype"], "IPv4");
        assert_eq!(json["port_range_min"], 2379);
        assert_eq!(json["port_range_max"], 2380);
        assert_eq!(json["protocol"], "tcp");
        assert_eq!(json["remote_group_id"], "sg-cp");
        assert!(json.get("remote_ip_prefix").is_none());
    }

    #[test]
    fn open_rule_omits_optional_fields() {
        let rule = SecurityGroupRule::egress("Full open", EtherType::IPv6);
        let json = serde_json::to_value(&rule).expect("rule should serialize");

        assert_eq!(json["direction"], "egress");
        assert_eq!(json["ethertype"], "IPv6");
        assert!(json.get("protocol").is_none());
        assert!(json.get("port_range_min").is_none());
    }

    #[test]
    fn icmp_sets_type_and_leaves_code_open() {
        let rule = SecurityGroupRule::ingress("ICMP HealthCheck").icmp(8);
        assert_eq!(rule.protocol.as_deref(), Some("icmp"));
        assert_eq!(rule.port_range_min, Some(8));
        assert_eq!(rule.port_range_max, None);
    }

    #[test]
    fn remote_group_and_prefix_are_exclusive() {
        let rule = SecurityGroupRule::ingress("x")
            .from_prefix("10.0.0.0/8")
            .from_group("sg-1");
        assert_eq!(rule.remote_group_id.as_deref(), Some("sg-1"));
        assert!(rule.remote_ip_prefix.is_none());

        let rule = rule.from_prefix("192.168.0.0/16");
        assert!(rule.remote_group_id.is_none());
    }

    #[test]
    fn prefix_sets_ethertype_from_address_family() {
        let rule = SecurityGroupRule::ingress("Kubernetes API").from_prefix("2001:db8::/32");
        assert_eq!(rule.ether_type, EtherType::IPv6);

        let rule = rule.from_prefix("203.0.113.0/24");
        assert_eq!(rule.ether_type, EtherType::IPv4);
    }

    #[test]
    fn cidr_family_and_validity() {
        assert_eq!(cidr_ether_type("10.0.0.0/8").ok(), Some(EtherType::IPv4));
        assert_eq!(cidr_ether_type("fd00::/8").ok(), Some(EtherType::IPv6));
        for bad in ["10.0.0.0", "10.0.0.0/33", "fd00::/129", "example.com/24", "10.0.0.0/x"] {
            match cidr_ether_type(bad) {
                Err(Error::Validation { field, .. }) => {
                    assert_eq!(field.as_deref(), Some("allowedApiCidrs"), "{}", bad)
                }
                other => panic!("expected validation error for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn managed_groups_validate_api_cidrs() {
        let mut spec = ManagedSecurityGroups {
            allowed_api_cidrs: vec!["203.0.113.0/24".to_string(), "2001:db8::/32".to_string()],
            ..Default::default()
        };
        assert!(spec.validate().is_ok());

        spec.allowed_api_cidrs.push("not-a-cidr".to_string());
        assert!(spec.validate().is_err());
    }

    #[test]
    fn same_traffic_ignores_description() {
        let a = SecurityGroupRule::ingress("Kubelet API").tcp(10250, 10250);
        let b = SecurityGroupRule::ingress("something else").tcp(10250, 10250);
        assert!(a.same_traffic(&b));
        assert!(!a.same_traffic(&b.clone().from_group("sg-2")));
    }

    #[test]
    fn observed_rule_decodes_neutron_response() {
        let body = serde_json::json!({
            "id": "rule-1",
            "security_group_id": "sg-1",
            "description": null,
            "direction": "ingress",
            "ethertype": "IPv4",
            "port_range_min": null,
            "port_range_max": null,
            "protocol": "ipip",
            "remote_group_id": "sg-2",
            "remote_ip_prefix": null,
            "tenant_id": "ignored"
        });
        let observed: ObservedSecurityGroupRule =
            serde_json::from_value(body).expect("observed rule should decode");
        assert_eq!(observed.id, "rule-1");
        assert_eq!(observed.rule.protocol.as_deref(), Some("ipip"));
        assert_eq!(observed.rule.remote_group_id.as_deref(), Some("sg-2"));
    }

    #[test]
    fn cni_parses_case_insensitively() {
        assert_eq!("Calico".parse::<CniPlugin>().ok(), Some(CniPlugin::Calico));
        assert_eq!("cilium".parse::<CniPlugin>().ok(), Some(CniPlugin::Cilium));
        assert!("flannel".parse::<CniPlugin>().is_err());
    }

    #[test]
    fn managed_groups_default_opens_both_cni_groups() {
        let spec: ManagedSecurityGroups =
            serde_json::from_str("{}").expect("empty spec should decode");
        assert_eq!(spec, ManagedSecurityGroups::default());
        assert_eq!(spec.cni, vec![CniPlugin::Calico, CniPlugin::Cilium]);
        assert!(spec.node_port_access);
        assert!(!spec.bastion_enabled);
    }

    #[test]
    fn managed_groups_accept_camel_case() {
        let spec: ManagedSecurityGroups = serde_json::from_value(serde_json::json!({
            "allowAllInClusterTraffic": true,
            "cni": ["cilium"],
            "bastionEnabled": true,
            "allowedApiCidrs": ["203.0.113.0/24"],
            "nodePortAccess": false
        }))
        .expect("spec should decode");
        assert!(spec.allow_all_in_cluster_traffic);
        assert_eq!(spec.cni, vec![CniPlugin::Cilium]);
        assert_eq!(spec.allowed_api_cidrs, vec!["203.0.113.0/24"]);
        assert!(!spec.node_port_access);
    }
}
