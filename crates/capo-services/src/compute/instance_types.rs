//! Server detail views
//!
//! Nova returns a server's addresses as a map from network name to a list
//! of address objects. The list element shape is only documented, not
//! typed, so the raw map is kept as JSON on [`ServerExt`] and decoded when
//! [`InstanceStatus::network_status`] is asked for it.
//!
//! Reference: <https://docs.openstack.org/api-ref/compute/#show-server-details>

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::NodeAddress;
use serde::{Deserialize, Serialize};
use tracing::trace;

use capo_common::{Error, Result};

/// Kubernetes node address type for private addresses
pub const NODE_INTERNAL_IP: &str = "InternalIP";

/// Kubernetes node address type for public addresses
pub const NODE_EXTERNAL_IP: &str = "ExternalIP";

/// Server details as returned by Nova
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerExt {
    /// Server UUID
    pub id: String,

    /// Server name
    #[serde(default)]
    pub name: String,

    /// Nova status string (ACTIVE, BUILD, ERROR, ...)
    #[serde(default)]
    pub status: String,

    /// Keypair injected at boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,

    /// Availability zone the server was scheduled into
    #[serde(
        rename = "OS-EXT-AZ:availability_zone",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub availability_zone: Option<String>,

    /// Address lists keyed by network name, undecoded
    #[serde(default)]
    pub addresses: BTreeMap<String, serde_json::Value>,
}

/// Lifecycle state of a server
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceState {
    /// Running and reachable
    Active,
    /// Still being built
    Build,
    /// Failed
    Error,
    /// Powered off (SHUTOFF)
    Stopped,
    /// Deleted
    Deleted,
    /// Deleted but reclaimable
    SoftDeleted,
    /// Any other status Nova reports
    Unknown(String),
}

impl InstanceState {
    /// Only active servers are ready to join the cluster
    pub fn is_ready(&self) -> bool {
        matches!(self, InstanceState::Active)
    }
}

impl From<&str> for InstanceState {
    fn from(status: &str) -> Self {
        match status {
            "ACTIVE" => InstanceState::Active,
            "BUILD" => InstanceState::Build,
            "ERROR" => InstanceState::Error,
            "SHUTOFF" => InstanceState::Stopped,
            "DELETED" => InstanceState::Deleted,
            "SOFT_DELETED" => InstanceState::SoftDeleted,
            other => InstanceState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Active => f.write_str("ACTIVE"),
            InstanceState::Build => f.write_str("BUILD"),
            InstanceState::Error => f.write_str("ERROR"),
            InstanceState::Stopped => f.write_str("SHUTOFF"),
            InstanceState::Deleted => f.write_str("DELETED"),
            InstanceState::SoftDeleted => f.write_str("SOFT_DELETED"),
            InstanceState::Unknown(s) => f.write_str(s),
        }
    }
}

/// The `OS-EXT-IPS:type` tag of an address
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum AddressType {
    /// Private address on the instance's port
    Fixed,
    /// NAT-mapped public address
    Floating,
    /// Anything else, including a missing tag
    Other(String),
}

impl Default for AddressType {
    fn default() -> Self {
        AddressType::Other(String::new())
    }
}

impl From<String> for AddressType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "fixed" => AddressType::Fixed,
            "floating" => AddressType::Floating,
            _ => AddressType::Other(tag),
        }
    }
}

impl From<AddressType> for String {
    fn from(tag: AddressType) -> Self {
        match tag {
            AddressType::Fixed => "fixed".to_string(),
            AddressType::Floating => "floating".to_string(),
            AddressType::Other(s) => s,
        }
    }
}

/// One entry of a server's per-network address list
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkAddress {
    /// IP version, 4 or 6
    pub version: u8,

    /// The address itself
    pub addr: String,

    /// Fixed, floating or other
    #[serde(rename = "OS-EXT-IPS:type", default)]
    pub address_type: AddressType,

    /// MAC of the port the address is bound to
    #[serde(
        rename = "OS-EXT-IPS:mac_addr",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mac_addr: Option<String>,
}

impl NetworkAddress {
    /// Kubernetes node address type, `None` when the entry is not reported
    ///
    /// Only IPv4 fixed and floating addresses map to a node address.
    pub fn node_address_type(&self) -> Option<&'static str> {
        if self.version != 4 {
            return None;
        }
        match self.address_type {
            AddressType::Fixed => Some(NODE_INTERNAL_IP),
            AddressType::Floating => Some(NODE_EXTERNAL_IP),
            AddressType::Other(_) => None,
        }
    }

    fn to_node_address(&self) -> Option<NodeAddress> {
        self.node_address_type().map(|type_| NodeAddress {
            address: self.addr.clone(),
            type_: type_.to_string(),
        })
    }
}

/// Read-only view over a server
#[derive(Clone, Debug)]
pub struct InstanceStatus {
    server: ServerExt,
}

impl InstanceStatus {
    /// Wrap server details
    pub fn new(server: ServerExt) -> Self {
        Self { server }
    }

    /// Server UUID
    pub fn id(&self) -> &str {
        &self.server.id
    }

    /// Server name
    pub fn name(&self) -> &str {
        &self.server.name
    }

    /// Decoded lifecycle state
    pub fn state(&self) -> InstanceState {
        InstanceState::from(self.server.status.as_str())
    }

    /// Keypair name, if one was injected
    pub fn ssh_key_name(&self) -> Option<&str> {
        self.server.key_name.as_deref()
    }

    /// Availability zone, if Nova reported one
    pub fn availability_zone(&self) -> Option<&str> {
        self.server.availability_zone.as_deref()
    }

    /// Underlying server details
    pub fn server(&self) -> &ServerExt {
        &self.server
    }

    /// Decode the server's address map
    ///
    /// Fails if any network's address list is not a list of address
    /// objects.
    pub fn network_status(&self) -> Result<InstanceNetworkStatus> {
        let mut networks = BTreeMap::new();

        for (network, raw) in &self.server.addresses {
            let list: Vec<NetworkAddress> = serde_json::from_value(raw.clone()).map_err(|e| {
                Error::serialization_for_kind(
                    "Server",
                    format!(
                        "error decoding addresses of network {} on server {}: {}",
                        network, self.server.id, e
                    ),
                )
            })?;

            for address in &list {
                if address.node_address_type().is_none() {
                    trace!(
                        server = %self.server.id,
                        network = %network,
                        address = %address.addr,
                        version = address.version,
                        address_type = %String::from(address.address_type.clone()),
                        "Ignoring address: only IPv4 fixed and floating addresses are reported"
                    );
                }
            }

            networks.insert(network.clone(), list);
        }

        Ok(InstanceNetworkStatus { networks })
    }
}

/// Addresses of a server grouped by network
///
/// Networks are kept in lexical order of their names so flattened output is
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceNetworkStatus {
    networks: BTreeMap<String, Vec<NetworkAddress>>,
}

impl InstanceNetworkStatus {
    /// Build a view directly from decoded address lists
    pub fn from_networks(networks: BTreeMap<String, Vec<NetworkAddress>>) -> Self {
        Self { networks }
    }

    /// Network names, in lexical order
    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    /// Node addresses across all networks
    ///
    /// Networks are visited in lexical order; within a network the API's
    /// order is kept. IPv6 and unknown-type entries are dropped.
    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.networks
            .values()
            .flatten()
            .filter_map(NetworkAddress::to_node_address)
            .collect()
    }

    /// Every decoded address, including IPv6 and unknown types
    pub fn all_addresses(&self) -> Vec<&NetworkAddress> {
        self.networks.values().flatten().collect()
    }

    fn first_address(&self, network: &str, address_type: &str) -> Option<&str> {
        self.networks
            .get(network)?
            .iter()
            .find(|a| a.node_address_type() == Some(address_type))
            .map(|a| a.addr.as_str())
    }

    /// First fixed IPv4 address on the network
    pub fn ip(&self, network: &str) -> Option<&str> {
        self.first_address(network, NODE_INTERNAL_IP)
    }

    /// First floating IPv4 address on the network
    pub fn floating_ip(&self, network: &str) -> Option<&str> {
        self.first_address(network, NODE_EXTERNAL_IP)
    }
}
