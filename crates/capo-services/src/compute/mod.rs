//! Compute (Nova) service: availability zones and server status

mod availability_zone;
mod instance_types;
mod service;

pub use availability_zone::{failure_domains, AvailabilityZone, ZoneState};
pub use instance_types::{
    AddressType, InstanceNetworkStatus, InstanceState, InstanceStatus, NetworkAddress, ServerExt,
    NODE_EXTERNAL_IP, NODE_INTERNAL_IP,
};
pub use service::ComputeService;
