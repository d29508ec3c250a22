//! OpenStack compute and networking services for the Cluster API provider
//!
//! - [`networking`]: managed security group rule tables, planning and
//!   reconciliation against Neutron
//! - [`compute`]: availability zones, failure domains and server address
//!   classification against Nova
//! - [`client`]: the client traits both services are written against, and
//!   their REST implementation

pub mod client;
pub mod compute;
pub mod networking;

pub use client::{ComputeClient, NetworkingClient, OpenStackHttpClient};
pub use compute::ComputeService;
pub use networking::NetworkingService;
