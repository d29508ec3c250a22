//! OpenStack API clients
//!
//! Services talk to OpenStack only through [`ComputeClient`] and
//! [`NetworkingClient`], so tests can mock the cloud while production code
//! uses [`OpenStackHttpClient`].

mod http;

pub use http::OpenStackHttpClient;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use capo_common::api::{ObservedSecurityGroupRule, SecurityGroup, SecurityGroupRule};
use capo_common::Result;

use crate::compute::{AvailabilityZone, ServerExt};

/// Compute (Nova) operations used by the services
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// List availability zones visible to the project
    async fn list_availability_zones(&self) -> Result<Vec<AvailabilityZone>>;

    /// Fetch server details, including its address map
    async fn get_server(&self, server_id: &str) -> Result<ServerExt>;
}

/// Networking (Neutron) security group operations used by the services
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkingClient: Send + Sync {
    /// List security groups with the given name
    async fn list_security_groups(&self, name: &str) -> Result<Vec<SecurityGroup>>;

    /// Create a security group
    async fn create_security_group(&self, name: &str, description: &str)
        -> Result<SecurityGroup>;

    /// Delete a security group by ID
    async fn delete_security_group(&self, group_id: &str) -> Result<()>;

    /// List the rules attached to a security group
    async fn list_security_group_rules(
        &self,
        group_id: &str,
    ) -> Result<Vec<ObservedSecurityGroupRule>>;

    /// Attach a rule to a security group
    async fn create_security_group_rule(
        &self,
        group_id: &str,
        rule: &SecurityGroupRule,
    ) -> Result<ObservedSecurityGroupRule>;

    /// Delete a rule by ID
    async fn delete_security_group_rule(&self, rule_id: &str) -> Result<()>;
}
