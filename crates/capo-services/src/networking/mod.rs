//! Networking (Neutron) service: managed security groups

pub mod rules;
mod security_groups;

use std::sync::Arc;

use crate::client::NetworkingClient;

pub use security_groups::{
    desired_security_groups, diff_rules, security_group_name, DesiredSecurityGroups, RuleDiff,
    SecurityGroupIds, SecurityGroupNames, SecurityGroupPlan, SecurityGroupRole,
    MANAGED_GROUP_DESCRIPTION,
};

/// Neutron-backed security group management
#[derive(Clone)]
pub struct NetworkingService {
    client: Arc<dyn NetworkingClient>,
}

impl NetworkingService {
    /// Create a service over the given client
    pub fn new(client: Arc<dyn NetworkingClient>) -> Self {
        Self { client }
    }
}
