//! API value types exchanged with OpenStack and Cluster API

mod failure_domain;
mod security_group;

pub use failure_domain::{FailureDomainSpec, FailureDomains};
pub use security_group::{
    cidr_ether_type, CniPlugin, Direction, EtherType, ManagedSecurityGroups,
    ObservedSecurityGroupRule, SecurityGroup, SecurityGroupRule,
};
