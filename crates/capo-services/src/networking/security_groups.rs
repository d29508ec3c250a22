//! Managed security group planning and reconciliation
//!
//! Each cluster gets a control plane group and a worker group, plus a
//! bastion group when a bastion is enabled. Rules reference peer groups by
//! ID, so every group is ensured to exist before any rule is planned.
//! Reconciling a group then only creates missing rules and deletes rules
//! the plan no longer contains.

use std::fmt;

use tracing::{debug, info, warn};

use capo_common::api::{
    ManagedSecurityGroups, ObservedSecurityGroupRule, SecurityGroup, SecurityGroupRule,
};
use capo_common::{Error, Result, SECURITY_GROUP_PREFIX};

use super::rules;
use super::NetworkingService;

/// Description set on every group this service creates
pub const MANAGED_GROUP_DESCRIPTION: &str = "Cluster API managed group";

/// Node role a managed group is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecurityGroupRole {
    /// Control plane machines
    ControlPlane,
    /// Worker machines
    Worker,
    /// Bastion host
    Bastion,
}

impl SecurityGroupRole {
    /// All roles, in reconcile order
    pub const ALL: [SecurityGroupRole; 3] = [
        SecurityGroupRole::ControlPlane,
        SecurityGroupRole::Worker,
        SecurityGroupRole::Bastion,
    ];

    /// Suffix used in the group name
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityGroupRole::ControlPlane => "controlplane",
            SecurityGroupRole::Worker => "worker",
            SecurityGroupRole::Bastion => "bastion",
        }
    }
}

impl fmt::Display for SecurityGroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the managed group for a cluster and role
pub fn security_group_name(namespace: &str, cluster: &str, role: SecurityGroupRole) -> String {
    format!(
        "{}-{}-{}-secgroup-{}",
        SECURITY_GROUP_PREFIX, namespace, cluster, role
    )
}

/// Names of a cluster's managed groups
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupNames {
    /// Control plane group name
    pub control_plane: String,
    /// Worker group name
    pub worker: String,
    /// Bastion group name
    pub bastion: String,
}

impl SecurityGroupNames {
    /// Names for the cluster `namespace/cluster`
    pub fn new(namespace: &str, cluster: &str) -> Self {
        Self {
            control_plane: security_group_name(namespace, cluster, SecurityGroupRole::ControlPlane),
            worker: security_group_name(namespace, cluster, SecurityGroupRole::Worker),
            bastion: security_group_name(namespace, cluster, SecurityGroupRole::Bastion),
        }
    }

    /// Name for a single role
    pub fn for_role(&self, role: SecurityGroupRole) -> &str {
        match role {
            SecurityGroupRole::ControlPlane => &self.control_plane,
            SecurityGroupRole::Worker => &self.worker,
            SecurityGroupRole::Bastion => &self.bastion,
        }
    }
}

/// IDs of a cluster's managed groups
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityGroupIds {
    /// Control plane group ID
    pub control_plane: String,
    /// Worker group ID
    pub worker: String,
    /// Bastion group ID, when a bastion is enabled
    pub bastion: Option<String>,
}

/// Desired rules of one group
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityGroupPlan {
    /// Group name
    pub name: String,
    /// Rules the group must carry, in creation order
    pub rules: Vec<SecurityGroupRule>,
}

/// Desired state of all managed groups of a cluster
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredSecurityGroups {
    /// Control plane group
    pub control_plane: SecurityGroupPlan,
    /// Worker group
    pub worker: SecurityGroupPlan,
    /// Bastion group, when enabled
    pub bastion: Option<SecurityGroupPlan>,
}

/// Build the desired rules of every managed group
///
/// SSH from the bastion is only planned when `ids.bastion` is set.
pub fn desired_security_groups(
    spec: &ManagedSecurityGroups,
    names: &SecurityGroupNames,
    ids: &SecurityGroupIds,
) -> DesiredSecurityGroups {
    let bastion_id = if spec.bastion_enabled {
        ids.bastion.as_deref()
    } else {
        None
    };

    let mut control_plane = rules::default_rules();
    let mut worker = rules::default_rules();

    if spec.allow_all_in_cluster_traffic {
        control_plane.extend(rules::control_plane_allow_all(&ids.control_plane, &ids.worker));
        worker.extend(rules::worker_allow_all(&ids.worker, &ids.control_plane));
    } else {
        control_plane.extend(rules::control_plane_rules(
            &ids.control_plane,
            &ids.worker,
            &spec.cni,
        ));
        worker.extend(rules::worker_rules(&ids.worker, &ids.control_plane, &spec.cni));
    }

    control_plane.extend(rules::control_plane_https(&spec.allowed_api_cidrs));
    if spec.node_port_access {
        worker.extend(rules::worker_node_port());
    }

    if let Some(bastion_id) = bastion_id {
        control_plane.extend(rules::control_plane_ssh(bastion_id));
        worker.extend(rules::worker_ssh(bastion_id));
    }

    let bastion = bastion_id.map(|_| {
        let mut bastion_rules = rules::default_rules();
        bastion_rules.extend(rules::bastion_ssh());
        SecurityGroupPlan {
            name: names.bastion.clone(),
            rules: bastion_rules,
        }
    });

    DesiredSecurityGroups {
        control_plane: SecurityGroupPlan {
            name: names.control_plane.clone(),
            rules: control_plane,
        },
        worker: SecurityGroupPlan {
            name: names.worker.clone(),
            rules: worker,
        },
        bastion,
    }
}

/// Rule changes needed to move a group to its desired state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleDiff {
    /// Desired rules missing from the group
    pub to_create: Vec<SecurityGroupRule>,
    /// Existing rules no longer desired
    pub to_delete: Vec<ObservedSecurityGroupRule>,
}

impl RuleDiff {
    /// True when the group already matches
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Compare desired and observed rules by the traffic they match
///
/// IDs, owning group and descriptions are ignored. `to_create` follows
/// `desired` order with repeats dropped; `to_delete` follows `observed`.
pub fn diff_rules(desired: &[SecurityGroupRule], observed: &[ObservedSecurityGroupRule]) -> RuleDiff {
    let mut to_create: Vec<SecurityGroupRule> = Vec::new();
    for rule in desired {
        let present = observed.iter().any(|o| o.rule.same_traffic(rule))
            || to_create.iter().any(|r| r.same_traffic(rule));
        if !present {
            to_create.push(rule.clone());
        }
    }

    let to_delete = observed
        .iter()
        .filter(|o| !desired.iter().any(|rule| rule.same_traffic(&o.rule)))
        .cloned()
        .collect();

    RuleDiff {
        to_create,
        to_delete,
    }
}

impl NetworkingService {
    /// Ensure the cluster's managed groups exist and carry the planned rules
    ///
    /// Returns the IDs of the reconciled groups.
    pub async fn reconcile_security_groups(
        &self,
        spec: &ManagedSecurityGroups,
        namespace: &str,
        cluster: &str,
    ) -> Result<SecurityGroupIds> {
        spec.validate()?;
        let names = SecurityGroupNames::new(namespace, cluster);

        let control_plane = self.ensure_group(&names.control_plane).await?;
        let worker = self.ensure_group(&names.worker).await?;
        let bastion = if spec.bastion_enabled {
            Some(self.ensure_group(&names.bastion).await?)
        } else {
            None
        };

        let ids = SecurityGroupIds {
            control_plane: control_plane.id,
            worker: worker.id,
            bastion: bastion.map(|group| group.id),
        };

        let desired = desired_security_groups(spec, &names, &ids);
        self.reconcile_rules(&desired.control_plane, &ids.control_plane)
            .await?;
        self.reconcile_rules(&desired.worker, &ids.worker).await?;
        if let (Some(plan), Some(id)) = (&desired.bastion, &ids.bastion) {
            self.reconcile_rules(plan, id).await?;
        }

        info!(
            namespace = %namespace,
            cluster = %cluster,
            control_plane = %ids.control_plane,
            worker = %ids.worker,
            bastion = ?ids.bastion,
            "security groups reconciled"
        );
        Ok(ids)
    }

    /// Delete every managed group of the cluster that still exists
    pub async fn delete_security_groups(&self, namespace: &str, cluster: &str) -> Result<()> {
        let names = SecurityGroupNames::new(namespace, cluster);

        for role in SecurityGroupRole::ALL {
            let name = names.for_role(role);
            let groups = self
                .client
                .list_security_groups(name)
                .await
                .map_err(|e| Error::networking_for(name, "error listing security group", &e))?;

            for group in groups {
                warn!(group = %name, id = %group.id, "deleting security group");
                match self.client.delete_security_group(&group.id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        debug!(group = %name, id = %group.id, "security group already gone");
                    }
                    Err(e) => {
                        return Err(Error::networking_for(
                            name,
                            "error deleting security group",
                            &e,
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    /// Find a group by name, creating it if missing
    async fn ensure_group(&self, name: &str) -> Result<SecurityGroup> {
        let mut groups = self
            .client
            .list_security_groups(name)
            .await
            .map_err(|e| Error::networking_for(name, "error listing security group", &e))?;

        if groups.len() > 1 {
            return Err(Error::Networking {
                group: name.to_string(),
                message: format!("found {} security groups with this name", groups.len()),
                retryable: false,
            });
        }
        if let Some(group) = groups.pop() {
            debug!(group = %name, id = %group.id, "security group exists");
            return Ok(group);
        }

        let group = self
            .client
            .create_security_group(name, MANAGED_GROUP_DESCRIPTION)
            .await
            .map_err(|e| Error::networking_for(name, "error creating security group", &e))?;
        info!(group = %name, id = %group.id, "created security group");
        Ok(group)
    }

    async fn reconcile_rules(&self, plan: &SecurityGroupPlan, group_id: &str) -> Result<()> {
        let observed = self
            .client
            .list_security_group_rules(group_id)
            .await
            .map_err(|e| Error::networking_for(&plan.name, "error listing rules", &e))?;

        let diff = diff_rules(&plan.rules, &observed);
        if diff.is_empty() {
            debug!(group = %plan.name, "security group rules up to date");
            return Ok(());
        }

        for rule in &diff.to_delete {
            warn!(group = %plan.name, rule = %rule.id, "deleting stale security group rule");
            self.client
                .delete_security_group_rule(&rule.id)
                .await
                .map_err(|e| Error::networking_for(&plan.name, "error deleting rule", &e))?;
        }

        for rule in &diff.to_create {
            let created = self
                .client
                .create_security_group_rule(group_id, rule)
                .await
                .map_err(|e| {
                    Error::networking_for(
                        &plan.name,
                        format!("error creating rule {:?}", rule.description),
                        &e,
                    )
                })?;
            debug!(
                group = %plan.name,
                rule = %created.id,
                description = %rule.description,
                "created security group rule"
            );
        }

        info!(
            group = %plan.name,
            created = diff.to_create.len(),
            deleted = diff.to_delete.len(),
            "security group rules updated"
        );
        Ok(())
    }
}
