//! Rules command
//!
//! Prints the planned rules of one managed group. Nothing is read from or
//! written to OpenStack, the group IDs are taken from the arguments.

use clap::{Args, ValueEnum};

use capo_common::api::{CniPlugin, ManagedSecurityGroups};
use capo_services::networking::{
    desired_security_groups, SecurityGroupIds, SecurityGroupNames, SecurityGroupPlan,
};

use super::print_json;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Role {
    ControlPlane,
    Worker,
    Bastion,
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Node role whose group is printed
    #[arg(long, value_enum)]
    pub role: Role,

    /// ID of the role's own security group
    #[arg(long)]
    pub self_group: String,

    /// ID of the peer role's group (worker for control plane and vice versa)
    #[arg(long)]
    pub peer_group: Option<String>,

    /// ID of the bastion group; adds SSH-from-bastion rules
    #[arg(long)]
    pub bastion_group: Option<String>,

    /// CNI rule groups to open (default: calico and cilium)
    #[arg(long)]
    pub cni: Vec<CniPlugin>,

    /// Open no CNI rule groups, only the common kubelet and etcd rules
    #[arg(long, conflicts_with = "cni")]
    pub no_cni: bool,

    /// Allow all in-cluster traffic instead of per-port rules
    #[arg(long)]
    pub allow_all: bool,

    /// CIDRs allowed to reach the API server (default: any)
    #[arg(long = "api-cidr")]
    pub api_cidrs: Vec<String>,

    /// Do not open the NodePort range on workers
    #[arg(long)]
    pub no_node_port: bool,

    /// Cluster namespace used to name the group
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Cluster name used to name the group
    #[arg(long, default_value = "cluster")]
    pub cluster: String,
}

pub fn run(args: RulesArgs) -> Result<()> {
    let plan = plan_for(&args)?;
    print_json(&serde_json::json!({
        "name": plan.name,
        "rules": plan.rules,
    }))
}

/// Build the plan of the requested group from the arguments
pub fn plan_for(args: &RulesArgs) -> Result<SecurityGroupPlan> {
    let peer = || {
        args.peer_group
            .clone()
            .ok_or_else(|| Error::validation("--peer-group is required for this role"))
    };

    let (ids, bastion_enabled) = match args.role {
        Role::ControlPlane => (
            SecurityGroupIds {
                control_plane: args.self_group.clone(),
                worker: peer()?,
                bastion: args.bastion_group.clone(),
            },
            args.bastion_group.is_some(),
        ),
        Role::Worker => (
            SecurityGroupIds {
                control_plane: peer()?,
                worker: args.self_group.clone(),
                bastion: args.bastion_group.clone(),
            },
            args.bastion_group.is_some(),
        ),
        Role::Bastion => (
            SecurityGroupIds {
                bastion: Some(args.self_group.clone()),
                ..Default::default()
            },
            true,
        ),
    };

    let spec = ManagedSecurityGroups {
        allow_all_in_cluster_traffic: args.allow_all,
        cni: if args.no_cni {
            Vec::new()
        } else if args.cni.is_empty() {
            CniPlugin::ALL.to_vec()
        } else {
            args.cni.clone()
        },
        bastion_enabled,
        allowed_api_cidrs: args.api_cidrs.clone(),
        node_port_access: !args.no_node_port,
    };

    spec.validate()?;

    let names = SecurityGroupNames::new(&args.namespace, &args.cluster);
    let desired = desired_security_groups(&spec, &names, &ids);

    match args.role {
        Role::ControlPlane => Ok(desired.control_plane),
        Role::Worker => Ok(desired.worker),
        Role::Bastion => desired
            .bastion
            .ok_or_else(|| Error::validation("bastion group was not planned")),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use capo_services::networking::rules;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RulesArgs,
    }

    fn parse(argv: &[&str]) -> RulesArgs {
        let mut full = vec!["rules"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full)
            .expect("arguments should parse")
            .args
    }

    #[test]
    fn control_plane_defaults() {
        let args = parse(&["--role", "control-plane", "--self-group", "cp", "--peer-group", "w"]);
        let plan = plan_for(&args).expect("plan should build");

        assert_eq!(plan.name, "k8s-cluster-default-cluster-secgroup-controlplane");
        let mut expected = rules::default_rules();
        expected.extend(rules::control_plane_general("cp", "w"));
        expected.extend(rules::control_plane_https(&[]));
        assert_eq!(plan.rules, expected);
    }

    #[test]
    fn worker_with_single_cni_and_bastion() {
        let args = parse(&[
            "--role",
            "worker",
            "--self-group",
            "w",
            "--peer-group",
            "cp",
            "--cni",
            "calico",
            "--bastion-group",
            "b",
            "--no-node-port",
        ]);
        let plan = plan_for(&args).expect("plan should build");

        let mut expected = rules::default_rules();
        expected.extend(rules::worker_rules("w", "cp", &[CniPlugin::Calico]));
        expected.extend(rules::worker_ssh("b"));
        assert_eq!(plan.rules, expected);
    }

    #[test]
    fn bastion_needs_no_peer() {
        let args = parse(&["--role", "bastion", "--self-group", "b"]);
        let plan = plan_for(&args).expect("plan should build");

        let mut expected = rules::default_rules();
        expected.extend(rules::bastion_ssh());
        assert_eq!(plan.rules, expected);
    }

    #[test]
    fn no_cni_plans_common_rules_only() {
        let args = parse(&[
            "--role",
            "control-plane",
            "--self-group",
            "cp",
            "--peer-group",
            "w",
            "--no-cni",
        ]);
        let plan = plan_for(&args).expect("plan should build");

        let mut expected = rules::default_rules();
        expected.extend(rules::control_plane_common("cp", "w"));
        expected.extend(rules::control_plane_https(&[]));
        assert_eq!(plan.rules, expected);
    }

    #[test]
    fn no_cni_conflicts_with_cni() {
        let argv = [
            "rules",
            "--role",
            "worker",
            "--self-group",
            "w",
            "--cni",
            "calico",
            "--no-cni",
        ];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn invalid_api_cidr_is_rejected() {
        let args = parse(&[
            "--role",
            "control-plane",
            "--self-group",
            "cp",
            "--peer-group",
            "w",
            "--api-cidr",
            "10.0.0.0/40",
        ]);
        assert!(matches!(plan_for(&args), Err(Error::OpenStack(_))));
    }

    #[test]
    fn missing_peer_is_rejected() {
        let args = parse(&["--role", "worker", "--self-group", "w"]);
        assert!(matches!(plan_for(&args), Err(Error::Validation { .. })));
    }

    #[test]
    fn unknown_cni_fails_to_parse() {
        let argv = ["rules", "--role", "worker", "--self-group", "w", "--cni", "flannel"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }
}
