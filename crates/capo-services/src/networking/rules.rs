//! Security group rule tables
//!
//! Every function here is pure: it takes the IDs of the groups involved and
//! returns the same ordered rule list for the same input. The tables are
//! grouped by node role and by the component that needs the traffic
//! (kubelet/etcd, Calico, Cilium).
//!
//! Peer rules come in pairs: one allowing members of the node's own group,
//! one allowing members of the peer role's group.

use capo_common::api::{CniPlugin, EtherType, SecurityGroupRule};
use capo_common::{KUBERNETES_API_SERVER_PORT, NODE_PORT_RANGE};

const ETCD_PORTS: (u16, u16) = (2379, 2380);
const KUBELET_PORT: u16 = 10250;
const BGP_PORT: u16 = 179;
const CILIUM_HEALTH_PORT: u16 = 4240;
const CILIUM_VXLAN_PORT: u16 = 8472;
const ICMP_ECHO_REQUEST: u16 = 8;
const SSH_PORT: u16 = 22;

/// Emit `rule` once per remote group, in the given order
fn from_each(rule: SecurityGroupRule, groups: &[&str]) -> Vec<SecurityGroupRule> {
    groups
        .iter()
        .map(|group| rule.clone().from_group(*group))
        .collect()
}

/// Egress open to everything, for both IP families
pub fn default_rules() -> Vec<SecurityGroupRule> {
    vec![
        SecurityGroupRule::egress("Full open", EtherType::IPv4),
        SecurityGroupRule::egress("Full open", EtherType::IPv6),
    ]
}

/// Permit traffic for etcd and kubelet on the control plane
pub fn control_plane_common(self_group: &str, worker_group: &str) -> Vec<SecurityGroupRule> {
    vec![
        SecurityGroupRule::ingress("Etcd")
            .tcp(ETCD_PORTS.0, ETCD_PORTS.1)
            .from_group(self_group),
        // kubeadm requires it
        SecurityGroupRule::ingress("Kubelet API")
            .tcp(KUBELET_PORT, KUBELET_PORT)
            .from_group(self_group),
        // metrics-server on workers scrapes control plane kubelets
        SecurityGroupRule::ingress("Kubelet API")
            .tcp(KUBELET_PORT, KUBELET_PORT)
            .from_group(worker_group),
    ]
}

/// Calico BGP peering and IP-in-IP between the node's group and its peer
fn calico(self_group: &str, peer_group: &str) -> Vec<SecurityGroupRule> {
    let groups = [self_group, peer_group];
    let mut rules = from_each(
        SecurityGroupRule::ingress("BGP (calico)").tcp(BGP_PORT, BGP_PORT),
        &groups,
    );
    rules.extend(from_each(
        SecurityGroupRule::ingress("IP-in-IP (calico)").protocol("ipip"),
        &groups,
    ));
    rules
}

/// Cilium health checks, VXLAN overlay and ICMP echo checks
fn cilium(self_group: &str, peer_group: &str) -> Vec<SecurityGroupRule> {
    let groups = [self_group, peer_group];
    let mut rules = from_each(
        SecurityGroupRule::ingress("HealthChecks (cilium)")
            .tcp(CILIUM_HEALTH_PORT, CILIUM_HEALTH_PORT),
        &groups,
    );
    rules.extend(from_each(
        SecurityGroupRule::ingress("VXLAN (cilium)").udp(CILIUM_VXLAN_PORT, CILIUM_VXLAN_PORT),
        &groups,
    ));
    rules.extend(from_each(
        SecurityGroupRule::ingress("ICMP HealthCheck (cilium)").icmp(ICMP_ECHO_REQUEST),
        &groups,
    ));
    rules
}

/// Permit Calico traffic on the control plane
pub fn control_plane_calico(self_group: &str, worker_group: &str) -> Vec<SecurityGroupRule> {
    calico(self_group, worker_group)
}

/// Permit Cilium traffic on the control plane
pub fn control_plane_cilium(self_group: &str, worker_group: &str) -> Vec<SecurityGroupRule> {
    cilium(self_group, worker_group)
}

/// Permit kubelet traffic on workers
pub fn worker_common(self_group: &str, control_plane_group: &str) -> Vec<SecurityGroupRule> {
    from_each(
        SecurityGroupRule::ingress("Kubelet API").tcp(KUBELET_PORT, KUBELET_PORT),
        &[self_group, control_plane_group],
    )
}

/// Permit Calico traffic on workers
pub fn worker_calico(self_group: &str, control_plane_group: &str) -> Vec<SecurityGroupRule> {
    calico(self_group, control_plane_group)
}

/// Permit Cilium traffic on workers
pub fn worker_cilium(self_group: &str, control_plane_group: &str) -> Vec<SecurityGroupRule> {
    cilium(self_group, control_plane_group)
}

/// Permit SSH to control plane nodes from the bastion
pub fn control_plane_ssh(bastion_group: &str) -> Vec<SecurityGroupRule> {
    vec![SecurityGroupRule::ingress("SSH")
        .tcp(SSH_PORT, SSH_PORT)
        .from_group(bastion_group)]
}

/// Permit SSH to workers from the bastion
pub fn worker_ssh(bastion_group: &str) -> Vec<SecurityGroupRule> {
    control_plane_ssh(bastion_group)
}

/// Permit SSH to the bastion from anywhere
pub fn bastion_ssh() -> Vec<SecurityGroupRule> {
    vec![SecurityGroupRule::ingress("SSH").tcp(SSH_PORT, SSH_PORT)]
}

/// Allow traffic to the Kubernetes API, including from outside the cluster
///
/// With no CIDRs the rule has no remote prefix and admits any source. Each
/// CIDR's rule takes the ethertype of its address family.
pub fn control_plane_https(allowed_cidrs: &[String]) -> Vec<SecurityGroupRule> {
    let rule = SecurityGroupRule::ingress("Kubernetes API")
        .tcp(KUBERNETES_API_SERVER_PORT, KUBERNETES_API_SERVER_PORT);

    if allowed_cidrs.is_empty() {
        return vec![rule];
    }
    allowed_cidrs
        .iter()
        .map(|cidr| rule.clone().from_prefix(cidr.as_str()))
        .collect()
}

/// Allow traffic to NodePort services, including from outside the cluster
pub fn worker_node_port() -> Vec<SecurityGroupRule> {
    vec![SecurityGroupRule::ingress("Node Port Services").tcp(NODE_PORT_RANGE.0, NODE_PORT_RANGE.1)]
}

/// Permit all ingress to the control plane from the cluster groups
pub fn control_plane_allow_all(self_group: &str, worker_group: &str) -> Vec<SecurityGroupRule> {
    from_each(
        SecurityGroupRule::ingress("In-cluster Ingress"),
        &[self_group, worker_group],
    )
}

/// Permit all ingress to workers from the cluster groups
pub fn worker_allow_all(self_group: &str, control_plane_group: &str) -> Vec<SecurityGroupRule> {
    from_each(
        SecurityGroupRule::ingress("In-cluster Ingress"),
        &[self_group, control_plane_group],
    )
}

/// Control plane rules for every supported CNI
pub fn control_plane_general(self_group: &str, worker_group: &str) -> Vec<SecurityGroupRule> {
    control_plane_rules(self_group, worker_group, &CniPlugin::ALL)
}

/// Worker rules for every supported CNI
pub fn worker_general(self_group: &str, control_plane_group: &str) -> Vec<SecurityGroupRule> {
    worker_rules(self_group, control_plane_group, &CniPlugin::ALL)
}

/// Control plane common rules plus the selected CNI groups
///
/// CNI groups follow `cni` order; repeated plugins are added once.
pub fn control_plane_rules(
    self_group: &str,
    worker_group: &str,
    cni: &[CniPlugin],
) -> Vec<SecurityGroupRule> {
    let mut rules = control_plane_common(self_group, worker_group);
    for plugin in dedup(cni) {
        rules.extend(match plugin {
            CniPlugin::Calico => control_plane_calico(self_group, worker_group),
            CniPlugin::Cilium => control_plane_cilium(self_group, worker_group),
        });
    }
    rules
}

/// Worker common rules plus the selected CNI groups
pub fn worker_rules(
    self_group: &str,
    control_plane_group: &str,
    cni: &[CniPlugin],
) -> Vec<SecurityGroupRule> {
    let mut rules = worker_common(self_group, control_plane_group);
    for plugin in dedup(cni) {
        rules.extend(match plugin {
            CniPlugin::Calico => worker_calico(self_group, control_plane_group),
            CniPlugin::Cilium => worker_cilium(self_group, control_plane_group),
        });
    }
    rules
}

fn dedup(cni: &[CniPlugin]) -> Vec<CniPlugin> {
    let mut seen = Vec::with_capacity(cni.len());
    for plugin in cni {
        if !seen.contains(plugin) {
            seen.push(*plugin);
        }
    }
    seen
}
