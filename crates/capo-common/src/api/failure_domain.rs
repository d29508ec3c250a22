//! Cluster API failure domains
//!
//! OpenStack availability zones surface to Cluster API as failure domains.
//! The shape matches `FailureDomainSpec` in the CAPI core types.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Failure domain keyed by availability zone name
pub type FailureDomains = BTreeMap<String, FailureDomainSpec>;

/// Placement properties of one failure domain
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomainSpec {
    /// Whether control plane machines may be placed in this domain
    #[serde(default)]
    pub control_plane: bool,

    /// Free-form attributes describing the domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl FailureDomainSpec {
    /// Domain eligible for control plane machines
    pub fn control_plane() -> Self {
        Self {
            control_plane: true,
            attributes: None,
        }
    }

    /// Domain restricted to worker machines
    pub fn worker_only() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_capi_shape() {
        let json = serde_json::to_value(FailureDomainSpec::control_plane())
            .expect("failure domain should serialize");
        assert_eq!(json, serde_json::json!({ "controlPlane": true }));

        let json = serde_json::to_value(FailureDomainSpec::worker_only())
            .expect("failure domain should serialize");
        assert_eq!(json, serde_json::json!({ "controlPlane": false }));
    }
}
