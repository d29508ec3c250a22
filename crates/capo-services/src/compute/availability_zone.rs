//! Availability zones and the failure domains derived from them

use serde::{Deserialize, Serialize};
use tracing::debug;

use capo_common::api::{FailureDomainSpec, FailureDomains};
use capo_common::{Error, Result};

use super::ComputeService;

/// Availability zone as listed by Nova's `os-availability-zone`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityZone {
    /// Zone name
    pub zone_name: String,

    /// Whether the zone accepts new servers
    pub zone_state: ZoneState,

    /// Hosts and their services, present only for admin callers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<serde_json::Value>,
}

/// Availability state of a zone
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ZoneState {
    /// True when the zone is usable
    pub available: bool,
}

impl ComputeService {
    /// List the availability zones visible to the project
    pub async fn get_availability_zones(&self) -> Result<Vec<AvailabilityZone>> {
        let zones = self
            .client
            .list_availability_zones()
            .await
            .map_err(|e| Error::compute("error extracting availability zone list", &e))?;
        debug!(count = zones.len(), "listed availability zones");
        Ok(zones)
    }
}

/// Map availability zones to Cluster API failure domains
///
/// Unavailable zones are skipped. A zone is eligible for control plane
/// machines when `control_plane_zones` is empty or names it.
pub fn failure_domains(
    zones: &[AvailabilityZone],
    control_plane_zones: &[String],
) -> FailureDomains {
    zones
        .iter()
        .filter(|zone| zone.zone_state.available)
        .map(|zone| {
            let spec = if control_plane_zones.is_empty()
                || control_plane_zones.contains(&zone.zone_name)
            {
                FailureDomainSpec::control_plane()
            } else {
                FailureDomainSpec::worker_only()
            };
            (zone.zone_name.clone(), spec)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::MockComputeClient;

    fn zone(name: &str, available: bool) -> AvailabilityZone {
        AvailabilityZone {
            zone_name: name.to_string(),
            zone_state: ZoneState { available },
            hosts: None,
        }
    }

    #[tokio::test]
    async fn get_availability_zones_returns_client_list() {
        let mut client = MockComputeClient::new();
        client
            .expect_list_availability_zones()
            .times(1)
            .returning(|| Ok(vec![zone("nova", true), zone("az-2", false)]));

        let service = ComputeService::new(Arc::new(client));
        let zones = service
            .get_availability_zones()
            .await
            .expect("listing should succeed");

        assert_eq!(zones, vec![zone("nova", true), zone("az-2", false)]);
    }

    #[tokio::test]
    async fn get_availability_zones_wraps_errors() {
        let mut client = MockComputeClient::new();
        client
            .expect_list_availability_zones()
            .returning(|| Err(Error::http(503, "service unavailable")));

        let service = ComputeService::new(Arc::new(client));
        let err = service
            .get_availability_zones()
            .await
            .expect_err("listing should fail");

        assert!(err
            .to_string()
            .contains("error extracting availability zone list"));
        assert!(err.to_string().contains("service unavailable"));
        assert!(err.is_retryable());
    }

    #[test]
    fn failure_domains_skip_unavailable_zones() {
        let zones = vec![zone("az-1", true), zone("az-2", false), zone("az-3", true)];

        let domains = failure_domains(&zones, &[]);

        assert_eq!(domains.keys().collect::<Vec<_>>(), ["az-1", "az-3"]);
        assert!(domains.values().all(|d| d.control_plane));
    }

    #[test]
    fn failure_domains_restrict_control_plane_zones() {
        let zones = vec![zone("az-1", true), zone("az-2", true)];

        let domains = failure_domains(&zones, &["az-2".to_string()]);

        assert_eq!(domains["az-1"], FailureDomainSpec::worker_only());
        assert_eq!(domains["az-2"], FailureDomainSpec::control_plane());
    }

    #[test]
    fn zone_decodes_admin_hosts() {
        let parsed: AvailabilityZone = serde_json::from_str(
            r#"{"zoneName": "nova", "zoneState": {"available": true},
                "hosts": {"compute-1": {"nova-compute": {"active": true}}}}"#,
        )
        .expect("zone should decode");

        assert_eq!(parsed.zone_name, "nova");
        assert!(parsed.hosts.is_some());
    }
}
