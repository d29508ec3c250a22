//! Compute service entry point

use std::sync::Arc;

use tracing::debug;

use capo_common::{Error, Result};

use super::InstanceStatus;
use crate::client::ComputeClient;

/// Nova-backed queries used by the cluster and machine controllers
#[derive(Clone)]
pub struct ComputeService {
    pub(super) client: Arc<dyn ComputeClient>,
}

impl ComputeService {
    /// Create a service over the given client
    pub fn new(client: Arc<dyn ComputeClient>) -> Self {
        Self { client }
    }

    /// Look up a server, returning `None` if it does not exist
    pub async fn get_instance_status(&self, server_id: &str) -> Result<Option<InstanceStatus>> {
        match self.client.get_server(server_id).await {
            Ok(server) => Ok(Some(InstanceStatus::new(server))),
            Err(e) if e.is_not_found() => {
                debug!(server = %server_id, "server not found");
                Ok(None)
            }
            Err(e) => Err(Error::compute(
                format!("error getting server {}", server_id),
                &e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockComputeClient;
    use crate::compute::{InstanceState, ServerExt};

    #[tokio::test]
    async fn existing_server_is_returned() {
        let mut client = MockComputeClient::new();
        client
            .expect_get_server()
            .withf(|id: &str| id == "srv-1")
            .returning(|id| {
                Ok(ServerExt {
                    id: id.to_string(),
                    status: "ACTIVE".to_string(),
                    ..Default::default()
                })
            });

        let service = ComputeService::new(Arc::new(client));
        let status = service
            .get_instance_status("srv-1")
            .await
            .expect("lookup should succeed")
            .expect("server should exist");

        assert_eq!(status.id(), "srv-1");
        assert_eq!(status.state(), InstanceState::Active);
    }

    #[tokio::test]
    async fn missing_server_is_none() {
        let mut client = MockComputeClient::new();
        client
            .expect_get_server()
            .returning(|_| Err(Error::http(404, "Instance could not be found")));

        let service = ComputeService::new(Arc::new(client));
        let status = service
            .get_instance_status("gone")
            .await
            .expect("404 is not an error");

        assert!(status.is_none());
    }

    #[tokio::test]
    async fn other_errors_are_wrapped() {
        let mut client = MockComputeClient::new();
        client
            .expect_get_server()
            .returning(|_| Err(Error::http(500, "boom")));

        let service = ComputeService::new(Arc::new(client));
        let err = service
            .get_instance_status("srv-1")
            .await
            .expect_err("500 should fail");

        assert!(matches!(err, Error::Compute { retryable: true, .. }));
        assert!(err.to_string().contains("srv-1"));
    }
}
