//! REST implementation of the OpenStack clients
//!
//! Speaks the Nova v2.1 and Neutron v2.0 JSON APIs with a pre-issued token.
//! Every response body is wrapped in a single-key envelope
//! (`{"server": {...}}`, `{"security_groups": [...]}`), decoded here.

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use capo_common::api::{ObservedSecurityGroupRule, SecurityGroup, SecurityGroupRule};
use capo_common::config::ClientConfig;
use capo_common::{Error, Result, AUTH_TOKEN_HEADER};

use super::{ComputeClient, NetworkingClient};
use crate::compute::{AvailabilityZone, ServerExt};

#[derive(Deserialize)]
struct AvailabilityZoneList {
    #[serde(rename = "availabilityZoneInfo")]
    zones: Vec<AvailabilityZone>,
}

#[derive(Deserialize)]
struct ServerEnvelope {
    server: ServerExt,
}

#[derive(Deserialize)]
struct SecurityGroupList {
    security_groups: Vec<SecurityGroup>,
}

#[derive(Deserialize)]
struct SecurityGroupEnvelope {
    security_group: SecurityGroup,
}

#[derive(Deserialize)]
struct SecurityGroupRuleList {
    security_group_rules: Vec<ObservedSecurityGroupRule>,
}

#[derive(Deserialize)]
struct SecurityGroupRuleEnvelope {
    security_group_rule: ObservedSecurityGroupRule,
}

#[derive(Serialize)]
struct CreateSecurityGroup<'a> {
    security_group: NewSecurityGroup<'a>,
}

#[derive(Serialize)]
struct NewSecurityGroup<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct CreateSecurityGroupRule<'a> {
    security_group_rule: NewSecurityGroupRule<'a>,
}

#[derive(Serialize)]
struct NewSecurityGroupRule<'a> {
    security_group_id: &'a str,
    #[serde(flatten)]
    rule: &'a SecurityGroupRule,
}

/// Join an endpoint root and an API path with exactly one slash
fn join(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Nova and Neutron client over `reqwest`
#[derive(Clone, Debug)]
pub struct OpenStackHttpClient {
    http: reqwest::Client,
    compute_endpoint: String,
    network_endpoint: String,
    auth_token: String,
}

impl OpenStackHttpClient {
    /// Create a client from validated configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            compute_endpoint: config.compute_endpoint.clone(),
            network_endpoint: config.network_endpoint.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn compute_url(&self, path: &str) -> String {
        join(&self.compute_endpoint, path)
    }

    fn network_url(&self, path: &str) -> String {
        join(&self.network_endpoint, path)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, &self.auth_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Turn non-success statuses into `Error::Http` carrying the body
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reason = status.canonical_reason().unwrap_or("request failed");
        let message = match response.text().await {
            Ok(body) if !body.is_empty() => body,
            Ok(_) => reason.to_string(),
            Err(e) => {
                debug!(
                    status = status.as_u16(),
                    error = %e,
                    "failed to read error response body"
                );
                reason.to_string()
            }
        };
        Err(Error::http(status.as_u16(), message))
    }

    async fn decode<T: DeserializeOwned>(response: Response, kind: &str) -> Result<T> {
        let bytes = Self::check(response).await?.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, kind: &str) -> Result<T> {
        debug!(url = %url, "GET");
        let response = self.request(Method::GET, url).send().await?;
        Self::decode(response, kind).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        kind: &str,
    ) -> Result<T> {
        debug!(url = %url, "POST");
        let response = self.request(Method::POST, url).json(body).send().await?;
        Self::decode(response, kind).await
    }

    async fn delete(&self, url: &str) -> Result<()> {
        debug!(url = %url, "DELETE");
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ComputeClient for OpenStackHttpClient {
    async fn list_availability_zones(&self) -> Result<Vec<AvailabilityZone>> {
        let list: AvailabilityZoneList = self
            .get(&self.compute_url("os-availability-zone"), "AvailabilityZone")
            .await?;
        Ok(list.zones)
    }

    async fn get_server(&self, server_id: &str) -> Result<ServerExt> {
        let envelope: ServerEnvelope = self
            .get(&self.compute_url(&format!("servers/{}", server_id)), "Server")
            .await?;
        Ok(envelope.server)
    }
}

#[async_trait]
impl NetworkingClient for OpenStackHttpClient {
    async fn list_security_groups(&self, name: &str) -> Result<Vec<SecurityGroup>> {
        let url = self.network_url("v2.0/security-groups");
        debug!(url = %url, name = %name, "GET");
        let response = self
            .request(Method::GET, &url)
            .query(&[("name", name)])
            .send()
            .await?;
        let list: SecurityGroupList = Self::decode(response, "SecurityGroup").await?;
        Ok(list.security_groups)
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SecurityGroup> {
        let body = CreateSecurityGroup {
            security_group: NewSecurityGroup { name, description },
        };
        let envelope: SecurityGroupEnvelope = self
            .post(
                &self.network_url("v2.0/security-groups"),
                &body,
                "SecurityGroup",
            )
            .await?;
        Ok(envelope.security_group)
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.delete(&self.network_url(&format!("v2.0/security-groups/{}", group_id)))
            .await
    }

    async fn list_security_group_rules(
        &self,
        group_id: &str,
    ) -> Result<Vec<ObservedSecurityGroupRule>> {
        let url = self.network_url("v2.0/security-group-rules");
        debug!(url = %url, security_group_id = %group_id, "GET");
        let response = self
            .request(Method::GET, &url)
            .query(&[("security_group_id", group_id)])
            .send()
            .await?;
        let list: SecurityGroupRuleList = Self::decode(response, "SecurityGroupRule").await?;
        Ok(list.security_group_rules)
    }

    async fn create_security_group_rule(
        &self,
        group_id: &str,
        rule: &SecurityGroupRule,
    ) -> Result<ObservedSecurityGroupRule> {
        let body = CreateSecurityGroupRule {
            security_group_rule: NewSecurityGroupRule {
                security_group_id: group_id,
                rule,
            },
        };
        let envelope: SecurityGroupRuleEnvelope = self
            .post(
                &self.network_url("v2.0/security-group-rules"),
                &body,
                "SecurityGroupRule",
            )
            .await?;
        Ok(envelope.security_group_rule)
    }

    async fn delete_security_group_rule(&self, rule_id: &str) -> Result<()> {
        self.delete(&self.network_url(&format!("v2.0/security-group-rules/{}", rule_id)))
            .await
    }
}
