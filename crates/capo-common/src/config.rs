//! OpenStack client configuration
//!
//! The services never authenticate on their own: they are handed a Keystone
//! token that was already issued, plus the Nova and Neutron endpoints from
//! the service catalog. Configuration comes from a YAML file or from the
//! usual `OS_*` environment variables.
//!
//! Environment access goes through [`EnvSource`] so tests can supply values
//! without touching process-global state.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, DEFAULT_REQUEST_TIMEOUT_SECS};

const ENV_COMPUTE_ENDPOINT: &str = "OS_COMPUTE_ENDPOINT";
const ENV_NETWORK_ENDPOINT: &str = "OS_NETWORK_ENDPOINT";
const ENV_AUTH_TOKEN: &str = "OS_AUTH_TOKEN";
const ENV_REQUEST_TIMEOUT: &str = "OS_REQUEST_TIMEOUT";

/// Trait for reading configuration from the environment
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Look up a variable, `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Default implementation that reads process environment variables
#[derive(Clone, Debug, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Endpoints and credentials for the OpenStack APIs
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Nova endpoint including the project path (e.g. `https://nova:8774/v2.1`)
    pub compute_endpoint: String,

    /// Neutron endpoint root (e.g. `https://neutron:9696`)
    pub network_endpoint: String,

    /// Pre-issued Keystone token
    pub auth_token: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl ClientConfig {
    /// Build config from `OS_*` variables
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let required = |key: &str| {
            env.var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::config(format!("{} is not set", key)))
        };

        let request_timeout_secs = match env.var(ENV_REQUEST_TIMEOUT) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::config(format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_REQUEST_TIMEOUT, raw
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let config = Self {
            compute_endpoint: required(ENV_COMPUTE_ENDPOINT)?,
            network_endpoint: required(ENV_NETWORK_ENDPOINT)?,
            auth_token: required(ENV_AUTH_TOKEN)?,
            request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&data)
            .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check endpoints and token are usable
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("compute_endpoint", &self.compute_endpoint),
            ("network_endpoint", &self.network_endpoint),
        ] {
            if value.is_empty() {
                return Err(Error::validation_for_field(field, "must not be empty"));
            }
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(Error::validation_for_field(
                    field,
                    format!("'{}' is not an http(s) URL", value),
                ));
            }
        }
        if self.auth_token.is_empty() {
            return Err(Error::validation_for_field(
                "auth_token",
                "must not be empty",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::validation_for_field(
                "request_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_with(vars: &'static [(&'static str, &'static str)]) -> MockEnvSource {
        let mut mock = MockEnvSource::new();
        mock.expect_var().returning(move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        });
        mock
    }

    #[test]
    fn from_env_reads_all_variables() {
        let env = env_with(&[
            ("OS_COMPUTE_ENDPOINT", "https://nova.example:8774/v2.1"),
            ("OS_NETWORK_ENDPOINT", "https://neutron.example:9696"),
            ("OS_AUTH_TOKEN", "gAAAAAB-token"),
            ("OS_REQUEST_TIMEOUT", "12"),
        ]);

        let config = ClientConfig::from_env(&env).expect("config should load");
        assert_eq!(config.compute_endpoint, "https://nova.example:8774/v2.1");
        assert_eq!(config.network_endpoint, "https://neutron.example:9696");
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn from_env_defaults_timeout() {
        let env = env_with(&[
            ("OS_COMPUTE_ENDPOINT", "http://nova:8774/v2.1"),
            ("OS_NETWORK_ENDPOINT", "http://neutron:9696"),
            ("OS_AUTH_TOKEN", "t"),
        ]);

        let config = ClientConfig::from_env(&env).expect("config should load");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn from_env_reports_missing_token() {
        let env = env_with(&[
            ("OS_COMPUTE_ENDPOINT", "http://nova:8774/v2.1"),
            ("OS_NETWORK_ENDPOINT", "http://neutron:9696"),
        ]);

        let err = ClientConfig::from_env(&env).expect_err("token is required");
        assert!(err.to_string().contains("OS_AUTH_TOKEN"));
    }

    #[test]
    fn from_env_rejects_bad_timeout() {
        let env = env_with(&[
            ("OS_COMPUTE_ENDPOINT", "http://nova:8774/v2.1"),
            ("OS_NETWORK_ENDPOINT", "http://neutron:9696"),
            ("OS_AUTH_TOKEN", "t"),
            ("OS_REQUEST_TIMEOUT", "soon"),
        ]);

        let err = ClientConfig::from_env(&env).expect_err("timeout must be numeric");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn validate_rejects_non_http_endpoint() {
        let config = ClientConfig {
            compute_endpoint: "nova:8774".to_string(),
            network_endpoint: "http://neutron:9696".to_string(),
            auth_token: "t".to_string(),
            request_timeout_secs: 5,
        };
        match config.validate() {
            Err(Error::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("compute_endpoint"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn from_yaml_file_loads_config() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "computeEndpoint: https://nova:8774/v2.1\n\
             networkEndpoint: https://neutron:9696\n\
             authToken: abc"
        )
        .expect("write config");

        let config = ClientConfig::from_yaml_file(file.path()).expect("config should load");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn from_yaml_file_reports_missing_file() {
        let err = ClientConfig::from_yaml_file("/nonexistent/capo.yaml")
            .expect_err("missing file should fail");
        assert!(err.to_string().contains("failed to read"));
    }
}
