//! Common types for the OpenStack CAPI services: API values, errors,
//! client configuration and telemetry

#![deny(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Prefix shared by every managed security group name
pub const SECURITY_GROUP_PREFIX: &str = "k8s-cluster";

/// Header carrying the Keystone token on every API request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Default per-request timeout for OpenStack API calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Kubernetes API server port opened on the control plane group
pub const KUBERNETES_API_SERVER_PORT: u16 = 6443;

/// Inclusive NodePort service range opened on the worker group
pub const NODE_PORT_RANGE: (u16, u16) = (30000, 32767);
