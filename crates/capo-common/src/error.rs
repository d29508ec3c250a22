//! Error types for the OpenStack infrastructure services
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context the failing call had at hand (the
//! security group being reconciled, the HTTP status returned, the resource
//! kind being decoded) so that callers can log or surface it without
//! re-parsing the message.

use thiserror::Error;

/// Main error type for OpenStack service operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure talking to an OpenStack endpoint
    #[error("request error: {source}")]
    Request {
        /// The underlying reqwest error
        #[from]
        source: reqwest::Error,
    },

    /// OpenStack API returned a non-success status
    #[error("openstack api error [{status}]: {message}")]
    Http {
        /// HTTP status code returned by the API
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Compute (Nova) service error
    #[error("compute error: {message}")]
    Compute {
        /// Description of what failed
        message: String,
        /// Whether this error is retryable
        retryable: bool,
    },

    /// Networking (Neutron) service error
    #[error("networking error for security group {group}: {message}")]
    Networking {
        /// Name of the security group being reconciled
        group: String,
        /// Description of what failed
        message: String,
        /// Whether this error is retryable
        retryable: bool,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being decoded (if known)
        kind: Option<String>,
    },

    /// Validation error for caller-supplied input
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field (e.g., "compute_endpoint")
        field: Option<String>,
    },

    /// Client configuration could not be loaded
    #[error("config error: {message}")]
    Config {
        /// Description of what failed
        message: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl Error {
    /// Create an HTTP status error
    pub fn http(status: u16, msg: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: msg.into(),
        }
    }

    /// Create a compute error
    ///
    /// Wraps an underlying failure with the operation that was attempted,
    /// inheriting retryability from the wrapped error.
    pub fn compute(msg: impl Into<String>, cause: &Error) -> Self {
        Self::Compute {
            message: format!("{}: {}", msg.into(), cause),
            retryable: cause.is_retryable(),
        }
    }

    /// Create a networking error for a named security group
    pub fn networking_for(group: impl Into<String>, msg: impl Into<String>, cause: &Error) -> Self {
        Self::Networking {
            group: group.into(),
            message: format!("{}: {}", msg.into(), cause),
            retryable: cause.is_retryable(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Transport errors, 5xx and 429 responses are retryable. Validation,
    /// config and serialization errors require a fix and are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request { source } => !source.is_builder() && !source.is_decode(),
            Error::Http { status, .. } => *status >= 500 || *status == 429,
            Error::Compute { retryable, .. } => *retryable,
            Error::Networking { retryable, .. } => *retryable,
            Error::Serialization { .. } => false,
            Error::Validation { .. } => false,
            Error::Config { .. } => false,
        }
    }

    /// True when the API reported the resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Http { status, .. } => *status == 404,
            Error::Request { source } => source.status().map(|s| s.as_u16()) == Some(404),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(500, true)]
    #[case(503, true)]
    #[case(429, true)]
    #[case(400, false)]
    #[case(401, false)]
    #[case(404, false)]
    #[case(409, false)]
    fn http_retryability_follows_status(#[case] status: u16, #[case] retryable: bool) {
        let err = Error::http(status, "response body");
        assert!(err.to_string().contains(&format!("[{}]", status)));
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn not_found_is_detected_from_status() {
        assert!(Error::http(404, "server not found").is_not_found());
        assert!(!Error::http(403, "forbidden").is_not_found());
        assert!(!Error::validation("bad").is_not_found());
    }

    #[test]
    fn compute_wraps_cause_and_inherits_retryability() {
        let cause = Error::http(500, "nova exploded");
        let err = Error::compute("error extracting availability zone list", &cause);

        let msg = err.to_string();
        assert!(msg.starts_with("compute error: error extracting availability zone list"));
        assert!(msg.contains("nova exploded"));
        assert!(err.is_retryable());

        let err = Error::compute("error fetching server", &Error::http(401, "unauthorized"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn networking_errors_name_the_group() {
        let cause = Error::http(409, "conflict");
        let err = Error::networking_for(
            "k8s-cluster-default-dev-secgroup-worker",
            "failed to create rule",
            &cause,
        );
        match &err {
            Error::Networking {
                group, retryable, ..
            } => {
                assert_eq!(group, "k8s-cluster-default-dev-secgroup-worker");
                assert!(!retryable);
            }
            other => panic!("Expected Networking variant, got {:?}", other),
        }
        assert!(err.to_string().contains("failed to create rule"));
        assert!(err.to_string().contains("conflict"));
    }

    #[test]
    fn validation_and_config_are_permanent() {
        let err = Error::validation_for_field("compute_endpoint", "must not be empty");
        match &err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("compute_endpoint"));
            }
            _ => panic!("Expected Validation variant"),
        }
        assert!(!err.is_retryable());
        assert!(!Error::config("missing file").is_retryable());
        assert!(!Error::serialization_for_kind("Server", "bad json").is_retryable());
    }

    #[test]
    fn serde_json_errors_convert() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not-json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
