//! Error types for the CLI

use capo_common::telemetry::TelemetryError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    OpenStack(#[from] capo_common::Error),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server not found: {id}")]
    ServerNotFound { id: String },

    #[error("validation error: {message}")]
    Validation { message: String },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}
