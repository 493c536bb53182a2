//! Error types for the claw-incident crate.

use thiserror::Error;

/// Errors that can occur while building or delivering incident events.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured events endpoint is not usable.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint that was rejected.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP request could not be completed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    #[error("request failed with response code: {status} and body: {body}")]
    Rejected {
        /// HTTP status code returned by the service.
        status: u16,
        /// Response body, or `(empty)` when none could be read.
        body: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The client was closed and no longer accepts events.
    #[error("client is closed")]
    Closed,
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for incident client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
