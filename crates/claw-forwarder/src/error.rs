//! Error types for the claw-forwarder crate.

use thiserror::Error;

/// Errors that can occur while forwarding alarms.
#[derive(Debug, Error)]
pub enum ForwarderError {
    /// A filter failed to compile or evaluate.
    #[error("filter error: {0}")]
    Filter(#[from] claw_filter::FilterError),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    Config {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// No async runtime was available to start the forwarder on.
    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    /// The delivery client could not be built.
    #[error("client error: {0}")]
    Client(#[from] claw_incident::ClientError),

    /// No forwarder is registered under the given pid.
    #[error("service not found: {pid}")]
    ServiceNotFound {
        /// The pid that was not found.
        pid: String,
    },

    /// The forwarder was shut down and no longer accepts alarms.
    #[error("forwarder {pid} is shut down")]
    ShutDown {
        /// The pid of the stopped forwarder.
        pid: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ForwarderError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ForwarderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ForwarderError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("invalid TOML: {err}"))
    }
}

/// Result type for forwarder operations.
pub type Result<T> = std::result::Result<T, ForwarderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_config() {
        let err = ForwarderError::config("routing_key cannot be empty");
        assert_eq!(
            err.to_string(),
            "invalid configuration: routing_key cannot be empty"
        );
    }

    #[test]
    fn error_display_filter() {
        let err = ForwarderError::from(claw_filter::FilterError::UnknownIdentifier(
            "alarm.nope".to_string(),
        ));
        assert_eq!(err.to_string(), "filter error: unknown identifier: alarm.nope");
    }

    #[test]
    fn error_display_service_not_found() {
        let err = ForwarderError::ServiceNotFound {
            pid: "pagerduty-ops".to_string(),
        };
        assert_eq!(err.to_string(), "service not found: pagerduty-ops");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ForwarderError::from(json_err);
        assert!(matches!(err, ForwarderError::Serialization(_)));
    }

    #[test]
    fn error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err = ForwarderError::from(toml_err);
        assert!(err.to_string().starts_with("invalid configuration: invalid TOML"));
    }
}
