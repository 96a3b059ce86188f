//! Error taxonomy for the alert-proposal engine

use thiserror::Error;

/// Errors surfaced by the engine, its clients and the reconciler
#[derive(Debug, Error)]
pub enum AlertError {
    /// Required configuration is missing; fatal before any detector runs
    #[error("missing required configuration: {}", .missing.join(", "))]
    Configuration { missing: Vec<String> },

    /// Configuration is present but unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The remote service answered with a non-success status
    #[error("request to {endpoint} failed with status {status}: {body}")]
    Request {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The remote service could not be reached or its body could not be read
    #[error("transport failure calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// A JSON-RPC peer answered with an error object
    #[error("{endpoint} returned JSON-RPC error {code}: {message}")]
    Rpc {
        endpoint: String,
        code: i64,
        message: String,
    },

    /// Oracle text did not contain the expected JSON object
    #[error("malformed oracle response: {0}")]
    MalformedOracleResponse(String),

    /// A single suggestion could not be applied to the backend
    #[error("failed to apply alert '{name}': {reason}")]
    Reconciliation { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AlertError {
    /// True for failures talking to a remote service
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Request { .. } | Self::Transport { .. } | Self::Rpc { .. }
        )
    }
}

impl From<config::ConfigError> for AlertError {
    fn from(e: config::ConfigError) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_missing_key() {
        let err = AlertError::Configuration {
            missing: vec!["SENTRY_AUTH_TOKEN".to_string(), "ANTHROPIC_API_KEY".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing required configuration: SENTRY_AUTH_TOKEN, ANTHROPIC_API_KEY"
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn test_request_error_is_transport() {
        let err = AlertError::Request {
            endpoint: "organizations/acme/events/".to_string(),
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.is_transport());
        assert!(err.to_string().contains("502"));
    }
}
