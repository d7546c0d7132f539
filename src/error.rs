//! Gateway error taxonomy.
//!
//! Every pipeline stage returns `Result<_, GatewayError>`. The HTTP boundary
//! (`http::response`) is the only place that turns one into a response.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while dispatching a request to a stamp.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound request is missing or carries a malformed routing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required setting is absent or a configured credential cannot be found.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The outbound call to the stamp failed before a response arrived.
    #[error("{method} {uri} failed")]
    Transport {
        method: String,
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The identity endpoint refused or failed to issue a token.
    #[error("token acquisition for subscription {subscription} failed: {reason}")]
    TokenAcquisition { subscription: Uuid, reason: String },
}

impl GatewayError {
    /// Short machine label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Configuration(_) => "configuration",
            GatewayError::Transport { .. } => "transport",
            GatewayError::TokenAcquisition { .. } => "token_acquisition",
        }
    }

    /// Full error detail: this error followed by its source chain.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        detail
    }
}

/// Result alias used across the pipeline.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_without_source() {
        let err = GatewayError::Validation("api-version query string is missing!".into());
        assert_eq!(err.detail(), "validation failed: api-version query string is missing!");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_token_error_names_subscription() {
        let subscription = Uuid::nil();
        let err = GatewayError::TokenAcquisition {
            subscription,
            reason: "identity endpoint returned 401 Unauthorized".into(),
        };
        assert!(err.detail().contains(&subscription.to_string()));
        assert!(err.detail().contains("401"));
    }
}
