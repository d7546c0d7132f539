//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs before any listener binds
//! - Validate value ranges (token TTL > 0, suffix non-empty)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{GatewayConfig, VersionPolicyKind};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.routing.stamp_domain.trim().is_empty() {
        errors.push(ValidationError::new("routing.stamp_domain", "must not be empty"));
    }

    for (host, uri) in &config.routing.legacy_referrers {
        if !is_absolute(uri) {
            errors.push(ValidationError::new(
                format!("routing.legacy_referrers.{}", host),
                format!("'{}' is not an absolute URI", uri),
            ));
        }
    }

    if config.api_version.suffix.is_empty() {
        errors.push(ValidationError::new("api_version.suffix", "must not be empty"));
    }
    if config.api_version.policy == VersionPolicyKind::Strict
        && config.api_version.min_segments == Some(0)
    {
        errors.push(ValidationError::new(
            "api_version.min_segments",
            "must be at least 1 when set",
        ));
    }

    if !config.identity.endpoint.is_empty() && !is_absolute(&config.identity.endpoint) {
        errors.push(ValidationError::new(
            "identity.endpoint",
            format!("'{}' is not an absolute URL", config.identity.endpoint),
        ));
    }
    if config.identity.token_ttl_secs == 0 {
        errors.push(ValidationError::new("identity.token_ttl_secs", "must be greater than 0"));
    }
    if !config.identity.resource_template.contains("{subscription}") {
        errors.push(ValidationError::new(
            "identity.resource_template",
            "must contain the {subscription} placeholder",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Absolute URL with a host; `host:port` strings parse as a bare scheme and are rejected.
fn is_absolute(uri: &str) -> bool {
    Url::parse(uri).map(|url| url.has_host()).unwrap_or(false)
}
