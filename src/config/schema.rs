//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Stamp resolution settings.
    pub routing: RoutingConfig,

    /// `api-version` normalization policy.
    pub api_version: ApiVersionConfig,

    /// Client certificate store and thumbprint settings.
    pub certificates: CertificateConfig,

    /// Static secret for `basicauth` requests.
    pub basic_auth: BasicAuthConfig,

    /// Local identity exchange endpoint.
    pub identity: IdentityConfig,

    /// Transport timeouts for outbound calls.
    pub timeouts: TimeoutConfig,

    /// Outbound TLS behaviour.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Stamp resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Stamp used when the request names none. Empty means "no default".
    pub default_stamp: String,

    /// Domain appended to short stamp names.
    pub stamp_domain: String,

    /// Port used for short names and bare host names.
    pub stamp_port: u16,

    /// Fall back to referrer-host mapping when nothing else names a stamp.
    pub legacy_mode: bool,

    /// Require `x-ms-client-principal-id` on every request in legacy mode.
    pub require_principal: bool,

    /// Caller host (lowercase) -> backend base URI, used in legacy mode.
    pub legacy_referrers: HashMap<String, String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let mut legacy_referrers = HashMap::new();
        legacy_referrers.insert(
            "api-current.resources.windows-int.net".to_string(),
            "https://geomaster.antdir0.antares-test.windows-int.net:444/".to_string(),
        );
        legacy_referrers.insert(
            "api-dogfood.resources.windows-int.net".to_string(),
            "https://geomaster.ant-intapp-admin.windows-int.net:444/".to_string(),
        );

        Self {
            default_stamp: String::new(),
            stamp_domain: "cloudapp.net".to_string(),
            stamp_port: 444,
            legacy_mode: false,
            require_principal: true,
            legacy_referrers,
        }
    }
}

/// Which rule the version normalizer enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicyKind {
    /// The suffix is mandatory.
    Strict,
    /// The suffix is stripped when present, otherwise the value passes through.
    Lenient,
}

/// `api-version` normalization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiVersionConfig {
    pub policy: VersionPolicyKind,

    /// Private-preview suffix, matched case-insensitively.
    pub suffix: String,

    /// Minimum hyphen-delimited segments (strict policy only).
    pub min_segments: Option<usize>,
}

impl Default for ApiVersionConfig {
    fn default() -> Self {
        Self {
            policy: VersionPolicyKind::Strict,
            suffix: "-privatepreview".to_string(),
            min_segments: Some(4),
        }
    }
}

/// Client certificate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Directory of PEM files, each holding a certificate chain and its key.
    pub store_path: String,

    /// Thumbprint used for stamps without a dedicated entry.
    pub default_thumbprint: Option<String>,

    /// Base URI -> thumbprint for stamps that need their own certificate.
    pub stamp_thumbprints: HashMap<String, String>,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            store_path: "certs".to_string(),
            default_thumbprint: None,
            stamp_thumbprints: HashMap::new(),
        }
    }
}

/// Static basic-auth credential.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

impl BasicAuthConfig {
    /// True when a credential has been configured.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Identity exchange endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Local token endpoint. Empty disables bearer-token requests.
    pub endpoint: String,

    /// Shared secret sent with every exchange.
    pub secret: String,

    /// Header carrying the shared secret.
    pub secret_header: String,

    /// `api-version` sent to the identity endpoint.
    pub api_version: String,

    /// Resource requested for a subscription; `{subscription}` is substituted.
    pub resource_template: String,

    /// Lifetime of a cached token, in seconds.
    pub token_ttl_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            secret: String::new(),
            secret_header: "secret".to_string(),
            api_version: "2017-09-01".to_string(),
            resource_template: "https://management.core.windows.net/subscriptions/{subscription}"
                .to_string(),
            token_ttl_secs: 3600,
        }
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("endpoint", &self.endpoint)
            .field("secret", &"[REDACTED]")
            .field("secret_header", &self.secret_header)
            .field("api_version", &self.api_version)
            .field("resource_template", &self.resource_template)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds. 0 disables it.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 100,
            idle_secs: 60,
        }
    }
}

/// Outbound TLS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Skip backend certificate validation (stamps commonly use self-signed certificates).
    pub accept_invalid_certs: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
