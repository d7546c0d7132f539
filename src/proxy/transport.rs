//! Outbound HTTP clients.
//!
//! # Responsibilities
//! - Own one plain client plus one client per client certificate
//! - Apply timeouts and upstream TLS policy to every client
//!
//! # Design Decisions
//! - A client certificate is bound to a `reqwest::Client` at build time, so
//!   clients are cached by thumbprint and reused across requests
//! - Basic-auth and bearer calls use the plain client, which never presents
//!   a certificate

use std::time::Duration;

use dashmap::DashMap;

use crate::auth::{ClientCertificate, CredentialSelection};
use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::{GatewayError, GatewayResult};

/// Settings shared by every outbound client.
#[derive(Debug, Clone)]
struct TransportSettings {
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    idle_timeout: Duration,
    accept_invalid_certs: bool,
}

/// Pool of outbound clients keyed by the credential they carry.
pub struct TransportPool {
    settings: TransportSettings,
    plain: reqwest::Client,
    with_certificate: DashMap<String, reqwest::Client>,
}

impl TransportPool {
    pub fn new(timeouts: &TimeoutConfig, upstream: &UpstreamConfig) -> GatewayResult<Self> {
        let settings = TransportSettings {
            connect_timeout: Duration::from_secs(timeouts.connect_secs),
            request_timeout: (timeouts.request_secs > 0)
                .then(|| Duration::from_secs(timeouts.request_secs)),
            idle_timeout: Duration::from_secs(timeouts.idle_secs),
            accept_invalid_certs: upstream.accept_invalid_certs,
        };

        if settings.accept_invalid_certs {
            tracing::warn!("Stamp certificate validation is disabled");
        }

        let plain = build(&settings, None)?;
        Ok(Self {
            settings,
            plain,
            with_certificate: DashMap::new(),
        })
    }

    /// Client without a client certificate.
    pub fn plain(&self) -> reqwest::Client {
        self.plain.clone()
    }

    /// Client that carries `selection` at the TLS layer, if it is a certificate.
    pub fn for_selection(&self, selection: &CredentialSelection) -> GatewayResult<reqwest::Client> {
        match selection {
            CredentialSelection::Certificate(certificate) => self.for_certificate(certificate),
            CredentialSelection::BearerToken { .. } | CredentialSelection::BasicAuth(_) => {
                Ok(self.plain())
            }
        }
    }

    pub fn for_certificate(&self, certificate: &ClientCertificate) -> GatewayResult<reqwest::Client> {
        if let Some(client) = self.with_certificate.get(certificate.thumbprint()) {
            return Ok(client.value().clone());
        }

        let client = build(&self.settings, Some(certificate))?;
        tracing::debug!(thumbprint = %certificate.thumbprint(), "Client certificate transport created");
        Ok(self
            .with_certificate
            .entry(certificate.thumbprint().to_string())
            .or_insert(client)
            .value()
            .clone())
    }

    /// Number of certificate-bound clients.
    pub fn len(&self) -> usize {
        self.with_certificate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.with_certificate.is_empty()
    }

    pub fn clear(&self) {
        self.with_certificate.clear();
    }
}

fn build(
    settings: &TransportSettings,
    certificate: Option<&ClientCertificate>,
) -> GatewayResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(settings.connect_timeout)
        .pool_idle_timeout(settings.idle_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(settings.accept_invalid_certs);

    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(certificate) = certificate {
        let identity = reqwest::Identity::from_pem(certificate.pem()).map_err(|e| {
            GatewayError::Configuration(format!(
                "client certificate '{}' is unusable: {}",
                certificate.thumbprint(),
                e
            ))
        })?;
        builder = builder.identity(identity);
    }

    builder.build().map_err(|e| {
        GatewayError::Configuration(format!("failed to build outbound transport: {}", e))
    })
}
