//! Credential precedence.
//!
//! Decides which credential mechanism a request asks for, from the query and
//! headers alone. No I/O happens here; `provider.rs` turns the decision into a
//! concrete credential.

use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::auth::store::ClientCertificate;
use crate::error::{GatewayError, GatewayResult};
use crate::routing::query::QueryParams;

pub const BASIC_AUTH_PARAM: &str = "basicauth";
pub const CERT_AUTH_PARAM: &str = "certauth";
pub const STAMP_SUB_HEADER: HeaderName = HeaderName::from_static("x-geoproxy-stampsub");
pub const STAMP_CERT_HEADER: HeaderName = HeaderName::from_static("x-geoproxy-stampcert");

/// The credential mechanism a request asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRequest {
    /// Static basic-auth secret from configuration.
    BasicAuth,
    /// Bearer token for a subscription, via identity exchange.
    BearerToken(Uuid),
    /// Client certificate by thumbprint or subject name; `None` means the stamp's default.
    Certificate(Option<String>),
}

/// Pick the credential for a request and strip every credential input from it.
///
/// Order: `basicauth` query flag, then a well-formed `x-geoproxy-stampsub`
/// header, then `x-geoproxy-stampcert`, then the `certauth` query hint.
pub fn select_credential(query: &mut QueryParams, headers: &mut HeaderMap) -> CredentialRequest {
    let basic = query.take(BASIC_AUTH_PARAM).filter(|v| !v.is_empty());
    let cert_param = query.take(CERT_AUTH_PARAM);
    let subscription = headers.remove(&STAMP_SUB_HEADER);
    let cert_header = headers.remove(&STAMP_CERT_HEADER);

    if basic.is_some() {
        return CredentialRequest::BasicAuth;
    }

    if let Some(value) = subscription {
        match value.to_str().ok().and_then(|s| Uuid::parse_str(s.trim()).ok()) {
            Some(id) => return CredentialRequest::BearerToken(id),
            None => tracing::warn!(
                value = ?value,
                "Ignoring malformed {} header",
                STAMP_SUB_HEADER
            ),
        }
    }

    if let Some(value) = cert_header {
        if let Ok(hint) = value.to_str() {
            return CredentialRequest::Certificate(non_empty(hint));
        }
        tracing::warn!("Ignoring non-ASCII {} header", STAMP_CERT_HEADER);
    }

    CredentialRequest::Certificate(cert_param.as_deref().and_then(non_empty))
}

fn non_empty(hint: &str) -> Option<String> {
    let hint = hint.trim();
    (!hint.is_empty()).then(|| hint.to_string())
}

/// Static basic-auth secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicSecret {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicSecret")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Exactly one credential attached to an outbound call.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSelection {
    Certificate(ClientCertificate),
    BearerToken { subscription: Uuid, token: String },
    BasicAuth(BasicSecret),
}

impl CredentialSelection {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSelection::Certificate(_) => "certificate",
            CredentialSelection::BearerToken { .. } => "bearer",
            CredentialSelection::BasicAuth(_) => "basic",
        }
    }

    /// `Authorization` header value, for the header-based mechanisms.
    ///
    /// A value that cannot travel as a header fails the request rather than
    /// letting it go out without its credential.
    pub fn authorization(&self) -> GatewayResult<Option<HeaderValue>> {
        let mut value = match self {
            CredentialSelection::Certificate(_) => return Ok(None),
            CredentialSelection::BearerToken {
                subscription,
                token,
            } => HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                GatewayError::TokenAcquisition {
                    subscription: *subscription,
                    reason: "issued token is not a valid header value".to_string(),
                }
            })?,
            CredentialSelection::BasicAuth(secret) => HeaderValue::from_str(&format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", secret.username, secret.password))
            ))
            .map_err(|_| {
                GatewayError::Configuration(
                    "basic auth secret is not a valid header value".to_string(),
                )
            })?,
        };
        value.set_sensitive(true);
        Ok(Some(value))
    }
}

impl fmt::Debug for CredentialSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSelection::Certificate(certificate) => {
                f.debug_tuple("Certificate").field(certificate).finish()
            }
            CredentialSelection::BearerToken { subscription, .. } => f
                .debug_struct("BearerToken")
                .field("subscription", subscription)
                .field("token", &"[REDACTED]")
                .finish(),
            CredentialSelection::BasicAuth(secret) => f.debug_tuple("BasicAuth").field(secret).finish(),
        }
    }
}
