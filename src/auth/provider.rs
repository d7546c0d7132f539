//! Credential production.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::certificates::CertificateCache;
use crate::auth::identity::IdentityClient;
use crate::auth::selection::{BasicSecret, CredentialRequest, CredentialSelection};
use crate::config::{BasicAuthConfig, CertificateConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::routing::target::StampTarget;

/// Turns a `CredentialRequest` into the credential attached to the outbound call.
pub struct CredentialProvider {
    certificates: Arc<CertificateCache>,
    identity: Arc<IdentityClient>,
    basic: Option<BasicSecret>,
    default_thumbprint: Option<String>,
    stamp_thumbprints: HashMap<String, String>,
}

impl CredentialProvider {
    pub fn new(
        certificates: Arc<CertificateCache>,
        identity: Arc<IdentityClient>,
        basic: &BasicAuthConfig,
        thumbprints: &CertificateConfig,
    ) -> Self {
        let basic = basic.is_configured().then(|| BasicSecret {
            username: basic.username.clone(),
            password: basic.password.clone(),
        });

        Self {
            certificates,
            identity,
            basic,
            default_thumbprint: thumbprints
                .default_thumbprint
                .clone()
                .filter(|t| !t.trim().is_empty()),
            stamp_thumbprints: thumbprints
                .stamp_thumbprints
                .iter()
                .map(|(uri, thumbprint)| (uri.to_ascii_lowercase(), thumbprint.clone()))
                .collect(),
        }
    }

    /// Produce the credential for `request` against `target`.
    pub async fn provide(
        &self,
        request: CredentialRequest,
        target: &StampTarget,
    ) -> GatewayResult<CredentialSelection> {
        match request {
            CredentialRequest::BasicAuth => {
                let secret = self.basic.clone().ok_or_else(|| {
                    GatewayError::Configuration("basic auth secret is not configured".to_string())
                })?;
                Ok(CredentialSelection::BasicAuth(secret))
            }
            CredentialRequest::BearerToken(subscription) => {
                let token = self.identity.get_token(subscription).await?;
                Ok(CredentialSelection::BearerToken {
                    subscription,
                    token,
                })
            }
            CredentialRequest::Certificate(Some(hint)) => {
                Ok(CredentialSelection::Certificate(self.certificates.get(&hint).await?))
            }
            CredentialRequest::Certificate(None) => {
                let thumbprint = self.default_thumbprint_for(target)?;
                Ok(CredentialSelection::Certificate(self.certificates.get(thumbprint).await?))
            }
        }
    }

    /// Configured thumbprint for the stamp's class: a dedicated entry, else the default.
    pub fn default_thumbprint_for(&self, target: &StampTarget) -> GatewayResult<&str> {
        self.stamp_thumbprints
            .get(&target.as_str().to_ascii_lowercase())
            .or(self.default_thumbprint.as_ref())
            .map(String::as_str)
            .ok_or_else(|| {
                GatewayError::Configuration(format!(
                    "no client certificate thumbprint configured for '{}'",
                    target
                ))
            })
    }
}
