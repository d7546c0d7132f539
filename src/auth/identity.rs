//! Identity exchange client.
//!
//! # Responsibilities
//! - Trade the shared secret for a subscription-scoped bearer token
//! - Serve repeat requests from the `TokenCache`
//!
//! # Design Decisions
//! - No retry: a non-success status fails the request that needed the token
//! - The endpoint is local to the host, so the call uses the plain transport

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::auth::token::TokenCache;
use crate::config::IdentityConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;

/// Token response body. App Service style endpoints use `access_token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
}

/// Performs the local token-issuance call.
pub struct IdentityClient {
    http: reqwest::Client,
    endpoint: Option<Url>,
    secret: String,
    secret_header: HeaderName,
    api_version: String,
    resource_template: String,
    cache: Arc<TokenCache>,
}

impl IdentityClient {
    pub fn new(
        config: &IdentityConfig,
        http: reqwest::Client,
        cache: Arc<TokenCache>,
    ) -> GatewayResult<Self> {
        let endpoint = if config.endpoint.is_empty() {
            None
        } else {
            Some(Url::parse(&config.endpoint).map_err(|e| {
                GatewayError::Configuration(format!(
                    "identity endpoint '{}' is invalid: {}",
                    config.endpoint, e
                ))
            })?)
        };
        let secret_header = HeaderName::from_bytes(config.secret_header.as_bytes()).map_err(|e| {
            GatewayError::Configuration(format!(
                "identity secret header '{}' is invalid: {}",
                config.secret_header, e
            ))
        })?;

        Ok(Self {
            http,
            endpoint,
            secret: config.secret.clone(),
            secret_header,
            api_version: config.api_version.clone(),
            resource_template: config.resource_template.clone(),
            cache,
        })
    }

    /// Bearer token for `subscription`, from cache when still live.
    pub async fn get_token(&self, subscription: Uuid) -> GatewayResult<String> {
        self.cache
            .get_or_fetch(subscription, || self.exchange(subscription))
            .await
    }

    /// Resource URI requested for a subscription.
    pub fn resource_for(&self, subscription: Uuid) -> String {
        self.resource_template
            .replace("{subscription}", &subscription.to_string())
    }

    async fn exchange(&self, subscription: Uuid) -> GatewayResult<String> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            GatewayError::Configuration("identity endpoint is not configured".to_string())
        })?;
        let failed = |reason: String| {
            metrics::record_identity_exchange("failure");
            GatewayError::TokenAcquisition {
                subscription,
                reason,
            }
        };

        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("resource", &self.resource_for(subscription))
            .append_pair("api-version", &self.api_version);

        tracing::debug!(subscription = %subscription, endpoint = %endpoint, "Requesting token");

        let response = self
            .http
            .get(url)
            .header(self.secret_header.clone(), self.secret.as_str())
            .send()
            .await
            .map_err(|e| failed(format!("identity endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(subscription = %subscription, status = %status, "Identity endpoint refused token request");
            return Err(failed(format!(
                "identity endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("identity response unreadable: {}", e)))?;

        // Never cache a token that could not be sent.
        if HeaderValue::from_str(&body.access_token).is_err() {
            return Err(failed(
                "identity endpoint issued a token that is not a valid header value".to_string(),
            ));
        }

        metrics::record_identity_exchange("success");
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;

    #[test]
    fn test_resource_template_substitution() {
        let client = IdentityClient::new(
            &IdentityConfig::default(),
            reqwest::Client::new(),
            Arc::new(TokenCache::default()),
        )
        .unwrap();
        let subscription = Uuid::parse_str("2f1b2e8c-53f0-4b9a-9a43-0c3c3f0c9e11").unwrap();
        assert_eq!(
            client.resource_for(subscription),
            "https://management.core.windows.net/subscriptions/2f1b2e8c-53f0-4b9a-9a43-0c3c3f0c9e11"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_configuration_error() {
        let client = IdentityClient::new(
            &IdentityConfig::default(),
            reqwest::Client::new(),
            Arc::new(TokenCache::default()),
        )
        .unwrap();
        let err = client.get_token(Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn test_invalid_secret_header_is_rejected() {
        let config = IdentityConfig {
            secret_header: "bad header".into(),
            ..IdentityConfig::default()
        };
        let result = IdentityClient::new(&config, reqwest::Client::new(), Arc::new(TokenCache::default()));
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }
}
