//! Client certificate cache.

use std::sync::Arc;

use dashmap::DashMap;

use crate::auth::store::{normalize_hint, ClientCertificate, CredentialStore};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;

/// Append-only cache of client certificates, backed by a `CredentialStore`.
///
/// Every lookup hands out a fresh copy of the cached certificate, so callers
/// can never mutate what other requests see.
pub struct CertificateCache {
    store: Arc<dyn CredentialStore>,
    entries: DashMap<String, ClientCertificate>,
}

impl CertificateCache {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
        }
    }

    /// Find a certificate by thumbprint or subject CN.
    ///
    /// A miss reads the store on the blocking pool.
    pub async fn get(&self, hint: &str) -> GatewayResult<ClientCertificate> {
        let key = normalize_hint(hint);
        if key.is_empty() {
            return Err(GatewayError::Configuration(
                "empty client certificate lookup".to_string(),
            ));
        }

        if let Some(entry) = self.entries.get(&key) {
            metrics::record_certificate_cache("hit");
            return Ok(entry.value().clone());
        }
        metrics::record_certificate_cache("miss");

        let store = self.store.clone();
        let lookup = hint.to_string();
        let found = tokio::task::spawn_blocking(move || store.find(&lookup))
            .await
            .map_err(|e| {
                GatewayError::Configuration(format!("certificate store lookup aborted: {}", e))
            })?
            .map_err(|e| GatewayError::Configuration(e.to_string()))?
            .ok_or_else(|| {
                GatewayError::Configuration(format!(
                    "Cannot find client cert with '{}' thumbprint or subject name!",
                    hint.trim()
                ))
            })?;

        tracing::info!(
            hint = %hint.trim(),
            thumbprint = %found.thumbprint(),
            "Client certificate cached"
        );

        // A racing lookup may have inserted first; keep whichever landed.
        let entry = self.entries.entry(key).or_insert(found);
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
