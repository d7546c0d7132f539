//! Bearer token caching keyed by subscription.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::observability::metrics;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// A cached token and the instant it stops being served.
#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A thread-safe cache of bearer tokens.
///
/// Lookups for different subscriptions never contend on the same lock. Two
/// concurrent misses for one subscription both fetch; the last insert wins.
#[derive(Debug)]
pub struct TokenCache {
    entries: DashMap<Uuid, CachedToken>,
    ttl: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

impl TokenCache {
    /// Create a cache whose entries live for `ttl`. A zero TTL is raised to one millisecond
    /// so an entry never expires at the instant it is issued.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: ttl.max(Duration::from_millis(1)),
        }
    }

    /// Return the live token for `subscription`, or run `fetch` and cache its result.
    ///
    /// After a successful fetch every expired entry is swept, not only this one.
    pub async fn get_or_fetch<F, Fut>(&self, subscription: Uuid, fetch: F) -> GatewayResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<String>>,
    {
        if let Some(token) = self.live(&subscription) {
            metrics::record_token_cache("hit");
            return Ok(token);
        }
        metrics::record_token_cache("miss");

        // No guard is held across the fetch.
        let token = fetch().await?;
        let issued_at = Instant::now();
        self.entries.insert(
            subscription,
            CachedToken {
                token: token.clone(),
                expires_at: issued_at + self.ttl,
            },
        );
        self.sweep();

        tracing::debug!(subscription = %subscription, ttl_secs = self.ttl.as_secs(), "Token cached");
        Ok(token)
    }

    fn live(&self, subscription: &Uuid) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(subscription)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.token.clone())
    }

    /// Drop every expired entry.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
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
