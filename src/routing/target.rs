//! Stamp target resolution.
//!
//! # Responsibilities
//! - Turn a raw stamp value (absolute URI, `host:port`, host, short name) into a base URI
//! - Apply the precedence: `stamp` query → `x-geoproxy-stamp` header → default stamp → legacy referrer
//! - Strip the routing inputs so they never reach the stamp
//!
//! # Design Decisions
//! - The default stamp is resolved once, at construction
//! - Legacy referrer hosts compare case-insensitively
//! - Empty stamp values count as absent

use std::collections::HashMap;
use std::fmt;

use axum::http::{HeaderMap, HeaderName};
use url::Url;

use crate::config::RoutingConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::routing::query::QueryParams;

/// Query parameter naming the target stamp.
pub const STAMP_PARAM: &str = "stamp";
/// Header naming the target stamp.
pub const STAMP_HEADER: HeaderName = HeaderName::from_static("x-geoproxy-stamp");
/// Header carrying the caller principal in legacy deployments.
pub const PRINCIPAL_HEADER: HeaderName = HeaderName::from_static("x-ms-client-principal-id");

const REFERRER_ALT_HEADER: HeaderName = HeaderName::from_static("referrer");

/// A resolved backend base URI. Immutable once computed for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StampTarget(String);

impl StampTarget {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self(base_uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join the original request path onto the base URI.
    pub fn join(&self, path: &str, query: Option<&str>) -> GatewayResult<Url> {
        let base = Url::parse(&self.0).map_err(|e| {
            GatewayError::Validation(format!("stamp uri '{}' is invalid: {}", self.0, e))
        })?;
        // Appended rather than `Url::join`ed: a `//host` path must not replace the authority.
        let mut url = base;
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(query);
        Ok(url)
    }
}

impl fmt::Display for StampTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a raw stamp value into a base URI.
///
/// Absolute URIs are used verbatim; `host:port` becomes `https://host:port/`;
/// a dotted host gets the stamp port; anything else is a short name under `domain`.
pub fn stamp_to_uri(raw: &str, domain: &str, port: u16) -> String {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw) {
        // `host:port` also parses, as scheme `host` with no authority.
        if url.has_host() {
            return raw.to_string();
        }
    }
    if raw.contains(':') {
        format!("https://{}/", raw)
    } else if raw.contains('.') {
        format!("https://{}:{}/", raw, port)
    } else {
        format!("https://{}.{}:{}/", raw, domain, port)
    }
}

/// Computes the stamp base URI for each request.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    stamp_domain: String,
    stamp_port: u16,
    default_target: Option<StampTarget>,
    legacy: Option<LegacyRouting>,
}

#[derive(Debug, Clone)]
struct LegacyRouting {
    referrers: HashMap<String, StampTarget>,
    require_principal: bool,
}

impl TargetResolver {
    pub fn from_config(config: &RoutingConfig) -> Self {
        let default_target = Some(config.default_stamp.trim())
            .filter(|stamp| !stamp.is_empty())
            .map(|stamp| {
                StampTarget::new(stamp_to_uri(stamp, &config.stamp_domain, config.stamp_port))
            });

        let legacy = config.legacy_mode.then(|| LegacyRouting {
            referrers: config
                .legacy_referrers
                .iter()
                .map(|(host, uri)| (host.to_ascii_lowercase(), StampTarget::new(uri.clone())))
                .collect(),
            require_principal: config.require_principal,
        });

        Self {
            stamp_domain: config.stamp_domain.clone(),
            stamp_port: config.stamp_port,
            default_target,
            legacy,
        }
    }

    /// Resolve the target for one request, removing the stamp inputs from it.
    pub fn resolve(
        &self,
        query: &mut QueryParams,
        headers: &mut HeaderMap,
    ) -> GatewayResult<StampTarget> {
        if let Some(legacy) = &self.legacy {
            if legacy.require_principal && !headers.contains_key(&PRINCIPAL_HEADER) {
                return Err(GatewayError::Validation(format!(
                    "{} header is missing!",
                    PRINCIPAL_HEADER
                )));
            }
        }

        let from_query = query.take(STAMP_PARAM).filter(|s| !s.trim().is_empty());
        let from_header = headers
            .remove(&STAMP_HEADER)
            .and_then(|value| match value.to_str() {
                Ok(raw) => Some(raw.to_string()),
                Err(_) => {
                    tracing::warn!(value = ?value, "Ignoring non-ASCII {} header", STAMP_HEADER);
                    None
                }
            })
            .filter(|s| !s.trim().is_empty());

        if let Some(raw) = from_query.or(from_header) {
            return Ok(StampTarget::new(stamp_to_uri(
                &raw,
                &self.stamp_domain,
                self.stamp_port,
            )));
        }

        if let Some(target) = &self.default_target {
            return Ok(target.clone());
        }

        match &self.legacy {
            Some(legacy) => legacy.resolve(headers),
            None => Err(GatewayError::Validation(format!(
                "no stamp specified: set the '{}' query parameter or the '{}' header",
                STAMP_PARAM, STAMP_HEADER
            ))),
        }
    }
}

impl LegacyRouting {
    fn resolve(&self, headers: &HeaderMap) -> GatewayResult<StampTarget> {
        let referrer = headers
            .get(axum::http::header::REFERER)
            .or_else(|| headers.get(&REFERRER_ALT_HEADER))
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| GatewayError::Validation("referer header is missing!".to_string()))?;

        let host = Url::parse(referrer)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));

        host.and_then(|host| self.referrers.get(&host).cloned())
            .ok_or_else(|| {
                GatewayError::Validation(format!("referer '{}' is invalid!", referrer))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn resolver(default_stamp: &str, legacy_mode: bool) -> TargetResolver {
        let config = RoutingConfig {
            default_stamp: default_stamp.to_string(),
            legacy_mode,
            ..RoutingConfig::default()
        };
        TargetResolver::from_config(&config)
    }

    #[test]
    fn test_stamp_to_uri_forms() {
        assert_eq!(stamp_to_uri("10.0.0.1:8080", "cloudapp.net", 444), "https://10.0.0.1:8080/");
        assert_eq!(
            stamp_to_uri("foo.example.com", "cloudapp.net", 444),
            "https://foo.example.com:444/"
        );
        assert_eq!(
            stamp_to_uri("myshortname", "cloudapp.net", 444),
            "https://myshortname.cloudapp.net:444/"
        );
        assert_eq!(
            stamp_to_uri("http://127.0.0.1:9000/base/", "cloudapp.net", 444),
            "http://127.0.0.1:9000/base/"
        );
        assert_eq!(stamp_to_uri("localhost:8443", "cloudapp.net", 444), "https://localhost:8443/");
    }

    #[test]
    fn test_query_beats_header_and_both_are_stripped() {
        let resolver = resolver("", false);
        let mut query = QueryParams::parse(Some("stamp=fromquery&api-version=1"));
        let mut headers = HeaderMap::new();
        headers.insert(STAMP_HEADER, HeaderValue::from_static("fromheader"));

        let target = resolver.resolve(&mut query, &mut headers).unwrap();
        assert_eq!(target.as_str(), "https://fromquery.cloudapp.net:444/");
        assert!(!query.contains("stamp"));
        assert!(!headers.contains_key(&STAMP_HEADER));
    }

    #[test]
    fn test_header_then_default() {
        let resolver = resolver("waws-prod-blu-001", false);

        let mut query = QueryParams::parse(Some("stamp="));
        let mut headers = HeaderMap::new();
        headers.insert(STAMP_HEADER, HeaderValue::from_static("stamp.example.com"));
        let target = resolver.resolve(&mut query, &mut headers).unwrap();
        assert_eq!(target.as_str(), "https://stamp.example.com:444/");

        let mut query = QueryParams::parse(None);
        let mut headers = HeaderMap::new();
        let target = resolver.resolve(&mut query, &mut headers).unwrap();
        assert_eq!(target.as_str(), "https://waws-prod-blu-001.cloudapp.net:444/");
    }

    #[test]
    fn test_undecodable_header_is_stripped_and_skipped() {
        let resolver = resolver("waws-prod-blu-001", false);
        let mut query = QueryParams::parse(None);
        let mut headers = HeaderMap::new();
        headers.insert(STAMP_HEADER, HeaderValue::from_bytes(b"st\xe4mp").unwrap());

        let target = resolver.resolve(&mut query, &mut headers).unwrap();
        assert_eq!(target.as_str(), "https://waws-prod-blu-001.cloudapp.net:444/");
        assert!(!headers.contains_key(&STAMP_HEADER));
    }

    #[test]
    fn test_no_signal_is_validation_error() {
        let resolver = resolver("", false);
        let err = resolver
            .resolve(&mut QueryParams::default(), &mut HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn test_legacy_referrer_mapping() {
        let resolver = resolver("", true);
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("user@example.com"));
        headers.insert(
            axum::http::header::REFERER,
            HeaderValue::from_static("https://API-CURRENT.resources.windows-int.net/subscriptions"),
        );

        let target = resolver
            .resolve(&mut QueryParams::default(), &mut headers)
            .unwrap();
        assert_eq!(
            target.as_str(),
            "https://geomaster.antdir0.antares-test.windows-int.net:444/"
        );
    }

    #[test]
    fn test_legacy_failures() {
        let resolver = resolver("", true);

        // Principal missing.
        let err = resolver
            .resolve(&mut QueryParams::default(), &mut HeaderMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("x-ms-client-principal-id"));

        // Referrer missing.
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("p"));
        let err = resolver
            .resolve(&mut QueryParams::default(), &mut headers)
            .unwrap_err();
        assert!(err.to_string().contains("referer header is missing"));

        // Unknown host, via the alternate spelling.
        headers.insert("referrer", HeaderValue::from_static("https://unknown.example.com/"));
        let err = resolver
            .resolve(&mut QueryParams::default(), &mut headers)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert!(err.to_string().contains("is invalid"));
    }

    #[test]
    fn test_join_preserves_path_and_query() {
        let target = StampTarget::new("https://stamp.cloudapp.net:444/");
        let url = target
            .join("/subscriptions/abc/providers", Some("api-version=2020-01-01"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://stamp.cloudapp.net:444/subscriptions/abc/providers?api-version=2020-01-01"
        );
    }

    #[test]
    fn test_join_never_replaces_authority() {
        let target = StampTarget::new("https://geomaster.antares.net:444/");
        let url = target.join("//evil.example.com/x", None).unwrap();
        assert_eq!(url.host_str(), Some("geomaster.antares.net"));
        assert_eq!(url.path(), "/evil.example.com/x");

        let url = StampTarget::new("https://stamp.net:444").join("/", None).unwrap();
        assert_eq!(url.as_str(), "https://stamp.net:444/");
    }

    #[tokio::test]
    async fn test_concurrent_resolution_is_isolated() {
        let resolver = std::sync::Arc::new(resolver("", false));
        let mut handles = Vec::new();
        for i in 0..32 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                let stamp = format!("stamp{}", i);
                let mut query = QueryParams::parse(Some(&format!("stamp={}", stamp)));
                let target = resolver.resolve(&mut query, &mut HeaderMap::new()).unwrap();
                (stamp, target)
            }));
        }
        for handle in handles {
            let (stamp, target) = handle.await.unwrap();
            assert_eq!(target.as_str(), format!("https://{}.cloudapp.net:444/", stamp));
        }
    }
}
