//! `api-version` validation and rewriting.

use crate::config::{ApiVersionConfig, VersionPolicyKind};
use crate::error::{GatewayError, GatewayResult};
use crate::routing::query::QueryParams;

pub const API_VERSION_PARAM: &str = "api-version";

/// How strictly the private-preview suffix is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Suffix required; optionally a minimum number of `-` separated segments.
    Strict { min_segments: Option<usize> },
    /// Suffix stripped when present, value passed through otherwise.
    Lenient,
}

/// Validates and rewrites the `api-version` query parameter.
#[derive(Debug, Clone)]
pub struct VersionNormalizer {
    policy: VersionPolicy,
    suffix: String,
}

impl VersionNormalizer {
    pub fn new(policy: VersionPolicy, suffix: impl Into<String>) -> Self {
        Self {
            policy,
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &ApiVersionConfig) -> Self {
        let policy = match config.policy {
            VersionPolicyKind::Strict => VersionPolicy::Strict {
                min_segments: config.min_segments,
            },
            VersionPolicyKind::Lenient => VersionPolicy::Lenient,
        };
        Self::new(policy, config.suffix.clone())
    }

    /// Normalize a raw `api-version` value.
    pub fn normalize(&self, value: Option<&str>) -> GatewayResult<String> {
        let value = value.filter(|v| !v.is_empty()).ok_or_else(|| {
            GatewayError::Validation(format!("{} query string is missing!", API_VERSION_PARAM))
        })?;

        let stripped = self.strip_suffix(value);

        if let VersionPolicy::Strict { min_segments } = self.policy {
            if let Some(min) = min_segments {
                if value.split('-').count() < min {
                    return Err(GatewayError::Validation(format!(
                        "{} query string must contain at least {} parts!",
                        API_VERSION_PARAM, min
                    )));
                }
            }
            if stripped.is_none() {
                return Err(GatewayError::Validation(format!(
                    "{} query string must end with '{}'!",
                    API_VERSION_PARAM, self.suffix
                )));
            }
        }

        Ok(stripped.unwrap_or(value).to_string())
    }

    /// Rewrite the `api-version` parameter of `query` in place.
    pub fn apply(&self, query: &mut QueryParams) -> GatewayResult<()> {
        let normalized = self.normalize(query.get(API_VERSION_PARAM))?;
        query.set(API_VERSION_PARAM, normalized);
        Ok(())
    }

    /// Value without the suffix, if it ends with it (ASCII case-insensitive).
    fn strip_suffix<'a>(&self, value: &'a str) -> Option<&'a str> {
        let start = value.len().checked_sub(self.suffix.len())?;
        let tail = value.get(start..)?;
        tail.eq_ignore_ascii_case(&self.suffix)
            .then(|| &value[..start])
    }
}
