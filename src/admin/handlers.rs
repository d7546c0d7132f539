use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub default_stamp: Option<String>,
    pub legacy_mode: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheSummary {
    pub certificates: usize,
    pub tokens: usize,
    pub transports: usize,
}

impl CacheSummary {
    fn of(state: &AppState) -> Self {
        Self {
            certificates: state.certificates.len(),
            tokens: state.tokens.len(),
            transports: state.transports.len(),
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let routing = &state.config.routing;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        default_stamp: Some(routing.default_stamp.clone()).filter(|s| !s.is_empty()),
        legacy_mode: routing.legacy_mode,
    })
}

pub async fn get_caches(State(state): State<AppState>) -> Json<CacheSummary> {
    Json(CacheSummary::of(&state))
}

/// Clear every cache and report what was dropped.
pub async fn clear_caches(State(state): State<AppState>) -> Json<CacheSummary> {
    let cleared = CacheSummary::of(&state);
    state.clear_caches();
    tracing::info!(
        certificates = cleared.certificates,
        tokens = cleared.tokens,
        transports = cleared.transports,
        "Caches cleared"
    );
    Json(cleared)
}
