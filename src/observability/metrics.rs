//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, cache efficiency, token exchange)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `geoproxy_requests_total` (counter): requests by method, status
//! - `geoproxy_request_duration_seconds` (histogram): latency by method
//! - `geoproxy_token_cache_total` (counter): bearer token lookups by hit/miss
//! - `geoproxy_certificate_cache_total` (counter): certificate lookups by hit/miss
//! - `geoproxy_identity_exchange_total` (counter): token exchanges by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels stay low-cardinality: no stamp URIs or subscriptions

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished gateway request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "geoproxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("geoproxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_token_cache(result: &'static str) {
    counter!("geoproxy_token_cache_total", "result" => result).increment(1);
}

pub fn record_certificate_cache(result: &'static str) {
    counter!("geoproxy_certificate_cache_total", "result" => result).increment(1);
}

pub fn record_identity_exchange(outcome: &'static str) {
    counter!("geoproxy_identity_exchange_total", "outcome" => outcome).increment(1);
}
