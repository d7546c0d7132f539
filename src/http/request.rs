//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header shared with callers and stamps
//! - Read the request ID for log fields
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A caller-supplied ID is kept and forwarded to the stamp unchanged

use axum::http::{HeaderMap, HeaderName};

/// Correlation header set on every request and echoed on every response.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID carried in `headers`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
