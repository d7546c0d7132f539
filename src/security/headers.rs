//! Hop-by-hop header sanitization.
//!
//! # Responsibilities
//! - Remove every header the `Connection` header names
//! - Always remove `Connection` and `Transfer-Encoding`
//!
//! # Design Decisions
//! - `Connection` tokens with the internal prefix are kept: platform headers
//!   such as `x-ms-request-id` are listed there by some front-ends but must
//!   reach the other side
//! - Token matching is case-insensitive (header names are)

use axum::http::header::{CONNECTION, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName};

/// Connection tokens starting with this prefix are never stripped.
pub const INTERNAL_HEADER_PREFIX: &str = "x-ms-";

/// Strip hop-by-hop headers in place. Applies to requests and responses alike.
pub fn sanitize_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty() && !is_internal(token))
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);
}

fn is_internal(token: &str) -> bool {
    token
        .get(..INTERNAL_HEADER_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(INTERNAL_HEADER_PREFIX))
}
