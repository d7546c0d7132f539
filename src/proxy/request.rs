//! Inbound request decomposition.

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request};

use crate::routing::QueryParams;

/// A request on its way to a stamp. Each stage may rewrite it in place.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl ForwardRequest {
    pub fn from_parts(parts: Parts, body: Body) -> Self {
        let Parts {
            method,
            uri,
            mut headers,
            ..
        } = parts;
        let body = outbound_body(&mut headers, body);

        Self {
            method,
            path: uri.path().to_string(),
            query: QueryParams::parse(uri.query()),
            headers,
            body,
        }
    }
}

impl From<Request<Body>> for ForwardRequest {
    fn from(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }
}

/// Decide whether a body goes out at all.
///
/// The server always hands over a body object, even for a bodiless GET. Only
/// a body announced with a content type is forwarded; otherwise the stale
/// `Content-Length` goes too.
pub fn outbound_body(headers: &mut HeaderMap, body: Body) -> Option<Body> {
    if headers.contains_key(CONTENT_TYPE) {
        Some(body)
    } else {
        headers.remove(CONTENT_LENGTH);
        None
    }
}
