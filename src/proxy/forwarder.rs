//! Request forwarding to stamps.
//!
//! # Responsibilities
//! - Run the per-request pipeline from target resolution to response
//! - Attach exactly one credential to the outbound call
//! - Stream the stamp's response back with sanitized headers
//!
//! # Design Decisions
//! - `prepare` does every rewrite, `send` does the I/O; tests drive them separately
//! - The caller's `Host` header is dropped so the transport derives it from the target

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::{HeaderMap, Method, Response};
use url::Url;

use crate::auth::{select_credential, CredentialProvider, CredentialSelection};
use crate::error::{GatewayError, GatewayResult};
use crate::proxy::request::ForwardRequest;
use crate::proxy::transport::TransportPool;
use crate::routing::{StampTarget, TargetResolver, VersionNormalizer};
use crate::security::sanitize_hop_by_hop;

/// A fully rewritten request, ready to go on the wire.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub target: StampTarget,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Body>,
    pub credential: CredentialSelection,
}

/// Runs the gateway pipeline for each request.
pub struct Forwarder {
    resolver: TargetResolver,
    versions: VersionNormalizer,
    credentials: CredentialProvider,
    transports: Arc<TransportPool>,
}

impl Forwarder {
    pub fn new(
        resolver: TargetResolver,
        versions: VersionNormalizer,
        credentials: CredentialProvider,
        transports: Arc<TransportPool>,
    ) -> Self {
        Self {
            resolver,
            versions,
            credentials,
            transports,
        }
    }

    /// Forward one request and return the stamp's response.
    pub async fn forward(&self, request: ForwardRequest) -> GatewayResult<Response<Body>> {
        let prepared = self.prepare(request).await?;
        self.send(prepared).await
    }

    /// Resolve, normalize, authenticate and sanitize without touching the network
    /// (except for a token exchange on a cache miss).
    pub async fn prepare(&self, request: ForwardRequest) -> GatewayResult<PreparedRequest> {
        let ForwardRequest {
            method,
            path,
            mut query,
            mut headers,
            body,
        } = request;

        let target = self.resolver.resolve(&mut query, &mut headers)?;
        self.versions.apply(&mut query)?;
        let wanted = select_credential(&mut query, &mut headers);
        let credential = self.credentials.provide(wanted, &target).await?;

        sanitize_hop_by_hop(&mut headers);
        headers.remove(HOST);
        if let Some(value) = credential.authorization()? {
            headers.insert(AUTHORIZATION, value);
        }

        let url = target.join(&path, query.to_query_string().as_deref())?;

        Ok(PreparedRequest {
            method,
            target,
            url,
            headers,
            body,
            credential,
        })
    }

    /// Send a prepared request and stream the response back.
    pub async fn send(&self, prepared: PreparedRequest) -> GatewayResult<Response<Body>> {
        let PreparedRequest {
            method,
            target,
            url,
            headers,
            body,
            credential,
        } = prepared;

        let client = self.transports.for_selection(&credential)?;
        let mut outbound = client.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        tracing::debug!(
            method = %method,
            url = %url,
            credential = credential.kind(),
            "Forwarding to stamp"
        );

        let upstream = outbound.send().await.map_err(|source| {
            tracing::error!(
                method = %method,
                url = %url,
                stamp = %target,
                credential = ?credential,
                error = %source,
                "Stamp request failed"
            );
            GatewayError::Transport {
                method: method.to_string(),
                uri: url.to_string(),
                source,
            }
        })?;

        let status = upstream.status();
        tracing::info!(method = %method, url = %url, status = status.as_u16(), "Stamp responded");

        let mut response_headers = upstream.headers().clone();
        sanitize_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }

    pub fn transports(&self) -> &Arc<TransportPool> {
        &self.transports
    }
}
