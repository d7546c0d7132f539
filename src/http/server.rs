//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared gateway state (caches, transports, forwarder) once
//! - Create the Axum router with one catch-all handler for every verb
//! - Wire up middleware (request ID, tracing)
//! - Serve on a plain or TLS listener until shutdown
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{
    CertificateCache, CredentialProvider, CredentialStore, IdentityClient, PemDirectoryStore,
    TokenCache,
};
use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::proxy::{ForwardRequest, Forwarder, TransportPool};
use crate::routing::{TargetResolver, VersionNormalizer};

/// In-flight requests get this long to finish once shutdown starts on a TLS listener.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub forwarder: Arc<Forwarder>,
    pub certificates: Arc<CertificateCache>,
    pub tokens: Arc<TokenCache>,
    pub transports: Arc<TransportPool>,
}

impl AppState {
    /// Build every gateway service from configuration, reading certificates from `store`.
    pub fn build(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> GatewayResult<Self> {
        let transports = Arc::new(TransportPool::new(&config.timeouts, &config.upstream)?);
        let certificates = Arc::new(CertificateCache::new(store));
        let tokens = Arc::new(TokenCache::new(Duration::from_secs(
            config.identity.token_ttl_secs,
        )));
        let identity = Arc::new(IdentityClient::new(
            &config.identity,
            transports.plain(),
            tokens.clone(),
        )?);
        let credentials = CredentialProvider::new(
            certificates.clone(),
            identity,
            &config.basic_auth,
            &config.certificates,
        );
        let forwarder = Forwarder::new(
            TargetResolver::from_config(&config.routing),
            VersionNormalizer::from_config(&config.api_version),
            credentials,
            transports.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
            certificates,
            tokens,
            transports,
        })
    }

    /// Drop every cached certificate, token and certificate-bound transport.
    pub fn clear_caches(&self) {
        self.certificates.clear();
        self.tokens.clear();
        self.transports.clear();
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server that reads client certificates from the configured PEM directory.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let store = PemDirectoryStore::new(Path::new(&config.certificates.store_path));
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> GatewayResult<Self> {
        let state = AppState::build(config, store)?;
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(
                        |request: &Request<Body>| {
                            tracing::info_span!(
                                "request",
                                method = %request.method(),
                                uri = %request.uri(),
                                request_id = %request_id(request.headers())
                            )
                        },
                    ))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server behind TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Catch-all gateway handler: every verb and path goes through the forwarder.
///
/// Dropping this future (client abort) drops the outbound call with it.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    match state.forwarder.forward(ForwardRequest::from(request)).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
            response
        }
        Err(err) => {
            tracing::error!(
                method = %method,
                uri = %uri,
                kind = err.kind(),
                error = %err.detail(),
                "Request failed"
            );
            metrics::record_request(method.as_str(), 500, start_time);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;
    use crate::http::ErrorBody;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server(config: GatewayConfig) -> HttpServer {
        HttpServer::with_store(config, Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_validation_failure_returns_json_500_with_request_id() {
        let response = server(GatewayConfig::default())
            .router
            .oneshot(
                Request::builder()
                    .uri("/subscriptions?stamp=blu")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key("x-request-id"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, 500);
        assert!(body.message.contains("api-version query string is missing!"));
    }

    #[tokio::test]
    async fn test_caller_request_id_is_echoed() {
        let response = server(GatewayConfig::default())
            .router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/")
                    .header("x-request-id", "caller-id-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "caller-id-1");
    }

    #[tokio::test]
    async fn test_clear_caches() {
        let server = server(GatewayConfig::default());
        let state = server.state();
        state
            .transports
            .for_certificate(&crate::auth::store::testing::generate("clear-me"))
            .unwrap();
        assert_eq!(state.transports.len(), 1);

        state.clear_caches();
        assert!(state.transports.is_empty());
        assert!(state.certificates.is_empty());
        assert!(state.tokens.is_empty());
    }
}
