//! Admin surface.
//!
//! # Data Flow
//! ```text
//! Operator / geoproxy-cli
//!     → auth.rs (Bearer api_key)
//!     → handlers.rs (status, cache sizes, cache clear)
//!     → AppState caches
//! ```
//!
//! # Design Decisions
//! - Served on its own listener so it can stay on loopback
//! - Shares `AppState` with the gateway listener; clearing is visible immediately

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/caches", get(get_caches))
        .route("/admin/caches/clear", post(clear_caches))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown.
pub async fn serve_admin(
    listener: TcpListener,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin server starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("Admin server stopped");
    Ok(())
}
