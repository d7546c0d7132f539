//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → request.rs (request ID helpers)
//!     → [proxy::Forwarder runs the gateway pipeline]
//!     → response.rs (stamp response passthrough, or uniform JSON 500)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use response::ErrorBody;
pub use server::{AppState, HttpServer};
