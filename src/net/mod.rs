//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, via axum-server)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently
//! - One process-wide rustls crypto provider, installed before any TLS config is built

pub mod tls;

pub use tls::{install_crypto_provider, load_tls_config};
