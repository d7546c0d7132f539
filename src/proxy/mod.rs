//! Stamp forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (split into ForwardRequest, drop content-less bodies)
//!     → forwarder.rs
//!         → routing (stamp target, api-version)
//!         → auth (credential selection + materialization)
//!         → security (outbound header sanitizing)
//!         → transport.rs (client for the credential)
//!         → security (response header sanitizing)
//!     → streamed response
//! ```
//!
//! # Design Decisions
//! - No retries and no fallback: a transport error fails the request
//! - Bodies stream through in both directions; nothing is buffered
//! - Redirects are returned to the caller, never followed

pub mod forwarder;
pub mod request;
pub mod transport;

pub use forwarder::{Forwarder, PreparedRequest};
pub use request::{outbound_body, ForwardRequest};
pub use transport::TransportPool;
