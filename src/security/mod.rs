//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request headers
//!     → headers.rs (strip Connection-listed and framing headers)
//!     → transport
//! Stamp response headers
//!     → headers.rs (same rules)
//!     → client
//! ```
//!
//! # Design Decisions
//! - One sanitizer for both directions
//! - Headers named in `Connection` with the internal `x-ms-` prefix survive

pub mod headers;

pub use headers::{sanitize_hop_by_hop, INTERNAL_HEADER_PREFIX};
