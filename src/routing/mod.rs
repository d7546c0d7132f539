//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (query, headers, referrer)
//!     → query.rs (ordered multi-map of query parameters)
//!     → target.rs (stamp override → header hint → default stamp → legacy referrer)
//!     → version.rs (validate & rewrite api-version)
//!     → Return: StampTarget + rewritten query, or a validation error
//! ```
//!
//! # Design Decisions
//! - Resolver and normalizer are built once from config, immutable at runtime
//! - Each request owns its own query map; nothing is shared between requests
//! - Deterministic: same input always resolves to the same base URI
//! - First match wins

pub mod query;
pub mod target;
pub mod version;

pub use query::QueryParams;
pub use target::{stamp_to_uri, StampTarget, TargetResolver};
pub use version::{VersionNormalizer, VersionPolicy};
