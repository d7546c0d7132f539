//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! Request query + headers
//!     → selection.rs (precedence: basicauth → stampsub → stampcert → certauth)
//!     → provider.rs (produce the credential)
//!         → certificates.rs (cache) → store.rs (PEM directory / in-memory)
//!         → identity.rs (exchange) → token.rs (cache, 1h TTL, sweep on fetch)
//!     → CredentialSelection (exactly one of Certificate / BearerToken / BasicAuth)
//! ```
//!
//! # Design Decisions
//! - Caches are constructed once at startup and shared via Arc; tests build their own
//! - Both caches are concurrent maps; unrelated keys never share a lock
//! - Certificate lookups hand out copies, never the cached value

pub mod certificates;
pub mod identity;
pub mod provider;
pub mod selection;
pub mod store;
pub mod token;

pub use certificates::CertificateCache;
pub use identity::IdentityClient;
pub use provider::CredentialProvider;
pub use selection::{select_credential, BasicSecret, CredentialRequest, CredentialSelection};
pub use store::{ClientCertificate, CredentialStore, MemoryStore, PemDirectoryStore};
pub use token::TokenCache;
