//! Client certificate stores.
//!
//! # Responsibilities
//! - Define the narrow `CredentialStore` seam the certificate cache reads through
//! - Read client certificates (chain + private key) from a directory of PEM files
//! - Provide an in-memory store for tests and embedded use
//!
//! # Design Decisions
//! - Thumbprint is the upper-case hex SHA-1 of the leaf certificate DER
//! - Lookups match thumbprint or subject common name, case-insensitively
//! - The directory is scanned on every lookup; callers cache the result

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use sha1::{Digest, Sha1};

/// An opaque client certificate handle: certificate chain and private key in PEM form.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    thumbprint: String,
    subject_cn: Option<String>,
    friendly_name: Option<String>,
    pem: Vec<u8>,
}

impl ClientCertificate {
    /// Parse a PEM bundle holding a certificate chain and its private key.
    pub fn from_pem(pem: Vec<u8>) -> Result<Self, StoreError> {
        let mut reader = pem.as_slice();
        let leaf = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| StoreError::Invalid("no certificate in PEM bundle".to_string()))?
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let mut reader = pem.as_slice();
        rustls_pemfile::private_key(&mut reader)
            .map_err(|e| StoreError::Invalid(e.to_string()))?
            .ok_or_else(|| StoreError::Invalid("no private key in PEM bundle".to_string()))?;

        let der: &[u8] = leaf.as_ref();
        let thumbprint = hex::encode_upper(Sha1::digest(der));
        let subject_cn = x509_parser::parse_x509_certificate(der)
            .map_err(|e| StoreError::Invalid(e.to_string()))?
            .1
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            thumbprint,
            subject_cn,
            friendly_name: None,
            pem,
        })
    }

    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn subject_cn(&self) -> Option<&str> {
        self.subject_cn.as_deref()
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    pub fn set_friendly_name(&mut self, name: impl Into<String>) {
        self.friendly_name = Some(name.into());
    }

    /// Certificate chain and key, for building a TLS identity.
    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    /// True when `hint` equals the thumbprint or the subject CN, ignoring case.
    pub fn matches(&self, hint: &str) -> bool {
        self.thumbprint.eq_ignore_ascii_case(&normalize_hint(hint))
            || self
                .subject_cn
                .as_deref()
                .is_some_and(|cn| cn.eq_ignore_ascii_case(hint.trim()))
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("thumbprint", &self.thumbprint)
            .field("subject_cn", &self.subject_cn)
            .field("friendly_name", &self.friendly_name)
            .field("pem", &"[REDACTED]")
            .finish()
    }
}

/// Hex digits in a SHA-1 thumbprint.
const THUMBPRINT_LEN: usize = 40;

/// Canonical cache key for a lookup hint.
///
/// Thumbprints copied from certificate viewers often carry spaces or a leading
/// invisible mark; those are dropped, but only when what remains is a
/// thumbprint. Subject names keep their inner whitespace.
pub fn normalize_hint(hint: &str) -> String {
    let compact: String = hint
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{200e}' && *c != '\u{feff}')
        .collect();

    if compact.len() == THUMBPRINT_LEN && compact.chars().all(|c| c.is_ascii_hexdigit()) {
        compact.to_ascii_lowercase()
    } else {
        hint.trim().to_ascii_lowercase()
    }
}

/// Errors raised by a credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("certificate store unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid certificate: {0}")]
    Invalid(String),
}

/// A source of client certificates.
pub trait CredentialStore: Send + Sync {
    /// Find a certificate whose thumbprint or subject CN matches `hint`.
    fn find(&self, hint: &str) -> Result<Option<ClientCertificate>, StoreError>;
}

/// Reads `*.pem` bundles from a directory.
#[derive(Debug, Clone)]
pub struct PemDirectoryStore {
    root: PathBuf,
}

impl PemDirectoryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl CredentialStore for PemDirectoryStore {
    fn find(&self, hint: &str) -> Result<Option<ClientCertificate>, StoreError> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pem") {
                continue;
            }
            let pem = fs::read(&path)?;
            match ClientCertificate::from_pem(pem) {
                Ok(certificate) if certificate.matches(hint) => {
                    tracing::debug!(
                        path = %path.display(),
                        thumbprint = %certificate.thumbprint(),
                        "Client certificate found"
                    );
                    return Ok(Some(certificate));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable certificate file");
                }
            }
        }
        Ok(None)
    }
}

/// In-memory store keyed by thumbprint.
#[derive(Debug, Default)]
pub struct MemoryStore {
    certificates: DashMap<String, ClientCertificate>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, certificate: ClientCertificate) {
        self.certificates
            .insert(certificate.thumbprint().to_string(), certificate);
    }
}

impl CredentialStore for MemoryStore {
    fn find(&self, hint: &str) -> Result<Option<ClientCertificate>, StoreError> {
        Ok(self
            .certificates
            .iter()
            .find(|entry| entry.value().matches(hint))
            .map(|entry| entry.value().clone()))
    }
}
