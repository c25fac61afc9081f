//! Error types for certdesk.
//!
//! ```
//! use certdesk::error::CertDeskError;
//!
//! let err = CertDeskError::AliasNotFound("server".to_string());
//! assert_eq!(err.to_string(), "Alias not found: server");
//! ```

use thiserror::Error;

/// Represents errors that can occur in the certdesk library.
///
/// Every component validates its own preconditions and fails with one of these
/// kinds instead of surfacing a lower-level decode error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertDeskError {
    /// Bad input detected before any cryptographic work.
    #[error("Invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// None of the private-key decode strategies produced a usable key.
    #[error("Failed to decode private key: {0}")]
    KeyDecode(String),

    /// A certificate or certificate bundle could not be parsed.
    #[error("Failed to decode certificate: {0}")]
    CertificateDecode(String),

    /// A keystore could not be opened (wrong password or corrupt structure).
    #[error("Failed to load keystore: {0}")]
    StoreLoad(String),

    /// The CA certificate or key needed for issuance is missing.
    #[error("Missing CA material: {0}")]
    MissingCa(String),

    /// The requested algorithm is unknown or cannot be used with the given key.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Alias already exists: {0}")]
    DuplicateAlias(String),

    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// The entry has no private key attached.
    #[error("Entry has no private key: {0}")]
    NoPrivateKey(String),

    /// The target format holds a single entry only.
    #[error("Format {format} supports a single entry, got {count}")]
    MultipleEntriesNotSupported { format: String, count: usize },

    /// ASN.1 or extension assembly failed while building a certificate.
    #[error("Failed to build certificate: {0}")]
    CertificateBuild(String),

    /// A freshly issued certificate did not verify against its issuer key.
    #[error("Issued certificate failed verification: {0}")]
    IssuanceVerification(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    Encoding(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),
}

impl CertDeskError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        CertDeskError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<der::Error> for CertDeskError {
    /// Converts a `der::Error` raised while assembling ASN.1 structures.
    fn from(err: der::Error) -> Self {
        CertDeskError::CertificateBuild(err.to_string())
    }
}

impl From<rsa::Error> for CertDeskError {
    fn from(err: rsa::Error) -> Self {
        CertDeskError::KeyGeneration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CertDeskError>;
