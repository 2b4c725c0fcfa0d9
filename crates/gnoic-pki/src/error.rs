//! PKI error types.

use thiserror::Error;

/// Result type for PKI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PKI error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Key or certificate generation failed.
    #[error("certificate generation failed: {0}")]
    Generation(String),

    /// Certificate, key or CSR parsing failed.
    #[error("parsing failed: {0}")]
    Parse(String),

    /// PEM framing is malformed.
    #[error("invalid PEM: {0}")]
    Pem(String),

    /// Configuration rejected before generation.
    #[error("invalid CA configuration: {0}")]
    Config(String),

    /// Certificate validation failed.
    #[error("certificate validation failed: {0}")]
    Validation(String),

    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// Subject Alternative Name error.
    #[error("SAN error: {0}")]
    San(String),

    /// Reading or writing PEM files failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
