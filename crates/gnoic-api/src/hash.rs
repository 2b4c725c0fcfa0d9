//! Hash method selection, running digests and verification.

use std::fmt;
use std::str::FromStr;

use digest::DynDigest;
use gnoic_proto::types::{hash_type, HashType};

use crate::error::{ApiError, Result};

/// Hash methods understood by gNOI.
///
/// `Unspecified` parses as a token (it is valid on the wire) but every
/// attempt to hash or verify with it fails with [`ApiError::UnspecifiedHash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashMethod {
    /// No method chosen.
    Unspecified,
    /// MD5, 16-byte digest.
    #[default]
    Md5,
    /// SHA-256, 32-byte digest.
    Sha256,
    /// SHA-512, 64-byte digest.
    Sha512,
}

impl HashMethod {
    /// Canonical upper-case token, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Digest length in bytes, `None` for `Unspecified`.
    #[must_use]
    pub const fn digest_len(self) -> Option<usize> {
        match self {
            Self::Unspecified => None,
            Self::Md5 => Some(16),
            Self::Sha256 => Some(32),
            Self::Sha512 => Some(64),
        }
    }

    /// Converts to the protobuf enum.
    #[must_use]
    pub const fn to_proto(self) -> hash_type::HashMethod {
        match self {
            Self::Unspecified => hash_type::HashMethod::Unspecified,
            Self::Md5 => hash_type::HashMethod::Md5,
            Self::Sha256 => hash_type::HashMethod::Sha256,
            Self::Sha512 => hash_type::HashMethod::Sha512,
        }
    }

    /// Converts from the raw protobuf enum value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidValue`] for values outside the enum.
    pub fn from_proto(value: i32) -> Result<Self> {
        match hash_type::HashMethod::try_from(value) {
            Ok(hash_type::HashMethod::Unspecified) => Ok(Self::Unspecified),
            Ok(hash_type::HashMethod::Md5) => Ok(Self::Md5),
            Ok(hash_type::HashMethod::Sha256) => Ok(Self::Sha256),
            Ok(hash_type::HashMethod::Sha512) => Ok(Self::Sha512),
            Err(_) => Err(ApiError::invalid_value("hash method", value.to_string())),
        }
    }

    /// Creates a running hasher for this method.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::UnspecifiedHash`] for `Unspecified`.
    pub fn hasher(self) -> Result<Hasher> {
        let inner: Box<dyn DynDigest + Send + Sync> = match self {
            Self::Unspecified => return Err(ApiError::UnspecifiedHash),
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha512 => Box::new(sha2::Sha512::default()),
        };
        Ok(Hasher {
            method: self,
            inner,
        })
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMethod {
    type Err = ApiError;

    /// Case-insensitive; dashes and underscores are ignored so `sha-256`
    /// and `SHA_256` both select SHA-256.
    fn from_str(s: &str) -> Result<Self> {
        let token: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match token.as_str() {
            "UNSPECIFIED" => Ok(Self::Unspecified),
            "MD5" => Ok(Self::Md5),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(ApiError::invalid_value("hash method", s)),
        }
    }
}

/// Incremental digest bound to a [`HashMethod`].
pub struct Hasher {
    method: HashMethod,
    inner: Box<dyn DynDigest + Send + Sync>,
}

impl Hasher {
    /// Returns the method this hasher computes.
    #[must_use]
    pub const fn method(&self) -> HashMethod {
        self.method
    }

    /// Feeds bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consumes the hasher and returns the raw digest.
    #[must_use]
    pub fn finalize_bytes(self) -> Vec<u8> {
        self.inner.finalize().into_vec()
    }

    /// Consumes the hasher and returns a `HashType` message.
    #[must_use]
    pub fn finalize(self) -> HashType {
        let method = self.method;
        HashType {
            method: method.to_proto() as i32,
            hash: self.finalize_bytes(),
        }
    }

    /// Consumes the hasher and compares its digest with `expected`.
    ///
    /// # Errors
    ///
    /// Fails when the methods differ, the expected digest has the wrong
    /// length, or the digests differ.
    pub fn verify(self, expected: &HashType) -> Result<()> {
        let method = HashMethod::from_proto(expected.method)?;
        if method != self.method {
            return Err(ApiError::invalid_value(
                "hash method",
                format!("{method} (computing {})", self.method),
            ));
        }
        check_digest_len(method, &expected.hash)?;
        let computed = self.finalize_bytes();
        if computed != expected.hash {
            return Err(ApiError::WrongHash {
                expected: hex::encode(&expected.hash),
                computed: hex::encode(computed),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Hashes `data` in one shot.
///
/// # Errors
///
/// Returns [`ApiError::UnspecifiedHash`] for `Unspecified`.
pub fn hash(method: HashMethod, data: &[u8]) -> Result<HashType> {
    let mut hasher = method.hasher()?;
    hasher.update(data);
    Ok(hasher.finalize())
}

/// Verifies `data` against `expected`, using the method carried by `expected`.
///
/// # Errors
///
/// Fails with [`ApiError::UnspecifiedHash`] for the UNSPECIFIED method, with
/// [`ApiError::DigestLength`] when the digest length does not match the
/// method, and with [`ApiError::WrongHash`] on mismatch.
pub fn verify(expected: &HashType, data: &[u8]) -> Result<()> {
    let method = HashMethod::from_proto(expected.method)?;
    let mut hasher = method.hasher()?;
    hasher.update(data);
    hasher.verify(expected)
}

fn check_digest_len(method: HashMethod, digest: &[u8]) -> Result<()> {
    match method.digest_len() {
        None => Err(ApiError::UnspecifiedHash),
        Some(len) if len == digest.len() => Ok(()),
        Some(_) => Err(ApiError::DigestLength {
            method: method.as_str(),
            len: digest.len(),
        }),
    }
}
