//! Server configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gnoic_api::HashMethod;

use crate::error::{ServerError, ServerResult};

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:57401";

/// Default size of each `Get` content message: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default timeout for SSH connections opened by `TransferToRemote`.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest chunk the server will put in a single message.
///
/// Stays below tonic's default 4 MiB decode limit.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024 - 1024;

/// Configuration for the file server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the gRPC server to.
    pub bind_addr: SocketAddr,
    /// Directory every client path is resolved under.
    pub root: PathBuf,
    /// Hash method used for `Get` trailers and `TransferToRemote` responses.
    pub hash_method: HashMethod,
    /// Size of each `Get` content message.
    pub chunk_size: usize,
    /// Connect and I/O timeout for SSH uploads.
    pub transfer_timeout: Duration,
}

impl ServerConfig {
    /// Create a new configuration serving `root` on `bind_addr`.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            root: root.into(),
            hash_method: HashMethod::Md5,
            chunk_size: DEFAULT_CHUNK_SIZE,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    /// Set the hash method.
    #[must_use]
    pub const fn with_hash_method(mut self, method: HashMethod) -> Self {
        self.hash_method = method;
        self
    }

    /// Set the `Get` chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the SSH transfer timeout.
    #[must_use]
    pub const fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Returns the served root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks the configuration and canonicalizes the root directory.
    ///
    /// # Errors
    ///
    /// Fails when the root is not an existing directory, the hash method is
    /// `UNSPECIFIED`, or the chunk size is out of range.
    pub fn validate(mut self) -> ServerResult<Self> {
        if self.hash_method == HashMethod::Unspecified {
            return Err(ServerError::Config(
                "hash method must be one of md5, sha256, sha512".into(),
            ));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ServerError::Config(format!(
                "chunk size must be between 1 and {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        let root = std::fs::canonicalize(&self.root).map_err(|e| {
            ServerError::Config(format!("root {}: {e}", self.root.display()))
        })?;
        if !root.is_dir() {
            return Err(ServerError::Config(format!(
                "root {} is not a directory",
                root.display()
            )));
        }
        self.root = root;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new(addr(), "/srv");
        assert_eq!(config.hash_method, HashMethod::Md5);
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.transfer_timeout, DEFAULT_TRANSFER_TIMEOUT);
        assert_eq!(config.root(), Path::new("/srv"));
    }

    #[test]
    fn test_default_bind_addr_parses() {
        let parsed: SocketAddr = DEFAULT_BIND_ADDR.parse().unwrap();
        assert_eq!(parsed.port(), 57401);
    }

    #[test]
    fn test_builder_chain() {
        let config = ServerConfig::new(addr(), "/srv")
            .with_hash_method(HashMethod::Sha512)
            .with_chunk_size(1024)
            .with_transfer_timeout(Duration::from_secs(5));
        assert_eq!(config.hash_method, HashMethod::Sha512);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.transfer_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_canonicalizes_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let config = ServerConfig::new(addr(), nested.join("..").join("a"))
            .validate()
            .unwrap();
        assert_eq!(config.root, std::fs::canonicalize(&nested).unwrap());
    }

    #[test]
    fn test_validate_rejects_unspecified_hash() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::new(addr(), dir.path())
            .with_hash_method(HashMethod::Unspecified)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::new(addr(), dir.path())
            .with_chunk_size(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_file_root() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ServerConfig::new(addr(), file.path()).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::new(addr(), dir.path().join("missing"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
