//! Error types for the file server.

use std::net::SocketAddr;

use gnoic_api::ApiError;
use thiserror::Error;
use tonic::{Code, Status};

/// Errors that can occur in the file server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// Invalid server configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The gRPC transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// A client path resolves outside the served root.
    #[error("path {0:?} escapes the served root")]
    PathEscape(String),

    /// A request field is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The client violated the stream protocol.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The requested file does not exist.
    #[error("{0}: no such file or directory")]
    NotFound(String),

    /// A file operation was aimed at a directory.
    #[error("{0} is a directory")]
    IsDirectory(String),

    /// The uploaded bytes do not match the announced hash.
    #[error("hash mismatch: {0}")]
    HashMismatch(ApiError),

    /// The requested transfer protocol is not supported.
    #[error("{0} is not implemented")]
    Unimplemented(String),

    /// Upload to a remote host failed.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// The client stream failed.
    #[error("client stream error: {}", .0.message())]
    ClientStream(Status),

    /// Local filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Maps an I/O error on `path`, turning "not found" into [`Self::NotFound`].
    pub(crate) fn io_at(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io(err)
        }
    }

    /// The gRPC status code reported for this error.
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::PathEscape(_)
            | Self::InvalidArgument(_)
            | Self::UnexpectedMessage(_)
            | Self::IsDirectory(_) => Code::InvalidArgument,
            Self::NotFound(_) => Code::NotFound,
            Self::HashMismatch(_) => Code::DataLoss,
            Self::Unimplemented(_) => Code::Unimplemented,
            Self::Transfer(_) => Code::Unavailable,
            Self::ClientStream(status) => status.code(),
            Self::BindFailed(..) | Self::Config(_) | Self::Transport(_) | Self::Io(_) => {
                Code::Internal
            }
        }
    }
}

impl From<ssh2::Error> for ServerError {
    fn from(err: ssh2::Error) -> Self {
        Self::Transfer(err.to_string())
    }
}

impl From<ServerError> for Status {
    fn from(err: ServerError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
