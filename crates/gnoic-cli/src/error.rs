//! CLI error types.

use gnoic_api::ApiError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid flag, configuration file or local input; raised before any RPC.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dialing or TLS handshake failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer broke the expected message sequence or reported an error
    /// inside the stream.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Received data failed verification.
    #[error("payload error: {0}")]
    Payload(String),

    /// Local filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The RPC failed with a gRPC status.
    #[error("rpc error: code = {:?} desc = {}", .0.code(), .0.message())]
    Rpc(#[from] tonic::Status),

    /// Request construction or hash verification failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local CA or certificate handling failed.
    #[error(transparent)]
    Pki(#[from] gnoic_pki::Error),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// Some targets failed; each was already reported.
    #[error("there was {0} error(s)")]
    Failed(usize),
}

impl CliError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(format!("JSON serialization failed: {err}"))
    }
}

impl From<gnoic_proto::ProtoError> for CliError {
    fn from(err: gnoic_proto::ProtoError) -> Self {
        Self::Format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_display_connection() {
        let err = CliError::Connection("10.0.0.2:57400: connection refused".into());
        assert_eq!(
            err.to_string(),
            "connection error: 10.0.0.2:57400: connection refused"
        );
    }

    #[test]
    fn cli_error_display_failed_summary() {
        assert_eq!(CliError::Failed(2).to_string(), "there was 2 error(s)");
    }

    #[test]
    fn cli_error_display_rpc() {
        let err = CliError::from(tonic::Status::not_found("no such file"));
        assert_eq!(
            err.to_string(),
            "rpc error: code = NotFound desc = no such file"
        );
    }

    #[test]
    fn cli_error_api_is_transparent() {
        let err = CliError::from(ApiError::UnspecifiedHash);
        assert_eq!(err.to_string(), "unspecified hash method");
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(matches!(CliError::from(io_err), CliError::Io(_)));
    }
}
