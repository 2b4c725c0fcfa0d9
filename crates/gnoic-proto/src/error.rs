//! Error types for the gnoic-proto crate.

use thiserror::Error;

/// Errors that can occur while working with the embedded descriptors.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The embedded descriptor set could not be decoded.
    #[error("descriptor error: {0}")]
    Descriptor(String),

    /// The message is not part of the embedded descriptor set.
    #[error("unknown message type: {0}")]
    UnknownMessage(String),

    /// Failed to decode a message.
    #[error("decoding error: {0}")]
    Decoding(#[from] prost::DecodeError),
}
