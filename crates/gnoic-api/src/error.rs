//! Error types for request construction and payload verification.

use thiserror::Error;

/// Result type for API helpers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// API helper error variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The option does not address any field of the message it was applied to.
    #[error("invalid message type: option {option} does not apply to {message}")]
    InvalidMessageType {
        /// Option name.
        option: &'static str,
        /// Fully qualified message name.
        message: String,
    },

    /// A token could not be mapped to an accepted value.
    #[error("invalid value {value:?} for {field}")]
    InvalidValue {
        /// Field or flag the value was meant for.
        field: &'static str,
        /// Offending input.
        value: String,
    },

    /// An XPath-like string could not be parsed.
    #[error("invalid path {path:?}: {reason}")]
    PathParse {
        /// Input path.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The computed digest differs from the expected one.
    #[error("wrong hash: expected {expected}, got {computed}")]
    WrongHash {
        /// Hex-encoded expected digest.
        expected: String,
        /// Hex-encoded computed digest.
        computed: String,
    },

    /// A digest's length does not match its method.
    #[error("invalid {method} digest length {len}")]
    DigestLength {
        /// Hash method name.
        method: &'static str,
        /// Observed length.
        len: usize,
    },

    /// Verification was requested with the UNSPECIFIED hash method.
    #[error("unspecified hash method")]
    UnspecifiedHash,
}

impl ApiError {
    pub(crate) fn invalid_value(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }

    pub(crate) fn path(path: &str, reason: impl Into<String>) -> Self {
        Self::PathParse {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
