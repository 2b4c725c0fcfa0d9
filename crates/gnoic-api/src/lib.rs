//! # gnoic-api
//!
//! Helpers shared by the gNOI client and the embedded file server:
//!
//! - [`path`]: XPath-like strings to and from `gnoi.types.Path`
//! - [`hash`]: hash method selection, running digests, verification
//! - [`perm`]: octal-digit permission values to and from mode bits
//! - [`options`]: option-based request construction
//!
//! # Example
//!
//! ```
//! use gnoic_api::{hash, HashMethod};
//!
//! let digest = hash(HashMethod::Sha256, b"hello\n").unwrap();
//! assert!(gnoic_api::verify(&digest, b"hello\n").is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod options;
pub mod path;
pub mod perm;

pub use error::{ApiError, Result};
pub use hash::{hash, verify, HashMethod, Hasher};
pub use options::{build, configure, Configurable, GnoiOption};
pub use path::{parse_path, path_to_xpath};
pub use perm::{decimal_to_octal, octal_to_decimal};
