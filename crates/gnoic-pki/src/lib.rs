//! Local certificate authority for gNOI certificate management.
#![forbid(unsafe_code)]
//!
//! The CA signs the CSRs devices return over the `Rotate` and `Install`
//! streams so the resulting certificate can be loaded back in the same
//! session.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use gnoic_pki::{CaConfig, CertificateAuthority, Csr, DEFAULT_VALIDITY};
//!
//! let ca = CertificateAuthority::create(&CaConfig {
//!     common_name: "lab CA".into(),
//!     ..CaConfig::default()
//! })
//! .unwrap();
//! ca.write_pem_files(Path::new("cert.pem"), Path::new("key.pem")).unwrap();
//!
//! # let device_pem: Vec<u8> = Vec::new();
//! let csr = Csr::from_pem(&device_pem).unwrap();
//! let cert = ca.sign_csr(&csr, DEFAULT_VALIDITY).unwrap();
//! println!("{}", cert.pem());
//! ```
//!
//! # Modules
//!
//! - [`ca`] - CA creation, loading and CSR signing
//! - [`csr`] - Device CSR parsing
//! - [`validation`] - Certificate validation utilities
//! - [`types`] - Certificates, keys and PEM framing
//! - [`error`] - Error types

pub mod ca;
pub mod csr;
pub mod error;
pub mod types;
pub mod validation;

pub use ca::{CaConfig, CertificateAuthority, DEFAULT_KEY_SIZE, DEFAULT_VALIDITY};
pub use csr::Csr;
pub use error::{Error, Result};
pub use types::{decode_single_pem, encode_pem, Certificate, PrivateKey, SubjectAltName};
pub use validation::{is_expired, is_not_yet_valid, validate_certificate};
