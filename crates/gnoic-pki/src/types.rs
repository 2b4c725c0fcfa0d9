//! Certificate, key and PEM types.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use x509_parser::pem::Pem;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
/// PEM label of a PKCS#1 RSA private key.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
/// PEM label of a PKCS#8 private key.
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
/// PEM label of a PKCS#10 certificate request.
pub const CSR_LABEL: &str = "CERTIFICATE REQUEST";

/// Subject Alternative Name types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltName {
    /// DNS name.
    Dns(String),
    /// IP address.
    Ip(IpAddr),
    /// Email address.
    Email(String),
    /// URI.
    Uri(String),
}

/// Decodes exactly one PEM block with the given label.
///
/// Only whitespace may follow the block.
///
/// # Errors
///
/// Returns [`Error::Pem`] when the input is not PEM, carries a different
/// label, or has trailing data.
pub fn decode_single_pem(input: &[u8], label: &str) -> Result<Vec<u8>> {
    let (rest, pem) = x509_parser::pem::parse_x509_pem(input)
        .map_err(|e| Error::Pem(format!("no PEM block found: {e:?}")))?;
    if !rest.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Pem(format!(
            "{} trailing bytes after {label} block",
            rest.len()
        )));
    }
    check_label(&pem, label)?;
    Ok(pem.contents)
}

fn check_label(pem: &Pem, label: &str) -> Result<()> {
    if pem.label == label {
        Ok(())
    } else {
        Err(Error::Pem(format!(
            "expected {label} block, found {}",
            pem.label
        )))
    }
}

/// Encodes DER bytes as a PEM block with 64-column lines.
#[must_use]
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    let body = b64
        .as_bytes()
        .chunks(64)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");
    format!("-----BEGIN {label}-----\n{body}\n-----END {label}-----\n")
}

/// A DER-encoded X.509 certificate with metadata.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    version: u32,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    subject: String,
    issuer: String,
    san: Vec<SubjectAltName>,
}

impl Certificate {
    /// Parses a certificate from DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        use x509_parser::prelude::*;

        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_before timestamp".into()))?;
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_after timestamp".into()))?;

        Ok(Self {
            der: der.to_vec(),
            // X.509 versions are zero-based on the wire.
            version: cert.version().0 + 1,
            serial: cert.raw_serial_as_string(),
            not_before,
            not_after,
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            san: extract_san(&cert),
        })
    }

    /// Parses a single PEM `CERTIFICATE` block.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed PEM or certificate.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::from_der(&decode_single_pem(pem, CERTIFICATE_LABEL)?)
    }

    /// Returns the DER-encoded certificate bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the PEM-encoded certificate.
    #[must_use]
    pub fn pem(&self) -> String {
        encode_pem(CERTIFICATE_LABEL, &self.der)
    }

    /// Returns the X.509 version (1, 2 or 3).
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the serial number as colon-separated hex.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Returns the certificate validity start time.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the certificate validity end time.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns the subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the issuer distinguished name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the subject alternative names.
    #[must_use]
    pub fn san(&self) -> &[SubjectAltName] {
        &self.san
    }

    /// Returns the IP address SANs.
    #[must_use]
    pub fn ip_addresses(&self) -> Vec<IpAddr> {
        self.san
            .iter()
            .filter_map(|san| match san {
                SubjectAltName::Ip(ip) => Some(*ip),
                _ => None,
            })
            .collect()
    }
}

/// Extracts SANs from a certificate.
fn extract_san(cert: &x509_parser::certificate::X509Certificate<'_>) -> Vec<SubjectAltName> {
    let mut sans = Vec::new();
    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            if let Some(san) = convert_general_name(name) {
                sans.push(san);
            }
        }
    }
    sans
}

pub(crate) fn convert_general_name(
    name: &x509_parser::extensions::GeneralName<'_>,
) -> Option<SubjectAltName> {
    use x509_parser::extensions::GeneralName;
    match name {
        GeneralName::DNSName(dns) => Some(SubjectAltName::Dns((*dns).to_string())),
        GeneralName::IPAddress(bytes) => parse_ip_bytes(bytes).map(SubjectAltName::Ip),
        GeneralName::RFC822Name(email) => Some(SubjectAltName::Email((*email).to_string())),
        GeneralName::URI(uri) => Some(SubjectAltName::Uri((*uri).to_string())),
        _ => None,
    }
}

/// Parses IP address bytes into an `IpAddr`.
fn parse_ip_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

/// A PEM-encoded private key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    pem: String,
}

impl PrivateKey {
    /// Wraps PEM text.
    #[must_use]
    pub const fn from_pem(pem: String) -> Self {
        Self { pem }
    }

    /// Returns the PEM text.
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> rcgen::CertifiedKey {
        rcgen::generate_simple_self_signed(vec!["router1.lab".into(), "10.1.1.1".into()])
            .unwrap()
    }

    #[test]
    fn certificate_from_pem_extracts_metadata() {
        let ck = self_signed();
        let cert = Certificate::from_pem(ck.cert.pem().as_bytes()).unwrap();
        assert_eq!(cert.version(), 3);
        assert!(cert.not_before() < cert.not_after());
        assert!(cert
            .san()
            .contains(&SubjectAltName::Dns("router1.lab".into())));
        assert_eq!(cert.ip_addresses(), vec!["10.1.1.1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn pem_round_trip() {
        let ck = self_signed();
        let cert = Certificate::from_der(ck.cert.der()).unwrap();
        let again = Certificate::from_pem(cert.pem().as_bytes()).unwrap();
        assert_eq!(again.der(), cert.der());
    }

    #[test]
    fn trailing_garbage_rejected() {
        let ck = self_signed();
        let mut pem = ck.cert.pem();
        pem.push_str("garbage");
        assert!(matches!(
            Certificate::from_pem(pem.as_bytes()),
            Err(Error::Pem(_))
        ));
    }

    #[test]
    fn trailing_whitespace_allowed() {
        let ck = self_signed();
        let pem = format!("{}\n\n  ", ck.cert.pem());
        assert!(Certificate::from_pem(pem.as_bytes()).is_ok());
    }

    #[test]
    fn wrong_label_rejected() {
        let pem = encode_pem("PUBLIC KEY", b"abc");
        let err = decode_single_pem(pem.as_bytes(), CERTIFICATE_LABEL).unwrap_err();
        assert!(err.to_string().contains("expected CERTIFICATE"));
    }

    #[test]
    fn second_block_counts_as_trailing_data() {
        let ck = self_signed();
        let pem = format!("{}{}", ck.cert.pem(), ck.cert.pem());
        assert!(Certificate::from_pem(pem.as_bytes()).is_err());
    }

    #[test]
    fn private_key_debug_redacted() {
        let key = PrivateKey::from_pem("secret".into());
        assert!(!format!("{key:?}").contains("secret"));
    }
}
