//! Certificate signing requests received from devices.

use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::types::{convert_general_name, decode_single_pem, encode_pem, SubjectAltName, CSR_LABEL};

/// A parsed PKCS#10 certificate signing request.
#[derive(Debug, Clone)]
pub struct Csr {
    der: Vec<u8>,
    subject: String,
    san: Vec<SubjectAltName>,
}

impl Csr {
    /// Parses a single PEM `CERTIFICATE REQUEST` block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pem`] on bad framing or trailing data and
    /// [`Error::Parse`] when the request does not parse or its signature
    /// does not verify.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::from_der(&decode_single_pem(pem, CSR_LABEL)?)
    }

    /// Parses a DER-encoded request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the request does not parse or its
    /// self-signature does not verify.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, csr) = X509CertificationRequest::from_der(der)
            .map_err(|e| Error::Parse(format!("failed to parse CSR: {e}")))?;
        csr.verify_signature()
            .map_err(|e| Error::Parse(format!("CSR signature does not verify: {e}")))?;

        let mut san = Vec::new();
        if let Some(extensions) = csr.requested_extensions() {
            for ext in extensions {
                if let ParsedExtension::SubjectAlternativeName(names) = ext {
                    san.extend(names.general_names.iter().filter_map(convert_general_name));
                }
            }
        }

        Ok(Self {
            der: der.to_vec(),
            subject: csr.certification_request_info.subject.to_string(),
            san,
        })
    }

    /// Returns the DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the request re-encoded as PEM.
    #[must_use]
    pub fn pem(&self) -> String {
        encode_pem(CSR_LABEL, &self.der)
    }

    /// Returns the requested subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the requested IP, DNS, email and URI names.
    #[must_use]
    pub fn san(&self) -> &[SubjectAltName] {
        &self.san
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_csr(names: Vec<String>) -> String {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(names).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "router1");
        params
            .distinguished_name
            .push(rcgen::DnType::OrganizationName, "Lab");
        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    #[test]
    fn parses_subject_and_sans() {
        let pem = device_csr(vec!["router1.lab".into(), "192.0.2.1".into()]);
        let csr = Csr::from_pem(pem.as_bytes()).unwrap();
        assert!(csr.subject().contains("CN=router1"));
        assert!(csr.subject().contains("O=Lab"));
        assert!(csr.san().contains(&SubjectAltName::Dns("router1.lab".into())));
        assert!(csr
            .san()
            .contains(&SubjectAltName::Ip("192.0.2.1".parse().unwrap())));
    }

    #[test]
    fn rejects_certificate_block() {
        let ck = rcgen::generate_simple_self_signed(vec!["x".into()]).unwrap();
        assert!(matches!(
            Csr::from_pem(ck.cert.pem().as_bytes()),
            Err(Error::Pem(_))
        ));
    }

    #[test]
    fn rejects_corrupt_body() {
        let pem = encode_pem(CSR_LABEL, b"not a csr");
        assert!(matches!(Csr::from_pem(pem.as_bytes()), Err(Error::Parse(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut pem = device_csr(vec!["a".into()]);
        pem.push_str("extra");
        assert!(matches!(Csr::from_pem(pem.as_bytes()), Err(Error::Pem(_))));
    }
}
