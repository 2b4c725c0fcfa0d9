//! Certificate validation utilities.

use chrono::Utc;
use tracing::debug;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::types::Certificate;

/// Validates a certificate against its issuing CA certificate.
///
/// This performs the following checks:
/// - The certificate is within its validity window
/// - The issuer matches the CA's subject
/// - The signature verifies with the CA's public key
///
/// # Errors
///
/// Returns an error if any check fails.
pub fn validate_certificate(cert: &Certificate, ca_cert: &Certificate) -> Result<()> {
    debug!("Validating certificate: {}", cert.subject());

    if is_expired(cert) {
        return Err(Error::Validation(format!("{} has expired", cert.subject())));
    }
    if is_not_yet_valid(cert) {
        return Err(Error::Validation(format!(
            "{} is not yet valid",
            cert.subject()
        )));
    }

    if cert.issuer() != ca_cert.subject() {
        return Err(Error::Validation(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            ca_cert.subject()
        )));
    }

    verify_signature(cert, ca_cert)
}

/// Checks if a certificate has expired.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    Utc::now() > cert.not_after()
}

/// Checks if a certificate is not yet valid.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    Utc::now() < cert.not_before()
}

/// Verifies that a certificate was signed by the given issuer.
fn verify_signature(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let (_, parsed_cert) = X509Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let (_, parsed_issuer) = X509Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::SignatureVerification(format!(
                "signature verification failed for '{}': {e:?}",
                cert.subject()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed(name: &str) -> Certificate {
        let ck = rcgen::generate_simple_self_signed(vec![name.into()]).unwrap();
        Certificate::from_der(ck.cert.der()).unwrap()
    }

    #[test]
    fn self_signed_validates_against_itself() {
        let cert = self_signed("a");
        validate_certificate(&cert, &cert).unwrap();
        assert!(!is_expired(&cert));
        assert!(!is_not_yet_valid(&cert));
    }

    #[test]
    fn foreign_signature_rejected() {
        // Same default subject, different keys.
        let a = self_signed("a");
        let b = self_signed("b");
        assert_eq!(a.issuer(), b.subject());
        assert!(matches!(
            validate_certificate(&a, &b),
            Err(Error::SignatureVerification(_))
        ));
    }
}
