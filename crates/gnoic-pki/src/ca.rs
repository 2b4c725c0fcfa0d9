//! Local certificate authority: creation, loading and CSR signing.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
    DnType, ExtendedKeyUsagePurpose, Ia5String, IsCa, KeyPair, KeyUsagePurpose, SanType,
    SerialNumber, PKCS_RSA_SHA256,
};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tracing::{debug, info};

use crate::csr::Csr;
use crate::error::{Error, Result};
use crate::types::{
    decode_single_pem, Certificate, PrivateKey, SubjectAltName, PRIVATE_KEY_LABEL,
    RSA_PRIVATE_KEY_LABEL,
};
use crate::validation::validate_certificate;

/// Default CA key size in bits.
pub const DEFAULT_KEY_SIZE: usize = 2048;

/// Default validity of the CA certificate and of signed certificates.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(87_600 * 3600);

/// Subject and key parameters for a new CA.
#[derive(Debug, Clone)]
pub struct CaConfig {
    /// Subject common name.
    pub common_name: String,
    /// Subject organization.
    pub organization: String,
    /// Subject organizational unit.
    pub organizational_unit: String,
    /// Subject country.
    pub country: String,
    /// Subject state or province.
    pub state: String,
    /// Subject locality.
    pub locality: String,
    /// Subject street address.
    pub street_address: String,
    /// Subject postal code.
    pub postal_code: String,
    /// Email address, added as an rfc822 SAN.
    pub email: String,
    /// RSA key size in bits.
    pub key_size: usize,
    /// Certificate lifetime.
    pub validity: Duration,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            common_name: String::new(),
            organization: "OpenConfig".into(),
            organizational_unit: String::new(),
            country: String::new(),
            state: String::new(),
            locality: String::new(),
            street_address: String::new(),
            postal_code: String::new(),
            email: String::new(),
            key_size: DEFAULT_KEY_SIZE,
            validity: DEFAULT_VALIDITY,
        }
    }
}

impl CaConfig {
    fn distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        let fields = [
            (DnType::CountryName, &self.country),
            (DnType::StateOrProvinceName, &self.state),
            (DnType::LocalityName, &self.locality),
            (DnType::CustomDnType(vec![2, 5, 4, 9]), &self.street_address),
            (DnType::CustomDnType(vec![2, 5, 4, 17]), &self.postal_code),
            (DnType::OrganizationName, &self.organization),
            (DnType::OrganizationalUnitName, &self.organizational_unit),
            (DnType::CommonName, &self.common_name),
        ];
        for (ty, value) in fields {
            if !value.is_empty() {
                dn.push(ty, value.as_str());
            }
        }
        dn
    }
}

/// A CA certificate together with its signing key.
pub struct CertificateAuthority {
    cert: Certificate,
    key: PrivateKey,
    key_pair: KeyPair,
    issuer: rcgen::Certificate,
}

impl CertificateAuthority {
    /// Generates an RSA key and a self-signed CA certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the key size is unsupported or generation fails.
    pub fn create(config: &CaConfig) -> Result<Self> {
        if !(2048..=8192).contains(&config.key_size) {
            return Err(Error::Config(format!(
                "RSA key size {} outside 2048..=8192",
                config.key_size
            )));
        }
        info!(bits = config.key_size, "generating CA key");
        let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), config.key_size)
            .map_err(|e| Error::Generation(format!("failed to generate RSA key: {e}")))?;
        let (key, key_pair) = rsa_key_pair(&rsa_key)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = config.distinguished_name();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyCertSign,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        if !config.email.is_empty() {
            let email = Ia5String::try_from(config.email.clone())
                .map_err(|e| Error::San(format!("invalid email '{}': {e}", config.email)))?;
            params.subject_alt_names = vec![SanType::Rfc822Name(email)];
        }
        params.serial_number = Some(random_serial());
        let now = Utc::now();
        params.not_before = to_rcgen_time(now)?;
        params.not_after = to_rcgen_time(now + to_chrono(config.validity)?)?;

        let issuer = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Generation(format!("failed to self-sign CA: {e}")))?;
        let cert = Certificate::from_der(issuer.der())?;
        debug!(subject = cert.subject(), "CA certificate created");

        Ok(Self {
            cert,
            key,
            key_pair,
            issuer,
        })
    }

    /// Loads a CA from PEM certificate and key text.
    ///
    /// The key may be a PKCS#1 `RSA PRIVATE KEY` or a PKCS#8 `PRIVATE KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error when either input does not parse or the certificate
    /// is not a CA.
    pub fn load(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let cert = Certificate::from_pem(cert_pem)?;
        let key_text = std::str::from_utf8(key_pem)
            .map_err(|e| Error::Pem(format!("key is not UTF-8: {e}")))?;

        let (key, key_pair) = if decode_single_pem(key_pem, RSA_PRIVATE_KEY_LABEL).is_ok() {
            let rsa_key = RsaPrivateKey::from_pkcs1_pem(key_text)
                .map_err(|e| Error::Parse(format!("failed to parse RSA key: {e}")))?;
            rsa_key_pair(&rsa_key)?
        } else {
            decode_single_pem(key_pem, PRIVATE_KEY_LABEL)?;
            let key_pair = KeyPair::from_pem(key_text)
                .map_err(|e| Error::Parse(format!("failed to parse private key: {e}")))?;
            (PrivateKey::from_pem(key_text.to_string()), key_pair)
        };

        let params = CertificateParams::from_ca_cert_der(&cert.der().to_vec().into())
            .map_err(|e| Error::Parse(format!("failed to read CA parameters: {e}")))?;
        if !matches!(params.is_ca, IsCa::Ca(_)) {
            return Err(Error::Validation(format!(
                "{} is not a CA certificate",
                cert.subject()
            )));
        }
        let issuer = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Generation(format!("failed to rebuild issuer: {e}")))?;
        debug!(subject = cert.subject(), "CA loaded");

        Ok(Self {
            cert,
            key,
            key_pair,
            issuer,
        })
    }

    /// Reads the CA certificate and key from PEM files.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is unreadable or invalid.
    pub fn load_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert = fs::read(cert_path)?;
        let key = fs::read(key_path)?;
        Self::load(&cert, &key)
    }

    /// Writes the certificate and key as PEM; the key file is created with
    /// mode 0600.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn write_pem_files(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        fs::write(cert_path, self.cert.pem())?;
        write_private(key_path, self.key.pem().as_bytes())?;
        info!(cert = %cert_path.display(), key = %key_path.display(), "CA written");
        Ok(())
    }

    /// Returns the CA certificate.
    #[must_use]
    pub const fn certificate(&self) -> &Certificate {
        &self.cert
    }

    /// Returns the CA private key.
    #[must_use]
    pub const fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    /// Signs `csr` with this CA.
    ///
    /// The result carries the CSR's subject and names, a fresh random serial,
    /// and validity `now .. now + validity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request's key is unsupported or signing fails.
    pub fn sign_csr(&self, csr: &Csr, validity: Duration) -> Result<Certificate> {
        let mut request = CertificateSigningRequestParams::from_pem(&csr.pem())
            .map_err(|e| Error::Parse(format!("unsupported CSR: {e}")))?;

        let params = &mut request.params;
        params.is_ca = IsCa::NoCa;
        params.serial_number = Some(random_serial());
        let now = Utc::now();
        params.not_before = to_rcgen_time(now)?;
        params.not_after = to_rcgen_time(now + to_chrono(validity)?)?;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params.subject_alt_names = convert_sans(csr.san())?;
        params.use_authority_key_identifier_extension = true;

        let signed = request
            .signed_by(&self.issuer, &self.key_pair)
            .map_err(|e| Error::Generation(format!("failed to sign certificate: {e}")))?;
        let cert = Certificate::from_der(signed.der())?;
        validate_certificate(&cert, &self.cert)?;
        info!(subject = cert.subject(), serial = cert.serial(), "signed CSR");
        Ok(cert)
    }
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("cert", &self.cert)
            .field("key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Encodes an RSA key as PKCS#1 PEM and builds the matching rcgen signer.
fn rsa_key_pair(rsa_key: &RsaPrivateKey) -> Result<(PrivateKey, KeyPair)> {
    let pkcs1 = rsa_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| Error::Generation(format!("failed to encode RSA key: {e}")))?;
    let pkcs8 = rsa_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::Generation(format!("failed to encode RSA key: {e}")))?;
    let key_pair = KeyPair::from_pem_and_sign_algo(&pkcs8, &PKCS_RSA_SHA256)
        .map_err(|e| Error::Generation(format!("failed to load RSA signer: {e}")))?;
    Ok((PrivateKey::from_pem(pkcs1.to_string()), key_pair))
}

/// Returns a strictly positive random 128-bit serial number.
fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    // Clear the sign bit and keep the leading byte non-zero.
    bytes[0] = (bytes[0] & 0x7f).max(1);
    SerialNumber::from_slice(&bytes)
}

/// Converts `SubjectAltNames` to rcgen `SanTypes`.
fn convert_sans(sans: &[SubjectAltName]) -> Result<Vec<SanType>> {
    sans.iter()
        .map(|san| match san {
            SubjectAltName::Dns(dns) => {
                let ia5 = Ia5String::try_from(dns.clone())
                    .map_err(|e| Error::San(format!("invalid DNS name '{dns}': {e}")))?;
                Ok(SanType::DnsName(ia5))
            }
            SubjectAltName::Ip(ip) => Ok(SanType::IpAddress(*ip)),
            SubjectAltName::Email(email) => {
                let ia5 = Ia5String::try_from(email.clone())
                    .map_err(|e| Error::San(format!("invalid email '{email}': {e}")))?;
                Ok(SanType::Rfc822Name(ia5))
            }
            SubjectAltName::Uri(uri) => {
                let ia5 = Ia5String::try_from(uri.clone())
                    .map_err(|e| Error::San(format!("invalid URI '{uri}': {e}")))?;
                Ok(SanType::URI(ia5))
            }
        })
        .collect()
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| Error::Config(format!("validity out of range: {e}")))
}

/// Converts a chrono `DateTime` to rcgen `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Generation(format!("invalid timestamp: {e}")))
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its old mode on open.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    Ok(())
}
