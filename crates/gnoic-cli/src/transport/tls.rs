//! rustls client configuration for gNOI targets.

use std::io::BufReader;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};

use crate::error::CliError;
use crate::target::{host_of, Target, TlsVersion};

/// Builds the client TLS configuration for `target`.
///
/// # Errors
///
/// Returns [`CliError::Config`] when PEM material cannot be read or parsed,
/// or when the version range is unsupported.
pub fn client_config(target: &Target) -> Result<ClientConfig, CliError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions = protocol_versions(target.tls_min_version, target.tls_max_version);

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&versions)
        .map_err(|e| CliError::config(format!("TLS versions: {e}")))?;

    let builder = if target.skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipVerify {
                algorithms: provider.signature_verification_algorithms,
            }))
    } else {
        builder.with_root_certificates(root_store(target)?)
    };

    let mut config = match (&target.tls_cert, &target.tls_key) {
        (Some(cert), Some(key)) => {
            let chain = parse_certs(&cert.load()?)?;
            let key = parse_key(&key.load()?)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| CliError::config(format!("client certificate: {e}")))?
        }
        _ => builder.with_no_client_auth(),
    };
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

/// Returns the name to verify the server certificate against.
///
/// # Errors
///
/// Returns [`CliError::Config`] when the name is neither a DNS name nor an
/// IP address.
pub fn server_name(target: &Target, address: &str) -> Result<ServerName<'static>, CliError> {
    let name = target
        .tls_server_name
        .clone()
        .unwrap_or_else(|| host_of(address).to_string());
    ServerName::try_from(name.clone())
        .map_err(|e| CliError::config(format!("invalid TLS server name {name:?}: {e}")))
}

fn protocol_versions(
    min: Option<TlsVersion>,
    max: Option<TlsVersion>,
) -> Vec<&'static rustls::SupportedProtocolVersion> {
    let min = min.unwrap_or(TlsVersion::V1_2);
    let max = max.unwrap_or(TlsVersion::V1_3);
    [
        (TlsVersion::V1_3, &rustls::version::TLS13),
        (TlsVersion::V1_2, &rustls::version::TLS12),
    ]
    .into_iter()
    .filter(|(v, _)| *v >= min && *v <= max)
    .map(|(_, version)| version)
    .collect()
}

fn root_store(target: &Target) -> Result<RootCertStore, CliError> {
    let mut roots = RootCertStore::empty();
    match &target.tls_ca {
        Some(ca) => {
            for cert in parse_certs(&ca.load()?)? {
                roots
                    .add(cert)
                    .map_err(|e| CliError::config(format!("tls-ca: {e}")))?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    Ok(roots)
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, CliError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::config(format!("invalid certificate PEM: {e}")))?;
    if certs.is_empty() {
        return Err(CliError::config("no certificate found in PEM input"));
    }
    Ok(certs)
}

fn parse_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, CliError> {
    rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(|e| CliError::config(format!("invalid key PEM: {e}")))?
        .ok_or_else(|| CliError::config("no private key found in PEM input"))
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct SkipVerify {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for SkipVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
