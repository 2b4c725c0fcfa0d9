//! Certificate management: the Rotate and Install streams plus the unary
//! helpers around them.

use std::net::IpAddr;
use std::time::Duration;

use gnoic_api::{build, GnoiOption};
use gnoic_pki::{Certificate, CertificateAuthority, Csr};
use gnoic_proto::cert::{
    self, install_certificate_request, install_certificate_response,
    rotate_certificate_request, rotate_certificate_response, CanGenerateCsrRequest,
    CertificateInfo, GenerateCsrRequest, GenerateCsrResponse, GetCertificatesRequest,
    InstallCertificateRequest, LoadCertificateAuthorityBundleRequest, LoadCertificateRequest,
    RevokeCertificatesRequest, RevokeCertificatesResponse, RotateCertificateRequest,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CliError;
use crate::stream::BidiStream;
use crate::target::host_of;
use crate::transport::Session;

/// Fills the CSR common name and IP address from the target when unset.
///
/// The common name defaults to the target host; the IP address does too
/// when the host is a literal address.
#[must_use]
pub fn with_target_defaults(mut request: GenerateCsrRequest, address: &str) -> GenerateCsrRequest {
    let host = host_of(address);
    let params = request.csr_params.get_or_insert_with(Default::default);
    if params.common_name.is_empty() {
        params.common_name = host.to_string();
    }
    if params.ip_address.is_empty() && host.parse::<IpAddr>().is_ok() {
        params.ip_address = host.to_string();
    }
    request
}

/// A certificate signed locally and accepted by the target.
#[derive(Debug, Clone, Serialize)]
pub struct Signed {
    /// Certificate identifier on the target.
    pub id: String,
    /// Subject taken from the device CSR.
    pub subject: String,
    /// Serial of the new certificate.
    pub serial: String,
    /// Expiry of the new certificate.
    pub not_after: String,
    /// The CSR the device generated, as PEM.
    #[serde(skip)]
    pub csr: String,
}

fn csr_from_response(response: GenerateCsrResponse) -> Result<Csr, CliError> {
    let csr = response
        .csr
        .ok_or_else(|| CliError::protocol("generated CSR response carries no CSR"))?;
    Ok(Csr::from_pem(&csr.csr)?)
}

fn load_request(
    id: &str,
    signed: &Certificate,
    ca: &CertificateAuthority,
) -> Result<LoadCertificateRequest, CliError> {
    let certificate = |pem: String| -> Result<cert::Certificate, CliError> {
        Ok(build([
            GnoiOption::CertificateType("CT_X509".into()),
            GnoiOption::CertificateBytes(pem.into_bytes()),
        ])?)
    };
    Ok(build([
        GnoiOption::CertificateId(id.to_string()),
        GnoiOption::Certificate(certificate(signed.pem())?),
        GnoiOption::CaCertificate(certificate(ca.certificate().pem())?),
    ])?)
}

fn signed_outcome(id: &str, csr: &Csr, cert: &Certificate) -> Signed {
    Signed {
        id: id.to_string(),
        subject: cert.subject().to_string(),
        serial: cert.serial().to_string(),
        not_after: cert.not_after().to_rfc3339(),
        csr: csr.pem(),
    }
}

/// Replaces an existing certificate with one signed by `ca`.
///
/// Drives GenerateCSR, LoadCertificate and FinalizeRotation in order, then
/// reads the stream to its end so a status sent after finalize still fails
/// the rotation. Errors leave rollback to the device.
///
/// # Errors
///
/// Fails on RPC errors, on responses out of sequence, on a CSR that does not
/// parse, and when signing fails.
pub async fn rotate(
    session: &Session,
    generate: GenerateCsrRequest,
    ca: &CertificateAuthority,
    validity: Duration,
) -> Result<Signed, CliError> {
    use rotate_certificate_response::RotateResponse;

    let id = generate.certificate_id.clone();
    let first: RotateCertificateRequest = build([GnoiOption::GenerateCsr(generate)])?;
    let mut client = session.cert();
    let mut stream = BidiStream::open(session.cancel_token(), first, move |rx| async move {
        client.rotate(rx).await
    })
    .await?;

    let csr = match stream.expect("generated CSR").await?.rotate_response {
        Some(RotateResponse::GeneratedCsr(response)) => csr_from_response(response)?,
        other => return Err(unexpected("generated CSR", other)),
    };
    debug!(target = %session.name(), subject = csr.subject(), "received CSR");
    let signed = ca.sign_csr(&csr, validity)?;

    stream
        .send(RotateCertificateRequest {
            rotate_request: Some(rotate_certificate_request::RotateRequest::LoadCertificate(
                load_request(&id, &signed, ca)?,
            )),
        })
        .await?;
    match stream.expect("load certificate ack").await?.rotate_response {
        Some(RotateResponse::LoadCertificate(_)) => {}
        other => return Err(unexpected("load certificate ack", other)),
    }

    stream
        .send(build([GnoiOption::FinalizeRotation])?)
        .await?;
    stream.finish().await?;
    info!(target = %session.name(), id, serial = signed.serial(), "certificate rotated");
    Ok(signed_outcome(&id, &csr, &signed))
}

/// Installs a first certificate signed by `ca`.
///
/// Drives GenerateCSR then LoadCertificate; there is no finalize step.
///
/// # Errors
///
/// As [`rotate`].
pub async fn install(
    session: &Session,
    generate: GenerateCsrRequest,
    ca: &CertificateAuthority,
    validity: Duration,
) -> Result<Signed, CliError> {
    use install_certificate_response::InstallResponse;

    let id = generate.certificate_id.clone();
    let first: InstallCertificateRequest = build([GnoiOption::GenerateCsr(generate)])?;
    let mut client = session.cert();
    let mut stream = BidiStream::open(session.cancel_token(), first, move |rx| async move {
        client.install(rx).await
    })
    .await?;

    let csr = match stream.expect("generated CSR").await?.install_response {
        Some(InstallResponse::GeneratedCsr(response)) => csr_from_response(response)?,
        other => return Err(unexpected("generated CSR", other)),
    };
    let signed = ca.sign_csr(&csr, validity)?;

    stream
        .send(InstallCertificateRequest {
            install_request: Some(install_certificate_request::InstallRequest::LoadCertificate(
                load_request(&id, &signed, ca)?,
            )),
        })
        .await?;
    match stream.expect("load certificate ack").await?.install_response {
        Some(InstallResponse::LoadCertificate(_)) => {}
        other => return Err(unexpected("load certificate ack", other)),
    }
    stream.finish().await?;
    info!(target = %session.name(), id, serial = signed.serial(), "certificate installed");
    Ok(signed_outcome(&id, &csr, &signed))
}

fn unexpected<T: std::fmt::Debug>(expected: &str, got: Option<T>) -> CliError {
    match got {
        Some(got) => CliError::protocol(format!("expected {expected}, got {got:?}")),
        None => CliError::protocol(format!("expected {expected}, got an empty response")),
    }
}

/// Asks the target for a CSR and returns it as PEM.
///
/// # Errors
///
/// Fails on RPC errors and on a response without a CSR.
pub async fn generate_csr(session: &Session, request: GenerateCsrRequest) -> Result<String, CliError> {
    let response = session.unary(session.cert().generate_csr(request)).await?;
    let csr = response
        .csr
        .ok_or_else(|| CliError::protocol("generated CSR response carries no CSR"))?;
    String::from_utf8(csr.csr).map_err(|e| CliError::protocol(format!("CSR is not PEM text: {e}")))
}

/// Loads a certificate, key and CA chain built from local files.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn load(session: &Session, request: LoadCertificateRequest) -> Result<(), CliError> {
    session.unary(session.cert().load_certificate(request)).await?;
    Ok(())
}

/// Loads a CA bundle.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn load_ca(
    session: &Session,
    request: LoadCertificateAuthorityBundleRequest,
) -> Result<(), CliError> {
    session
        .unary(session.cert().load_certificate_authority_bundle(request))
        .await?;
    Ok(())
}

/// Lists the certificates installed on the target.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn get_certificates(session: &Session) -> Result<Vec<CertificateInfo>, CliError> {
    let response = session
        .unary(session.cert().get_certificates(GetCertificatesRequest {}))
        .await?;
    Ok(response.certificate_info)
}

/// Asks whether the target can generate a CSR with the given parameters.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn can_generate_csr(
    session: &Session,
    request: CanGenerateCsrRequest,
) -> Result<bool, CliError> {
    let response = session.unary(session.cert().can_generate_csr(request)).await?;
    Ok(response.can_generate)
}

/// Revokes `ids`; with `None`, revokes every installed certificate.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn revoke(
    session: &Session,
    ids: Option<Vec<String>>,
) -> Result<RevokeCertificatesResponse, CliError> {
    let ids = match ids {
        Some(ids) => ids,
        None => get_certificates(session)
            .await?
            .into_iter()
            .map(|info| info.certificate_id)
            .collect(),
    };
    if ids.is_empty() {
        return Ok(RevokeCertificatesResponse::default());
    }
    let request: RevokeCertificatesRequest =
        build(ids.into_iter().map(GnoiOption::CertificateId))?;
    Ok(session.unary(session.cert().revoke_certificates(request)).await?)
}

/// Parses the X.509 certificate carried by a `CertificateInfo`.
///
/// # Errors
///
/// Returns [`CliError::Pki`] when the bytes are neither PEM nor DER.
pub fn parse_certificate(info: &CertificateInfo) -> Result<Option<Certificate>, CliError> {
    let Some(certificate) = info.certificate.as_ref() else {
        return Ok(None);
    };
    let bytes = &certificate.certificate;
    let parsed = if bytes.starts_with(b"-----BEGIN") {
        Certificate::from_pem(bytes)?
    } else {
        Certificate::from_der(bytes)?
    };
    Ok(Some(parsed))
}
