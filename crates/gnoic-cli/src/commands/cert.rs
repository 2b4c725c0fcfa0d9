//! `cert` command implementation.
//!
//! Provides subcommands for:
//! - Creating a local CA (offline)
//! - Rotating and installing certificates signed by that CA
//! - The unary certificate management RPCs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gnoic_api::{build, GnoiOption};
use gnoic_pki::{CaConfig, CertificateAuthority, Csr};
use gnoic_proto::cert::{
    self, CanGenerateCsrRequest, CertificateInfo, GenerateCsrRequest,
    LoadCertificateAuthorityBundleRequest, LoadCertificateRequest, RevokeCertificatesResponse,
};
use serde::Serialize;
use tracing::{info, warn};

use super::{report, request, Context, Done};
use crate::cli::{
    CanGenerateCsrArgs, CertCommands, CreateCaArgs, CsrArgs, GenerateCsrArgs, GetCertsArgs,
    LoadArgs, LoadCaArgs, RevokeArgs, RotateArgs,
};
use crate::error::CliError;
use crate::invoke::cert::{self as invoke, Signed};
use crate::output::{rfc3339_nanos, OutputFormat, Table, TableDisplay, TargetRows};

/// Certificate command executor.
pub struct CertCommand {
    ctx: Context,
}

impl CertCommand {
    /// Create a new cert command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Execute a cert subcommand.
    ///
    /// # Errors
    ///
    /// Returns local setup errors before any RPC, or
    /// [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &CertCommands,
    ) -> Result<(), CliError> {
        match command {
            CertCommands::CreateCa(args) => create_ca(writer, format, args),
            CertCommands::GenerateCsr(args) => self.generate_csr(writer, format, args).await,
            CertCommands::Rotate(args) => self.rotate(writer, format, args, true).await,
            CertCommands::Install(args) => self.rotate(writer, format, args, false).await,
            CertCommands::Load(args) => self.load(writer, format, args).await,
            CertCommands::LoadCa(args) => self.load_ca(writer, format, args).await,
            CertCommands::GetCerts(args) => self.get_certs(writer, format, args).await,
            CertCommands::CanGenerateCsr(args) => self.can_generate_csr(writer, format, args).await,
            CertCommands::Revoke(args) => self.revoke(writer, format, args).await,
        }
    }

    async fn generate_csr<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &GenerateCsrArgs,
    ) -> Result<(), CliError> {
        let base = csr_request(&args.id, &args.csr)?;
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let request = invoke::with_target_defaults(base.clone(), first_address(&session));
                async move {
                    let pem = invoke::generate_csr(&session, request.clone()).await?;
                    let subject = Csr::from_pem(pem.as_bytes())?.subject().to_string();
                    Ok(GeneratedCsr {
                        id: request.certificate_id,
                        subject,
                        csr: pem,
                    })
                }
            })
            .await;

        if format.is_json() {
            return report(writer, format, entries, failed);
        }
        let mut entries = entries;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (target, csr) in &entries {
            writeln!(writer, "# {target} ({})", csr.subject)?;
            write!(writer, "{}", csr.csr)?;
        }
        crate::runner::summary(failed)
    }

    async fn rotate<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &RotateArgs,
        finalize: bool,
    ) -> Result<(), CliError> {
        let ca = Arc::new(load_ca_files(&args.ca_cert, &args.ca_key)?);
        let base = csr_request(&args.id, &args.csr)?;
        let validity = args.validity;
        let print_csr = args.print_csr;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let request = invoke::with_target_defaults(base.clone(), first_address(&session));
                let ca = Arc::clone(&ca);
                async move {
                    let signed = if finalize {
                        invoke::rotate(&session, request, &ca, validity).await?
                    } else {
                        invoke::install(&session, request, &ca, validity).await?
                    };
                    if print_csr {
                        info!(target = %session.name(), "received CSR:\n{}", signed.csr);
                    }
                    Ok(signed)
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn load<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &LoadArgs,
    ) -> Result<(), CliError> {
        let mut options = vec![
            GnoiOption::CertificateId(args.id.clone()),
            GnoiOption::Certificate(x509(read(&args.cert)?)?),
        ];
        if let Some(key) = &args.key {
            options.push(GnoiOption::PrivateKey(read(key)?));
        }
        for ca in &args.ca {
            options.push(GnoiOption::CaCertificate(x509(read(ca)?)?));
        }
        let request: LoadCertificateRequest = build(options)?;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let request = request.clone();
                async move {
                    invoke::load(&session, request).await?;
                    Ok(Done::new("certificate loaded"))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn load_ca<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &LoadCaArgs,
    ) -> Result<(), CliError> {
        let bundle = args
            .ca
            .iter()
            .map(|path| Ok(GnoiOption::CaCertificate(x509(read(path)?)?)))
            .collect::<Result<Vec<_>, CliError>>()?;
        let request: LoadCertificateAuthorityBundleRequest = build(bundle)?;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let request = request.clone();
                async move {
                    invoke::load_ca(&session, request).await?;
                    Ok(Done::new("CA bundle loaded"))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn get_certs<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &GetCertsArgs,
    ) -> Result<(), CliError> {
        let id = args.id.clone();
        let print_proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let id = id.clone();
                async move {
                    let infos = invoke::get_certificates(&session).await?;
                    let certificates = infos
                        .into_iter()
                        .filter(|info| id.as_deref().map_or(true, |id| info.certificate_id == id))
                        .map(|info| {
                            if print_proto {
                                crate::output::print_proto(session.name(), &info)?;
                            }
                            Ok(CertEntry::from_info(&info))
                        })
                        .collect::<Result<Vec<_>, CliError>>()?;
                    Ok(CertList { certificates })
                }
            })
            .await;
        if print_proto {
            return crate::runner::summary(failed);
        }
        report(writer, format, entries, failed)
    }

    async fn can_generate_csr<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &CanGenerateCsrArgs,
    ) -> Result<(), CliError> {
        let request: CanGenerateCsrRequest = build([
            GnoiOption::KeyType(args.key_type.clone()),
            GnoiOption::CertificateType(args.cert_type.clone()),
            GnoiOption::KeySize(args.key_size),
        ])?;
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let request = request.clone();
                async move {
                    let can_generate = invoke::can_generate_csr(&session, request).await?;
                    Ok(CanGenerate { can_generate })
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn revoke<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &RevokeArgs,
    ) -> Result<(), CliError> {
        let ids = (!args.all).then(|| args.id.clone());
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let ids = ids.clone();
                async move {
                    let response = invoke::revoke(&session, ids).await?;
                    Ok(Revoked::from(response))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }
}

fn first_address(session: &crate::transport::Session) -> &str {
    session
        .target()
        .addresses()
        .next()
        .unwrap_or(session.target().address.as_str())
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

fn x509(bytes: Vec<u8>) -> Result<cert::Certificate, CliError> {
    Ok(build([
        GnoiOption::CertificateType("CT_X509".into()),
        GnoiOption::CertificateBytes(bytes),
    ])?)
}

fn load_ca_files(cert: &Path, key: &Path) -> Result<CertificateAuthority, CliError> {
    CertificateAuthority::load_files(cert, key)
        .map_err(|e| CliError::config(format!("loading CA: {e}")))
}

/// Builds the GenerateCSR request shared by every target.
fn csr_request(id: &str, args: &CsrArgs) -> Result<GenerateCsrRequest, CliError> {
    let mut options = vec![
        GnoiOption::CertificateId(id.to_string()),
        GnoiOption::KeyType(args.key_type.clone()),
        GnoiOption::CertificateType(args.cert_type.clone()),
        GnoiOption::MinKeySize(args.min_key_size),
    ];
    let optional: [(&Option<String>, fn(String) -> GnoiOption); 8] = [
        (&args.common_name, GnoiOption::CommonName),
        (&args.country, GnoiOption::Country),
        (&args.state, GnoiOption::State),
        (&args.city, GnoiOption::City),
        (&args.org, GnoiOption::Organization),
        (&args.org_unit, GnoiOption::OrganizationalUnit),
        (&args.ip_address, GnoiOption::IpAddress),
        (&args.email_id, GnoiOption::EmailId),
    ];
    options.extend(
        optional
            .into_iter()
            .filter_map(|(value, option)| value.clone().map(option)),
    );
    request(options)
}

fn create_ca<W: Write>(
    writer: &mut W,
    format: &OutputFormat,
    args: &CreateCaArgs,
) -> Result<(), CliError> {
    let config = CaConfig {
        common_name: args.common_name.clone(),
        organization: args.org.clone(),
        organizational_unit: args.org_unit.clone(),
        country: args.country.clone(),
        state: args.state.clone(),
        locality: args.locality.clone(),
        street_address: args.street_address.clone(),
        postal_code: args.postal_code.clone(),
        email: args.email.clone(),
        key_size: args.key_size,
        validity: args.validity,
    };
    let ca = CertificateAuthority::create(&config)?;
    ca.write_pem_files(&args.cert_out, &args.key_out)?;
    let created = CreatedCa {
        subject: ca.certificate().subject().to_string(),
        not_after: ca.certificate().not_after().to_rfc3339(),
        cert: args.cert_out.clone(),
        key: args.key_out.clone(),
    };
    format.write(writer, &created)
}

/// A CA written to disk by `create-ca`.
#[derive(Debug, Clone, Serialize)]
struct CreatedCa {
    subject: String,
    not_after: String,
    cert: PathBuf,
    key: PathBuf,
}

impl TableDisplay for CreatedCa {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let mut table = Table::new(vec!["Subject", "Valid Until", "Certificate", "Key"]);
        table.push(vec![
            self.subject.clone(),
            self.not_after.clone(),
            self.cert.display().to_string(),
            self.key.display().to_string(),
        ]);
        table.write(writer)
    }
}

#[derive(Debug, Clone, Serialize)]
struct GeneratedCsr {
    id: String,
    subject: String,
    csr: String,
}

impl TargetRows for GeneratedCsr {
    const HEADERS: &'static [&'static str] = &["ID", "Subject"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.id.clone(), self.subject.clone()]]
    }
}

impl TargetRows for Signed {
    const HEADERS: &'static [&'static str] = &["ID", "Subject", "Serial", "Valid Until"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.id.clone(),
            self.subject.clone(),
            self.serial.clone(),
            self.not_after.clone(),
        ]]
    }
}

/// One installed certificate as reported by GetCertificates.
#[derive(Debug, Clone, Default, Serialize)]
struct CertEntry {
    id: String,
    modification_time: String,
    cert_type: String,
    version: Option<u32>,
    subject: String,
    not_before: String,
    not_after: String,
    ip_addresses: Vec<String>,
    endpoints: Vec<String>,
}

impl CertEntry {
    fn from_info(info: &CertificateInfo) -> Self {
        let mut entry = Self {
            id: info.certificate_id.clone(),
            modification_time: rfc3339_nanos(info.modification_time),
            cert_type: info
                .certificate
                .as_ref()
                .and_then(|c| cert::CertificateType::try_from(c.r#type).ok())
                .map(|t| t.as_str_name().to_string())
                .unwrap_or_default(),
            endpoints: info
                .endpoints
                .iter()
                .map(|ep| {
                    let kind = cert::endpoint::Type::try_from(ep.r#type)
                        .map_or_else(|_| ep.r#type.to_string(), |t| t.as_str_name().to_string());
                    format!("{kind}:{}", ep.endpoint)
                })
                .collect(),
            ..Self::default()
        };
        match invoke::parse_certificate(info) {
            Ok(Some(parsed)) => {
                entry.version = Some(parsed.version());
                entry.subject = parsed.subject().to_string();
                entry.not_before = parsed.not_before().to_rfc3339();
                entry.not_after = parsed.not_after().to_rfc3339();
                entry.ip_addresses = parsed
                    .ip_addresses()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
            }
            Ok(None) => {}
            Err(e) => warn!(id = %info.certificate_id, "cannot parse certificate: {e}"),
        }
        entry
    }
}

#[derive(Debug, Clone, Serialize)]
struct CertList {
    certificates: Vec<CertEntry>,
}

impl TargetRows for CertList {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Modification Time",
        "Type",
        "Version",
        "Subject",
        "Valid From",
        "Valid Until",
        "IP Addrs",
        "Endpoints",
    ];

    fn rows(&self) -> Vec<Vec<String>> {
        self.certificates
            .iter()
            .map(|c| {
                vec![
                    c.id.clone(),
                    c.modification_time.clone(),
                    c.cert_type.clone(),
                    c.version.map(|v| v.to_string()).unwrap_or_default(),
                    c.subject.clone(),
                    c.not_before.clone(),
                    c.not_after.clone(),
                    c.ip_addresses.join(", "),
                    c.endpoints.join(", "),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
struct CanGenerate {
    can_generate: bool,
}

impl TargetRows for CanGenerate {
    const HEADERS: &'static [&'static str] = &["Can Generate"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.can_generate.to_string()]]
    }
}

#[derive(Debug, Clone, Serialize)]
struct Revocation {
    id: String,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Revoked {
    certificates: Vec<Revocation>,
}

impl From<RevokeCertificatesResponse> for Revoked {
    fn from(response: RevokeCertificatesResponse) -> Self {
        let revoked = response
            .revoked_certificate_id
            .into_iter()
            .map(|id| Revocation { id, error: None });
        let errors = response
            .certificate_revocation_error
            .into_iter()
            .map(|e| Revocation {
                id: e.certificate_id,
                error: Some(e.error_message),
            });
        Self {
            certificates: revoked.chain(errors).collect(),
        }
    }
}

impl TargetRows for Revoked {
    const HEADERS: &'static [&'static str] = &["ID", "Result"];

    fn rows(&self) -> Vec<Vec<String>> {
        self.certificates
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.error
                        .as_ref()
                        .map_or_else(|| "revoked".to_string(), |e| format!("error: {e}")),
                ]
            })
            .collect()
    }
}
