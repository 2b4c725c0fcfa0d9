//! Option-based construction of gNOI request messages.
//!
//! Every settable field across the gNOI request families is reachable through
//! one [`GnoiOption`] value. A message type opts in to the fields it carries by
//! implementing [`Configurable`]; applying an option the message does not
//! carry fails with [`ApiError::InvalidMessageType`].
//!
//! ```
//! use gnoic_api::options::{build, GnoiOption};
//! use gnoic_proto::system::RebootRequest;
//!
//! let req: RebootRequest = build([
//!     GnoiOption::RebootMethod("warm".into()),
//!     GnoiOption::Message("maintenance".into()),
//!     GnoiOption::Subcomponent("/components/component[name=LC1]".into()),
//! ])
//! .unwrap();
//! assert_eq!(req.subcomponents.len(), 1);
//! ```
//!
//! Some wrapper messages also accept the options of the message they wrap and
//! create it on first use: `CommonName` applied to a `GenerateCsrRequest`
//! lands in its `csr_params`, `Username` applied to a
//! `TransferToRemoteRequest` lands in `remote_download.credentials`.

use gnoic_proto::{
    cert, common, factory_reset, file, healthz, os, reflection, system,
    types::{self, HashType, L3Protocol},
};
use prost::Name;

use crate::error::{ApiError, Result};
use crate::hash::HashMethod;
use crate::path::parse_path;
use crate::perm::octal_to_decimal;

macro_rules! gnoi_options {
    ($( $(#[$doc:meta])* $variant:ident $( ( $ty:ty ) )? => $name:literal, )*) => {
        /// A single field assignment, applicable to every message that
        /// carries the field.
        #[derive(Debug, Clone, PartialEq)]
        #[non_exhaustive]
        pub enum GnoiOption {
            $( $(#[$doc])* $variant $( ( $ty ) )?, )*
        }

        impl GnoiOption {
            /// Option name used in error messages.
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant { .. } => $name, )*
                }
            }
        }
    };
}

gnoi_options! {
    /// Certificate identifier; appends on `RevokeCertificatesRequest`.
    CertificateId(String) => "certificate-id",
    /// Certificate type token (`CT_X509`, `x509`).
    CertificateType(String) => "certificate-type",
    /// Key type token (`KT_RSA`, `rsa`).
    KeyType(String) => "key-type",
    /// Minimum key size for CSR generation.
    MinKeySize(u32) => "min-key-size",
    /// Key size probed by `CanGenerateCSR`.
    KeySize(u32) => "key-size",
    /// CSR subject common name.
    CommonName(String) => "common-name",
    /// CSR subject country.
    Country(String) => "country",
    /// CSR subject state.
    State(String) => "state",
    /// CSR subject city.
    City(String) => "city",
    /// CSR subject organization.
    Organization(String) => "organization",
    /// CSR subject organizational unit.
    OrganizationalUnit(String) => "organizational-unit",
    /// CSR IP address SAN.
    IpAddress(String) => "ip-address",
    /// CSR email.
    EmailId(String) => "email-id",
    /// Complete CSR parameters.
    CsrParams(cert::CsrParams) => "csr-params",
    /// Complete certificate message.
    Certificate(cert::Certificate) => "certificate",
    /// Raw certificate bytes (PEM).
    CertificateBytes(Vec<u8>) => "certificate-bytes",
    /// CA certificate; appends.
    CaCertificate(cert::Certificate) => "ca-certificate",
    /// Complete key pair.
    KeyPair(cert::KeyPair) => "key-pair",
    /// Private key bytes.
    PrivateKey(Vec<u8>) => "private-key",
    /// Public key bytes.
    PublicKey(Vec<u8>) => "public-key",
    /// Rotate/Install first step.
    GenerateCsr(cert::GenerateCsrRequest) => "generate-csr",
    /// Rotate/Install load step.
    LoadCertificate(cert::LoadCertificateRequest) => "load-certificate",
    /// Rotate final step.
    FinalizeRotation => "finalize-rotation",

    /// Path of a file on the device.
    RemoteFile(String) => "remote-file",
    /// Path to stat on the device.
    FilePath(String) => "file-path",
    /// Local path on the device for `TransferToRemote`.
    LocalPath(String) => "local-path",
    /// Permissions as octal digits (`644`).
    Permissions(u32) => "permissions",
    /// File, package or OS image contents.
    Contents(Vec<u8>) => "contents",
    /// Complete hash message.
    Hash(HashType) => "hash",
    /// Hash method token (`md5`, `sha256`, `sha512`).
    HashMethod(String) => "hash-method",
    /// Raw digest bytes.
    HashValue(Vec<u8>) => "hash-value",
    /// Complete remote download descriptor.
    RemoteDownload(common::RemoteDownload) => "remote-download",
    /// Remote download protocol token (`sftp`, `scp`, `http`, `https`).
    Protocol(String) => "protocol",
    /// Complete credentials.
    Credentials(types::Credentials) => "credentials",
    /// Credentials username.
    Username(String) => "username",
    /// Credentials cleartext password.
    Password(String) => "password",
    /// Source address for a remote download.
    SourceAddress(String) => "source-address",
    /// Source VRF for a remote download.
    SourceVrf(String) => "source-vrf",
    /// Remote path (`host:path` or URL) for a remote download.
    RemotePath(String) => "remote-path",

    /// Ping/traceroute destination.
    Destination(String) => "destination",
    /// Ping/traceroute source.
    Source(String) => "source",
    /// Ping count.
    Count(i32) => "count",
    /// Ping interval in nanoseconds.
    Interval(i64) => "interval",
    /// Ping/traceroute wait in nanoseconds.
    Wait(i64) => "wait",
    /// Ping payload size.
    Size(i32) => "size",
    /// Set the DF bit.
    DoNotFragment(bool) => "do-not-fragment",
    /// Skip name resolution.
    DoNotResolve(bool) => "do-not-resolve",
    /// L3 protocol token (`ipv4`, `v6`).
    L3Protocol(String) => "l3-protocol",
    /// L4 protocol token (`icmp`, `tcp`, `udp`).
    L4Protocol(String) => "l4-protocol",
    /// Network instance.
    NetworkInstance(String) => "network-instance",
    /// Traceroute initial TTL.
    InitialTtl(u32) => "initial-ttl",
    /// Traceroute max TTL.
    MaxTtl(i32) => "max-ttl",
    /// Skip AS lookup.
    DoNotLookupAsn(bool) => "do-not-lookup-asn",
    /// Reboot method token (`COLD`, `POWERDOWN`, `HALT`, `WARM`, `POWERUP`).
    RebootMethod(String) => "reboot-method",
    /// Reboot delay in nanoseconds.
    Delay(u64) => "delay",
    /// Free-form message.
    Message(String) => "message",
    /// Subcomponent XPath; appends.
    Subcomponent(String) => "subcomponent",
    /// Force the operation.
    Force(bool) => "force",
    /// Control processor XPath.
    ControlProcessor(String) => "control-processor",
    /// Process id.
    Pid(u32) => "pid",
    /// Process name.
    ProcessName(String) => "process-name",
    /// Kill signal token (`TERM`, `KILL`, `HUP`).
    Signal(String) => "signal",
    /// Restart the process after killing it.
    Restart(bool) => "restart",
    /// Package file name.
    Filename(String) => "filename",
    /// Package or OS version.
    Version(String) => "version",
    /// Activate the package after install.
    Activate(bool) => "activate",
    /// Complete package descriptor.
    Package(system::Package) => "package",

    /// Target the standby supervisor.
    StandbySupervisor(bool) => "standby-supervisor",
    /// Activate without reboot.
    NoReboot(bool) => "no-reboot",
    /// Complete OS transfer request.
    TransferRequest(os::TransferRequest) => "transfer-request",
    /// OS transfer end marker.
    TransferEnd => "transfer-end",

    /// Healthz component XPath.
    ComponentPath(String) => "component-path",
    /// Healthz status or artifact id.
    Id(String) => "id",
    /// Healthz check event id.
    EventId(String) => "event-id",
    /// Include acknowledged statuses in a list.
    IncludeAcknowledged(bool) => "include-acknowledged",

    /// Reinstall the factory OS.
    FactoryOs(bool) => "factory-os",
    /// Zero-fill persistent storage.
    ZeroFill(bool) => "zero-fill",
    /// Keep installed certificates.
    RetainCerts(bool) => "retain-certs",

    /// Reflection service listing filter (`*` for all).
    ListServices(String) => "list-services",
    /// Reflection host.
    Host(String) => "host",
}

/// A message that accepts [`GnoiOption`]s.
pub trait Configurable: Name {
    /// Applies one option.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidMessageType`] when the message does not
    /// carry the option's field, or a value error when the option's payload
    /// does not parse.
    fn apply(&mut self, option: GnoiOption) -> Result<()>;
}

/// Builds a message by applying `options` left to right to its default.
///
/// # Errors
///
/// Returns the error of the first option that fails; later options are not
/// applied.
pub fn build<M>(options: impl IntoIterator<Item = GnoiOption>) -> Result<M>
where
    M: Configurable + Default,
{
    let mut msg = M::default();
    configure(&mut msg, options)?;
    Ok(msg)
}

/// Applies `options` left to right to an existing message.
///
/// # Errors
///
/// Returns the error of the first option that fails.
pub fn configure<M: Configurable>(
    msg: &mut M,
    options: impl IntoIterator<Item = GnoiOption>,
) -> Result<()> {
    for option in options {
        msg.apply(option)?;
    }
    Ok(())
}

fn mismatch<M: Name>(option: &GnoiOption) -> ApiError {
    ApiError::InvalidMessageType {
        option: option.name(),
        message: M::full_name(),
    }
}

/// Applies `option` to the optional nested message, creating it first.
fn nested<M: Configurable + Default>(slot: &mut Option<M>, option: GnoiOption) -> Result<()> {
    slot.get_or_insert_with(M::default).apply(option)
}

/// Upper-cases `token` and looks it up as-is, then behind each prefix.
fn enum_token<E>(
    field: &'static str,
    token: &str,
    prefixes: &[&str],
    lookup: impl Fn(&str) -> Option<E>,
) -> Result<E> {
    let upper = token.trim().to_ascii_uppercase();
    if let Some(value) = lookup(&upper) {
        return Ok(value);
    }
    prefixes
        .iter()
        .find_map(|prefix| lookup(&format!("{prefix}{upper}")))
        .ok_or_else(|| ApiError::invalid_value(field, token))
}

/// Parses a certificate type token.
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for unknown tokens.
pub fn certificate_type(token: &str) -> Result<cert::CertificateType> {
    enum_token("certificate type", token, &["CT_"], |s| {
        cert::CertificateType::from_str_name(s)
    })
}

/// Parses a key type token.
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for unknown tokens.
pub fn key_type(token: &str) -> Result<cert::KeyType> {
    enum_token("key type", token, &["KT_"], cert::KeyType::from_str_name)
}

/// Parses a remote download protocol token.
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for unknown tokens.
pub fn protocol(token: &str) -> Result<common::remote_download::Protocol> {
    enum_token(
        "protocol",
        token,
        &[],
        common::remote_download::Protocol::from_str_name,
    )
}

/// Parses a reboot method token; only `COLD`, `POWERDOWN`, `HALT`, `WARM`
/// and `POWERUP` are accepted.
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for any other token.
pub fn reboot_method(token: &str) -> Result<system::RebootMethod> {
    use system::RebootMethod as M;
    enum_token("reboot method", token, &[], |s| {
        M::from_str_name(s)
            .filter(|m| matches!(m, M::Cold | M::Powerdown | M::Halt | M::Warm | M::Powerup))
    })
}

/// Parses a kill signal token; `TERM`, `KILL` and `HUP` are accepted, with an
/// optional `SIG` or `SIGNAL_` prefix.
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for any other token.
pub fn signal(token: &str) -> Result<system::kill_process_request::Signal> {
    use system::kill_process_request::Signal as S;
    let upper = token.trim().to_ascii_uppercase();
    let bare = upper
        .strip_prefix("SIGNAL_")
        .or_else(|| upper.strip_prefix("SIG"))
        .unwrap_or(&upper);
    enum_token("signal", bare, &["SIGNAL_"], |s| {
        S::from_str_name(s).filter(|sig| matches!(sig, S::Term | S::Kill | S::Hup))
    })
    .map_err(|_| ApiError::invalid_value("signal", token))
}

/// Parses an L3 protocol token (`ipv4`, `v4`, `ipv6`, `v6`).
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for unknown tokens.
pub fn l3_protocol(token: &str) -> Result<L3Protocol> {
    enum_token("l3 protocol", token, &["IP"], L3Protocol::from_str_name)
}

/// Parses a traceroute L4 protocol token.
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] for unknown tokens.
pub fn l4_protocol(token: &str) -> Result<system::traceroute_request::L4Protocol> {
    enum_token(
        "l4 protocol",
        token,
        &[],
        system::traceroute_request::L4Protocol::from_str_name,
    )
}

fn hash_method(token: &str) -> Result<i32> {
    Ok(token.parse::<HashMethod>()?.to_proto() as i32)
}

fn permissions(digits: u32) -> Result<u32> {
    octal_to_decimal(digits)?;
    Ok(digits)
}

// Certificate management.

impl Configurable for cert::CsrParams {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CertificateType(t) => self.r#type = certificate_type(&t)? as i32,
            GnoiOption::KeyType(t) => self.key_type = key_type(&t)? as i32,
            GnoiOption::MinKeySize(v) => self.min_key_size = v,
            GnoiOption::CommonName(v) => self.common_name = v,
            GnoiOption::Country(v) => self.country = v,
            GnoiOption::State(v) => self.state = v,
            GnoiOption::City(v) => self.city = v,
            GnoiOption::Organization(v) => self.organization = v,
            GnoiOption::OrganizationalUnit(v) => self.organizational_unit = v,
            GnoiOption::IpAddress(v) => self.ip_address = v,
            GnoiOption::EmailId(v) => self.email_id = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::GenerateCsrRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CertificateId(v) => self.certificate_id = v,
            GnoiOption::CsrParams(p) => self.csr_params = Some(p),
            opt @ (GnoiOption::CertificateType(_)
            | GnoiOption::KeyType(_)
            | GnoiOption::MinKeySize(_)
            | GnoiOption::CommonName(_)
            | GnoiOption::Country(_)
            | GnoiOption::State(_)
            | GnoiOption::City(_)
            | GnoiOption::Organization(_)
            | GnoiOption::OrganizationalUnit(_)
            | GnoiOption::IpAddress(_)
            | GnoiOption::EmailId(_)) => nested(&mut self.csr_params, opt)?,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::Certificate {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CertificateType(t) => self.r#type = certificate_type(&t)? as i32,
            GnoiOption::CertificateBytes(v) => self.certificate = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::KeyPair {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::PrivateKey(v) => self.private_key = v,
            GnoiOption::PublicKey(v) => self.public_key = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::LoadCertificateRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CertificateId(v) => self.certificate_id = v,
            GnoiOption::Certificate(c) => self.certificate = Some(c),
            GnoiOption::KeyPair(k) => self.key_pair = Some(k),
            GnoiOption::CaCertificate(c) => self.ca_certificates.push(c),
            opt @ (GnoiOption::PrivateKey(_) | GnoiOption::PublicKey(_)) => {
                nested(&mut self.key_pair, opt)?;
            }
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::LoadCertificateAuthorityBundleRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CaCertificate(c) => self.ca_certificates.push(c),
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::CanGenerateCsrRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CertificateType(t) => {
                self.certificate_type = certificate_type(&t)? as i32;
            }
            GnoiOption::KeyType(t) => self.key_type = key_type(&t)? as i32,
            GnoiOption::KeySize(v) => self.key_size = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::RevokeCertificatesRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::CertificateId(v) => self.certificate_id.push(v),
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for cert::GetCertificatesRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        Err(mismatch::<Self>(&option))
    }
}

impl Configurable for cert::RotateCertificateRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        use cert::rotate_certificate_request::RotateRequest;
        self.rotate_request = Some(match option {
            GnoiOption::GenerateCsr(r) => RotateRequest::GenerateCsr(r),
            GnoiOption::LoadCertificate(r) => RotateRequest::LoadCertificate(r),
            GnoiOption::FinalizeRotation => RotateRequest::FinalizeRotation(cert::FinalizeRequest {}),
            other => return Err(mismatch::<Self>(&other)),
        });
        Ok(())
    }
}

impl Configurable for cert::InstallCertificateRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        use cert::install_certificate_request::InstallRequest;
        self.install_request = Some(match option {
            GnoiOption::GenerateCsr(r) => InstallRequest::GenerateCsr(r),
            GnoiOption::LoadCertificate(r) => InstallRequest::LoadCertificate(r),
            other => return Err(mismatch::<Self>(&other)),
        });
        Ok(())
    }
}

// File service.

impl Configurable for types::HashType {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::HashMethod(t) => self.method = hash_method(&t)?,
            GnoiOption::HashValue(v) => self.hash = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for types::Credentials {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Username(v) => self.username = v,
            GnoiOption::Password(v) => {
                self.password = Some(types::credentials::Password::Cleartext(v));
            }
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for common::RemoteDownload {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::RemotePath(v) => self.path = v,
            GnoiOption::Protocol(t) => self.protocol = protocol(&t)? as i32,
            GnoiOption::Credentials(c) => self.credentials = Some(c),
            opt @ (GnoiOption::Username(_) | GnoiOption::Password(_)) => {
                nested(&mut self.credentials, opt)?;
            }
            GnoiOption::SourceAddress(v) => self.source_address = v,
            GnoiOption::SourceVrf(v) => self.source_vrf = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for file::GetRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::RemoteFile(v) => self.remote_file = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for file::put_request::Details {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::RemoteFile(v) => self.remote_file = v,
            GnoiOption::Permissions(v) => self.permissions = permissions(v)?,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for file::PutRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        use file::put_request::Request;
        match option {
            GnoiOption::Contents(v) => self.request = Some(Request::Contents(v)),
            GnoiOption::Hash(h) => self.request = Some(Request::Hash(h)),
            opt @ (GnoiOption::RemoteFile(_) | GnoiOption::Permissions(_)) => {
                let mut details = match self.request.take() {
                    Some(Request::Open(d)) => d,
                    _ => file::put_request::Details::default(),
                };
                let applied = details.apply(opt);
                self.request = Some(Request::Open(details));
                applied?;
            }
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for file::StatRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::FilePath(v) => self.path = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for file::RemoveRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::RemoteFile(v) => self.remote_file = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for file::TransferToRemoteRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::LocalPath(v) => self.local_path = v,
            GnoiOption::RemoteDownload(r) => self.remote_download = Some(r),
            opt @ (GnoiOption::RemotePath(_)
            | GnoiOption::Protocol(_)
            | GnoiOption::Credentials(_)
            | GnoiOption::Username(_)
            | GnoiOption::Password(_)
            | GnoiOption::SourceAddress(_)
            | GnoiOption::SourceVrf(_)) => nested(&mut self.remote_download, opt)?,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

// System service.

impl Configurable for system::PingRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Destination(v) => self.destination = v,
            GnoiOption::Source(v) => self.source = v,
            GnoiOption::Count(v) => self.count = v,
            GnoiOption::Interval(v) => self.interval = v,
            GnoiOption::Wait(v) => self.wait = v,
            GnoiOption::Size(v) => self.size = v,
            GnoiOption::DoNotFragment(v) => self.do_not_fragment = v,
            GnoiOption::DoNotResolve(v) => self.do_not_resolve = v,
            GnoiOption::L3Protocol(t) => self.l3protocol = l3_protocol(&t)? as i32,
            GnoiOption::NetworkInstance(v) => self.network_instance = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::TracerouteRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Destination(v) => self.destination = v,
            GnoiOption::Source(v) => self.source = v,
            GnoiOption::InitialTtl(v) => self.initial_ttl = v,
            GnoiOption::MaxTtl(v) => self.max_ttl = v,
            GnoiOption::Wait(v) => self.wait = v,
            GnoiOption::DoNotFragment(v) => self.do_not_fragment = v,
            GnoiOption::DoNotResolve(v) => self.do_not_resolve = v,
            GnoiOption::L3Protocol(t) => self.l3protocol = l3_protocol(&t)? as i32,
            GnoiOption::L4Protocol(t) => self.l4protocol = l4_protocol(&t)? as i32,
            GnoiOption::DoNotLookupAsn(v) => self.do_not_lookup_asn = v,
            GnoiOption::NetworkInstance(v) => self.network_instance = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::TimeRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        Err(mismatch::<Self>(&option))
    }
}

impl Configurable for system::RebootRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::RebootMethod(t) => self.method = reboot_method(&t)? as i32,
            GnoiOption::Delay(v) => self.delay = v,
            GnoiOption::Message(v) => self.message = v,
            GnoiOption::Subcomponent(p) => self.subcomponents.push(parse_path(&p)?),
            GnoiOption::Force(v) => self.force = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::CancelRebootRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Message(v) => self.message = v,
            GnoiOption::Subcomponent(p) => self.subcomponents.push(parse_path(&p)?),
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::RebootStatusRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Subcomponent(p) => self.subcomponents.push(parse_path(&p)?),
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::SwitchControlProcessorRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::ControlProcessor(p) => self.control_processor = Some(parse_path(&p)?),
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::KillProcessRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Pid(v) => self.pid = v,
            GnoiOption::ProcessName(v) => self.name = v,
            GnoiOption::Signal(t) => self.signal = signal(&t)? as i32,
            GnoiOption::Restart(v) => self.restart = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::Package {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Filename(v) => self.filename = v,
            GnoiOption::Version(v) => self.version = v,
            GnoiOption::Activate(v) => self.activate = v,
            GnoiOption::RemoteDownload(r) => self.remote_download = Some(r),
            opt @ (GnoiOption::RemotePath(_)
            | GnoiOption::Protocol(_)
            | GnoiOption::Credentials(_)
            | GnoiOption::Username(_)
            | GnoiOption::Password(_)
            | GnoiOption::SourceAddress(_)
            | GnoiOption::SourceVrf(_)) => nested(&mut self.remote_download, opt)?,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for system::SetPackageRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        use system::set_package_request::Request;
        match option {
            GnoiOption::Package(p) => self.request = Some(Request::Package(p)),
            GnoiOption::Contents(v) => self.request = Some(Request::Contents(v)),
            GnoiOption::Hash(h) => self.request = Some(Request::Hash(h)),
            opt @ (GnoiOption::Filename(_)
            | GnoiOption::Version(_)
            | GnoiOption::Activate(_)
            | GnoiOption::RemoteDownload(_)) => {
                let mut package = match self.request.take() {
                    Some(Request::Package(p)) => p,
                    _ => system::Package::default(),
                };
                let applied = package.apply(opt);
                self.request = Some(Request::Package(package));
                applied?;
            }
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

// OS service.

impl Configurable for os::TransferRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Version(v) => self.version = v,
            GnoiOption::StandbySupervisor(v) => self.standby_supervisor = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for os::InstallRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        use os::install_request::Request;
        match option {
            GnoiOption::TransferRequest(r) => self.request = Some(Request::TransferRequest(r)),
            GnoiOption::Contents(v) => self.request = Some(Request::TransferContent(v)),
            GnoiOption::TransferEnd => {
                self.request = Some(Request::TransferEnd(os::TransferEnd {}));
            }
            opt @ (GnoiOption::Version(_) | GnoiOption::StandbySupervisor(_)) => {
                let mut transfer = match self.request.take() {
                    Some(Request::TransferRequest(r)) => r,
                    _ => os::TransferRequest::default(),
                };
                let applied = transfer.apply(opt);
                self.request = Some(Request::TransferRequest(transfer));
                applied?;
            }
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for os::ActivateRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Version(v) => self.version = v,
            GnoiOption::StandbySupervisor(v) => self.standby_supervisor = v,
            GnoiOption::NoReboot(v) => self.no_reboot = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for os::VerifyRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        Err(mismatch::<Self>(&option))
    }
}

// Healthz service.

impl Configurable for healthz::GetRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::ComponentPath(p) => self.path = Some(parse_path(&p)?),
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for healthz::ListRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::ComponentPath(p) => self.path = Some(parse_path(&p)?),
            GnoiOption::IncludeAcknowledged(v) => self.include_acknowledged = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for healthz::AcknowledgeRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::ComponentPath(p) => self.path = Some(parse_path(&p)?),
            GnoiOption::Id(v) => self.id = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for healthz::CheckRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::ComponentPath(p) => self.path = Some(parse_path(&p)?),
            GnoiOption::EventId(v) => self.event_id = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for healthz::ArtifactRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::Id(v) => self.id = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

// Factory reset and reflection.

impl Configurable for factory_reset::StartRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        match option {
            GnoiOption::FactoryOs(v) => self.factory_os = v,
            GnoiOption::ZeroFill(v) => self.zero_fill = v,
            GnoiOption::RetainCerts(v) => self.retain_certs = v,
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

impl Configurable for reflection::ServerReflectionRequest {
    fn apply(&mut self, option: GnoiOption) -> Result<()> {
        use reflection::server_reflection_request::MessageRequest;
        match option {
            GnoiOption::Host(v) => self.host = v,
            GnoiOption::ListServices(v) => {
                self.message_request = Some(MessageRequest::ListServices(v));
            }
            other => return Err(mismatch::<Self>(&other)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn generate_csr_request_routes_fields_to_params() {
        let req: cert::GenerateCsrRequest = build([
            GnoiOption::CertificateId("gnxi".into()),
            GnoiOption::KeyType("rsa".into()),
            GnoiOption::CertificateType("x509".into()),
            GnoiOption::MinKeySize(2048),
            GnoiOption::CommonName("router1".into()),
            GnoiOption::IpAddress("10.0.0.1".into()),
        ])
        .unwrap();
        assert_eq!(req.certificate_id, "gnxi");
        let params = req.csr_params.unwrap();
        assert_eq!(params.key_type, cert::KeyType::KtRsa as i32);
        assert_eq!(params.r#type, cert::CertificateType::CtX509 as i32);
        assert_eq!(params.min_key_size, 2048);
        assert_eq!(params.common_name, "router1");
        assert_eq!(params.ip_address, "10.0.0.1");
    }

    #[test]
    fn unmatched_option_names_message() {
        let err = build::<file::GetRequest>([GnoiOption::Pid(1)]).unwrap_err();
        assert_eq!(
            err,
            ApiError::InvalidMessageType {
                option: "pid",
                message: "gnoi.file.GetRequest".into(),
            }
        );
    }

    #[test]
    fn first_failure_aborts() {
        let err = build::<system::KillProcessRequest>([
            GnoiOption::Pid(10),
            GnoiOption::Signal("STOP".into()),
            GnoiOption::RemoteFile("/x".into()),
        ])
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidValue { field: "signal", .. }));
    }

    #[test]
    fn repeated_fields_accumulate() {
        let req: cert::RevokeCertificatesRequest = build([
            GnoiOption::CertificateId("a".into()),
            GnoiOption::CertificateId("b".into()),
        ])
        .unwrap();
        assert_eq!(req.certificate_id, vec!["a".to_string(), "b".to_string()]);

        let req: system::RebootStatusRequest = build([
            GnoiOption::Subcomponent("/components/component[name=LC1]".into()),
            GnoiOption::Subcomponent("/components/component[name=LC2]".into()),
        ])
        .unwrap();
        assert_eq!(req.subcomponents.len(), 2);
    }

    #[test_case("cold", system::RebootMethod::Cold)]
    #[test_case("POWERDOWN", system::RebootMethod::Powerdown)]
    #[test_case("halt", system::RebootMethod::Halt)]
    #[test_case("Warm", system::RebootMethod::Warm)]
    #[test_case("powerup", system::RebootMethod::Powerup)]
    fn reboot_methods(token: &str, expected: system::RebootMethod) {
        assert_eq!(reboot_method(token).unwrap(), expected);
    }

    #[test_case("nsf")]
    #[test_case("unknown")]
    #[test_case("reboot")]
    fn reboot_methods_rejected(token: &str) {
        assert!(matches!(
            reboot_method(token),
            Err(ApiError::InvalidValue { .. })
        ));
    }

    #[test_case("term", system::kill_process_request::Signal::Term)]
    #[test_case("SIGKILL", system::kill_process_request::Signal::Kill)]
    #[test_case("SIGNAL_HUP", system::kill_process_request::Signal::Hup)]
    fn signals(token: &str, expected: system::kill_process_request::Signal) {
        assert_eq!(signal(token).unwrap(), expected);
    }

    #[test_case("abrt")]
    #[test_case("SIGNAL_UNSPECIFIED")]
    #[test_case("int")]
    fn signals_rejected(token: &str) {
        let err = signal(token).unwrap_err();
        assert_eq!(err, ApiError::invalid_value("signal", token));
    }

    #[test]
    fn enum_tokens_with_and_without_prefix() {
        assert_eq!(certificate_type("CT_X509").unwrap(), cert::CertificateType::CtX509);
        assert_eq!(key_type("kt_rsa").unwrap(), cert::KeyType::KtRsa);
        assert_eq!(l3_protocol("v6").unwrap(), L3Protocol::Ipv6);
        assert_eq!(l3_protocol("IPV4").unwrap(), L3Protocol::Ipv4);
        assert_eq!(
            l4_protocol("udp").unwrap(),
            system::traceroute_request::L4Protocol::Udp
        );
        assert_eq!(
            protocol("sftp").unwrap(),
            common::remote_download::Protocol::Sftp
        );
        assert!(key_type("dsa").is_err());
    }

    #[test]
    fn put_open_collects_details() {
        let req: file::PutRequest = build([
            GnoiOption::RemoteFile("/tmp/x".into()),
            GnoiOption::Permissions(644),
        ])
        .unwrap();
        match req.request {
            Some(file::put_request::Request::Open(details)) => {
                assert_eq!(details.remote_file, "/tmp/x");
                assert_eq!(details.permissions, 644);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn put_rejects_non_octal_permissions() {
        assert!(build::<file::PutRequest>([GnoiOption::Permissions(689)]).is_err());
    }

    #[test]
    fn transfer_to_remote_nests_credentials() {
        let req: file::TransferToRemoteRequest = build([
            GnoiOption::LocalPath("/var/log/messages".into()),
            GnoiOption::RemotePath("10.0.0.2:/tmp/messages".into()),
            GnoiOption::Protocol("scp".into()),
            GnoiOption::Username("admin".into()),
            GnoiOption::Password("secret".into()),
        ])
        .unwrap();
        let rd = req.remote_download.unwrap();
        assert_eq!(rd.protocol, common::remote_download::Protocol::Scp as i32);
        let creds = rd.credentials.unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(
            creds.password,
            Some(types::credentials::Password::Cleartext("secret".into()))
        );
    }

    #[test]
    fn traceroute_wires_l4_protocol() {
        let req: system::TracerouteRequest = build([
            GnoiOption::Destination("10.0.0.3".into()),
            GnoiOption::L3Protocol("v4".into()),
            GnoiOption::L4Protocol("tcp".into()),
        ])
        .unwrap();
        assert_eq!(req.l3protocol, L3Protocol::Ipv4 as i32);
        assert_eq!(
            req.l4protocol,
            system::traceroute_request::L4Protocol::Tcp as i32
        );
    }

    #[test]
    fn os_install_transfer_request() {
        let req: os::InstallRequest = build([
            GnoiOption::Version("1.2.3".into()),
            GnoiOption::StandbySupervisor(true),
        ])
        .unwrap();
        assert_eq!(
            req.request,
            Some(os::install_request::Request::TransferRequest(
                os::TransferRequest {
                    version: "1.2.3".into(),
                    standby_supervisor: true,
                }
            ))
        );
    }

    #[test]
    fn set_package_builds_package() {
        let req: system::SetPackageRequest = build([
            GnoiOption::Filename("/tmp/pkg".into()),
            GnoiOption::Version("2".into()),
            GnoiOption::Activate(true),
        ])
        .unwrap();
        match req.request {
            Some(system::set_package_request::Request::Package(p)) => {
                assert_eq!(p.filename, "/tmp/pkg");
                assert!(p.activate);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn rotate_steps() {
        let finalize: cert::RotateCertificateRequest =
            build([GnoiOption::FinalizeRotation]).unwrap();
        assert!(matches!(
            finalize.rotate_request,
            Some(cert::rotate_certificate_request::RotateRequest::FinalizeRotation(_))
        ));
        let err = build::<cert::InstallCertificateRequest>([GnoiOption::FinalizeRotation])
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidMessageType { .. }));
    }

    #[test]
    fn empty_messages_reject_everything() {
        assert!(build::<system::TimeRequest>([]).is_ok());
        assert!(build::<system::TimeRequest>([GnoiOption::Force(true)]).is_err());
    }

    #[test]
    fn hash_type_method_token() {
        let h: HashType = build([
            GnoiOption::HashMethod("sha-512".into()),
            GnoiOption::HashValue(vec![0; 64]),
        ])
        .unwrap();
        assert_eq!(h.method, types::hash_type::HashMethod::Sha512 as i32);
    }
}
