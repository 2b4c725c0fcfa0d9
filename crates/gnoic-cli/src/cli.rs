//! Command-line argument parsing with clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// gnoic: run gNOI operations against many network devices at once.
#[derive(Parser, Debug, Clone)]
#[command(name = "gnoic")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Flags shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Connection, security and output flags.
///
/// Unset options fall back to the configuration file, then to built-in
/// defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Target addresses, comma-separated or repeated.
    #[arg(short, long, global = true, env = "GNOIC_ADDRESS", value_delimiter = ',')]
    pub address: Vec<String>,

    /// Username sent as call metadata.
    #[arg(short, long, global = true, env = "GNOIC_USERNAME")]
    pub username: Option<String>,

    /// Password sent as call metadata.
    #[arg(short, long, global = true, env = "GNOIC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Port appended to addresses without one [default: 57400].
    #[arg(long, global = true, env = "GNOIC_PORT")]
    pub port: Option<u16>,

    /// Dial without TLS.
    #[arg(long, global = true, env = "GNOIC_INSECURE")]
    pub insecure: bool,

    /// Do not verify the target certificate.
    #[arg(long, global = true, env = "GNOIC_SKIP_VERIFY")]
    pub skip_verify: bool,

    /// CA certificate bundle (PEM) used to verify targets.
    #[arg(long, global = true, env = "GNOIC_TLS_CA")]
    pub tls_ca: Option<PathBuf>,

    /// Client certificate (PEM).
    #[arg(long, global = true, env = "GNOIC_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// Client private key (PEM).
    #[arg(long, global = true, env = "GNOIC_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Name checked against the target certificate.
    #[arg(long, global = true, env = "GNOIC_TLS_SERVER_NAME")]
    pub tls_server_name: Option<String>,

    /// Lowest TLS version to offer (1.2 or 1.3).
    #[arg(long, global = true, env = "GNOIC_TLS_MIN_VERSION")]
    pub tls_min_version: Option<String>,

    /// Highest TLS version to offer (1.2 or 1.3).
    #[arg(long, global = true, env = "GNOIC_TLS_MAX_VERSION")]
    pub tls_max_version: Option<String>,

    /// Pin the TLS version (1.2 or 1.3).
    #[arg(long, global = true, env = "GNOIC_TLS_VERSION")]
    pub tls_version: Option<String>,

    /// Dial timeout [default: 10s].
    #[arg(long, global = true, env = "GNOIC_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Compress requests and accept compressed responses.
    #[arg(long, global = true, env = "GNOIC_GZIP")]
    pub gzip: bool,

    /// Tunnel through the proxy named by `HTTPS_PROXY`/`HTTP_PROXY`.
    #[arg(long, global = true, env = "GNOIC_PROXY_FROM_ENV")]
    pub proxy_from_env: bool,

    /// Output format [default: text].
    #[arg(long, global = true, env = "GNOIC_FORMAT", value_enum)]
    pub format: Option<Format>,

    /// Print raw responses in protobuf text format.
    #[arg(long, global = true, env = "GNOIC_PRINT_PROTO")]
    pub print_proto: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "GNOIC_DEBUG")]
    pub debug: bool,

    /// Configuration file (YAML, TOML or JSON).
    #[arg(long, global = true, env = "GNOIC_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable tables.
    #[default]
    Text,
    /// JSON, one object per target.
    Json,
}

/// Top-level subcommands, one per gNOI service.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Certificate management service.
    Cert {
        /// Cert subcommand to execute.
        #[command(subcommand)]
        command: CertCommands,
    },

    /// File service.
    File {
        /// File subcommand to execute.
        #[command(subcommand)]
        command: FileCommands,
    },

    /// System service.
    System {
        /// System subcommand to execute.
        #[command(subcommand)]
        command: SystemCommands,
    },

    /// OS install service.
    Os {
        /// OS subcommand to execute.
        #[command(subcommand)]
        command: OsCommands,
    },

    /// Component health service.
    Healthz {
        /// Healthz subcommand to execute.
        #[command(subcommand)]
        command: HealthzCommands,
    },

    /// Factory reset service.
    FactoryReset {
        /// Factory reset subcommand to execute.
        #[command(subcommand)]
        command: FactoryResetCommands,
    },

    /// List the gRPC services a target exposes through reflection.
    Services,
}

// Certificate management.

/// Certificate subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CertCommands {
    /// Create a local self-signed CA, written as PEM files.
    CreateCa(CreateCaArgs),
    /// Ask targets to generate a CSR.
    GenerateCsr(GenerateCsrArgs),
    /// Replace an existing certificate, signed by the local CA.
    Rotate(RotateArgs),
    /// Install a first certificate, signed by the local CA.
    Install(RotateArgs),
    /// Load an existing certificate and key pair.
    Load(LoadArgs),
    /// Load a CA bundle.
    LoadCa(LoadCaArgs),
    /// List installed certificates.
    GetCerts(GetCertsArgs),
    /// Check whether a CSR with these parameters can be generated.
    CanGenerateCsr(CanGenerateCsrArgs),
    /// Revoke certificates.
    Revoke(RevokeArgs),
}

/// Subject and output of a local CA.
#[derive(Args, Debug, Clone)]
pub struct CreateCaArgs {
    /// Organization.
    #[arg(long, default_value = "OpenConfig")]
    pub org: String,
    /// Organizational unit.
    #[arg(long, default_value = "OpenConfig gnoic")]
    pub org_unit: String,
    /// Country.
    #[arg(long, default_value = "OC")]
    pub country: String,
    /// State or province.
    #[arg(long, default_value = "")]
    pub state: String,
    /// Locality.
    #[arg(long, default_value = "")]
    pub locality: String,
    /// Street address.
    #[arg(long, default_value = "")]
    pub street_address: String,
    /// Postal code.
    #[arg(long, default_value = "")]
    pub postal_code: String,
    /// Email address.
    #[arg(long, default_value = "")]
    pub email: String,
    /// Common name.
    #[arg(long, default_value = "gnoic CA")]
    pub common_name: String,
    /// Validity.
    #[arg(long, default_value = "87600h", value_parser = humantime::parse_duration)]
    pub validity: Duration,
    /// RSA key size in bits.
    #[arg(long, default_value_t = 2048)]
    pub key_size: usize,
    /// Private key output file.
    #[arg(long, default_value = "key.pem")]
    pub key_out: PathBuf,
    /// Certificate output file.
    #[arg(long, default_value = "cert.pem")]
    pub cert_out: PathBuf,
}

/// CSR parameters shared by generate-csr, rotate and install.
#[derive(Args, Debug, Clone)]
pub struct CsrArgs {
    /// Key type.
    #[arg(long, default_value = "KT_RSA")]
    pub key_type: String,
    /// Certificate type.
    #[arg(long, default_value = "CT_X509")]
    pub cert_type: String,
    /// Minimum key size.
    #[arg(long, default_value_t = 2048)]
    pub min_key_size: u32,
    /// Subject common name [default: target host].
    #[arg(long)]
    pub common_name: Option<String>,
    /// Subject country.
    #[arg(long)]
    pub country: Option<String>,
    /// Subject state.
    #[arg(long)]
    pub state: Option<String>,
    /// Subject city.
    #[arg(long)]
    pub city: Option<String>,
    /// Subject organization.
    #[arg(long)]
    pub org: Option<String>,
    /// Subject organizational unit.
    #[arg(long)]
    pub org_unit: Option<String>,
    /// IP address SAN [default: target host when it is an IP].
    #[arg(long)]
    pub ip_address: Option<String>,
    /// Email address.
    #[arg(long)]
    pub email_id: Option<String>,
}

/// Arguments of `cert generate-csr`.
#[derive(Args, Debug, Clone)]
pub struct GenerateCsrArgs {
    /// Certificate id.
    #[arg(long)]
    pub id: String,
    /// CSR parameters.
    #[command(flatten)]
    pub csr: CsrArgs,
}

/// Arguments of `cert rotate` and `cert install`.
#[derive(Args, Debug, Clone)]
pub struct RotateArgs {
    /// Certificate id.
    #[arg(long)]
    pub id: String,
    /// CSR parameters.
    #[command(flatten)]
    pub csr: CsrArgs,
    /// CA certificate used to sign the CSR.
    #[arg(long)]
    pub ca_cert: PathBuf,
    /// CA private key used to sign the CSR.
    #[arg(long)]
    pub ca_key: PathBuf,
    /// Validity of the signed certificate.
    #[arg(long, default_value = "87600h", value_parser = humantime::parse_duration)]
    pub validity: Duration,
    /// Log the CSR received from each target.
    #[arg(long)]
    pub print_csr: bool,
}

/// Arguments of `cert load`.
#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Certificate id.
    #[arg(long)]
    pub id: String,
    /// Certificate file (PEM).
    #[arg(long)]
    pub cert: PathBuf,
    /// Private key file (PEM).
    #[arg(long)]
    pub key: Option<PathBuf>,
    /// CA certificate files (PEM).
    #[arg(long)]
    pub ca: Vec<PathBuf>,
}

/// Arguments of `cert load-ca`.
#[derive(Args, Debug, Clone)]
pub struct LoadCaArgs {
    /// CA certificate files (PEM).
    #[arg(long, required = true)]
    pub ca: Vec<PathBuf>,
}

/// Arguments of `cert get-certs`.
#[derive(Args, Debug, Clone)]
pub struct GetCertsArgs {
    /// Only show this certificate id.
    #[arg(long)]
    pub id: Option<String>,
}

/// Arguments of `cert can-generate-csr`.
#[derive(Args, Debug, Clone)]
pub struct CanGenerateCsrArgs {
    /// Key type.
    #[arg(long, default_value = "KT_RSA")]
    pub key_type: String,
    /// Certificate type.
    #[arg(long, default_value = "CT_X509")]
    pub cert_type: String,
    /// Key size.
    #[arg(long, default_value_t = 2048)]
    pub key_size: u32,
}

/// Arguments of `cert revoke`.
#[derive(Args, Debug, Clone)]
pub struct RevokeArgs {
    /// Certificate ids to revoke.
    #[arg(long, required_unless_present = "all")]
    pub id: Vec<String>,
    /// Revoke every certificate the target reports.
    #[arg(long, conflicts_with = "id")]
    pub all: bool,
}

// File service.

/// File subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FileCommands {
    /// Download files from targets.
    Get(FileGetArgs),
    /// Upload a file or directory to targets.
    Put(FilePutArgs),
    /// Show file metadata.
    Stat(FileStatArgs),
    /// Remove a file.
    Remove(FileRemoveArgs),
    /// Have targets upload a local file to a remote host.
    Transfer(FileTransferArgs),
}

/// Arguments of `file get`.
#[derive(Args, Debug, Clone)]
pub struct FileGetArgs {
    /// Remote files to download.
    #[arg(long, required = true)]
    pub file: Vec<String>,
    /// Local destination directory [default: current directory].
    #[arg(long)]
    pub dst: Option<PathBuf>,
    /// Prefix local file names with the target name.
    #[arg(long)]
    pub target_prefix: bool,
}

/// Arguments of `file put`.
#[derive(Args, Debug, Clone)]
pub struct FilePutArgs {
    /// Local file or directory to upload.
    #[arg(long)]
    pub file: PathBuf,
    /// Remote destination.
    #[arg(long)]
    pub dst: String,
    /// Remote permissions as octal digits.
    #[arg(long, default_value_t = 644)]
    pub permissions: u32,
    /// Bytes per content message.
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk_size: usize,
    /// Hash method of the trailing hash message.
    #[arg(long, default_value = "md5")]
    pub hash_method: String,
}

/// Arguments of `file stat`.
#[derive(Args, Debug, Clone)]
pub struct FileStatArgs {
    /// Remote path.
    #[arg(long)]
    pub path: String,
    /// Descend into directories.
    #[arg(long)]
    pub recursive: bool,
    /// Show sizes with units.
    #[arg(long)]
    pub humanize: bool,
}

/// Arguments of `file remove`.
#[derive(Args, Debug, Clone)]
pub struct FileRemoveArgs {
    /// Remote file.
    #[arg(long)]
    pub path: String,
}

/// Arguments of `file transfer`.
#[derive(Args, Debug, Clone)]
pub struct FileTransferArgs {
    /// File on the target.
    #[arg(long)]
    pub local: String,
    /// Destination as `host:path`.
    #[arg(long)]
    pub remote: String,
    /// Transfer protocol (sftp, scp, http, https).
    #[arg(long, default_value = "sftp")]
    pub protocol: String,
    /// Username on the remote host.
    #[arg(long)]
    pub remote_username: Option<String>,
    /// Password on the remote host.
    #[arg(long)]
    pub remote_password: Option<String>,
    /// Source address of the transfer.
    #[arg(long)]
    pub source_address: Option<String>,
    /// Source VRF of the transfer.
    #[arg(long)]
    pub source_vrf: Option<String>,
}

// System service.

/// System subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum SystemCommands {
    /// Ping from the target.
    Ping(PingArgs),
    /// Traceroute from the target.
    Traceroute(TracerouteArgs),
    /// Show the target's clock.
    Time,
    /// Reboot the target or some of its components.
    Reboot(RebootArgs),
    /// Cancel a pending reboot.
    CancelReboot(CancelRebootArgs),
    /// Show reboot status.
    RebootStatus(RebootStatusArgs),
    /// Switch the active control processor.
    SwitchControlProcessor(SwitchControlProcessorArgs),
    /// Signal a process.
    KillProcess(KillProcessArgs),
    /// Install a software package.
    SetPackage(SetPackageArgs),
}

/// Arguments of `system ping`.
#[derive(Args, Debug, Clone)]
pub struct PingArgs {
    /// Destination address.
    #[arg(long)]
    pub destination: String,
    /// Source address.
    #[arg(long)]
    pub source: Option<String>,
    /// Number of packets.
    #[arg(long)]
    pub count: Option<i32>,
    /// Time between packets.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,
    /// Time to wait for a response.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait: Option<Duration>,
    /// Payload size.
    #[arg(long)]
    pub size: Option<i32>,
    /// Set the don't-fragment bit.
    #[arg(long)]
    pub do_not_fragment: bool,
    /// Do not resolve the destination.
    #[arg(long)]
    pub do_not_resolve: bool,
    /// L3 protocol (v4 or v6).
    #[arg(long)]
    pub l3_protocol: Option<String>,
    /// Network instance.
    #[arg(long)]
    pub network_instance: Option<String>,
}

/// Arguments of `system traceroute`.
#[derive(Args, Debug, Clone)]
pub struct TracerouteArgs {
    /// Destination address.
    #[arg(long)]
    pub destination: String,
    /// Source address.
    #[arg(long)]
    pub source: Option<String>,
    /// Initial TTL.
    #[arg(long)]
    pub initial_ttl: Option<u32>,
    /// Maximum TTL.
    #[arg(long)]
    pub max_ttl: Option<i32>,
    /// Time to wait for a response.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait: Option<Duration>,
    /// Set the don't-fragment bit.
    #[arg(long)]
    pub do_not_fragment: bool,
    /// Do not resolve hop addresses.
    #[arg(long)]
    pub do_not_resolve: bool,
    /// L3 protocol (v4 or v6).
    #[arg(long)]
    pub l3_protocol: Option<String>,
    /// L4 protocol (icmp, tcp or udp).
    #[arg(long)]
    pub l4_protocol: Option<String>,
    /// Skip AS number lookups.
    #[arg(long)]
    pub do_not_lookup_asn: bool,
    /// Network instance.
    #[arg(long)]
    pub network_instance: Option<String>,
}

/// Arguments of `system reboot`.
#[derive(Args, Debug, Clone)]
pub struct RebootArgs {
    /// Reboot method (COLD, POWERDOWN, HALT, WARM, POWERUP).
    #[arg(long, default_value = "COLD")]
    pub method: String,
    /// Delay before rebooting.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub delay: Option<Duration>,
    /// Reason for the reboot.
    #[arg(long)]
    pub message: Option<String>,
    /// Components to reboot, as paths.
    #[arg(long)]
    pub subcomponent: Vec<String>,
    /// Reboot even if the target objects.
    #[arg(long)]
    pub force: bool,
}

/// Arguments of `system cancel-reboot`.
#[derive(Args, Debug, Clone)]
pub struct CancelRebootArgs {
    /// Reason for cancelling.
    #[arg(long)]
    pub message: Option<String>,
    /// Components whose reboot is cancelled.
    #[arg(long)]
    pub subcomponent: Vec<String>,
}

/// Arguments of `system reboot-status`.
#[derive(Args, Debug, Clone)]
pub struct RebootStatusArgs {
    /// Components to query.
    #[arg(long)]
    pub subcomponent: Vec<String>,
}

/// Arguments of `system switch-control-processor`.
#[derive(Args, Debug, Clone)]
pub struct SwitchControlProcessorArgs {
    /// Path of the control processor to activate.
    #[arg(long)]
    pub path: String,
}

/// Arguments of `system kill-process`.
#[derive(Args, Debug, Clone)]
pub struct KillProcessArgs {
    /// Process id.
    #[arg(long)]
    pub pid: Option<u32>,
    /// Process name.
    #[arg(long)]
    pub name: Option<String>,
    /// Signal (TERM, KILL, HUP).
    #[arg(long, default_value = "TERM")]
    pub signal: String,
    /// Restart the process.
    #[arg(long)]
    pub restart: bool,
}

/// Arguments of `system set-package`.
#[derive(Args, Debug, Clone)]
pub struct SetPackageArgs {
    /// Local package to stream.
    #[arg(long, required_unless_present = "remote_download")]
    pub pkg: Option<PathBuf>,
    /// Destination file name on the target.
    #[arg(long)]
    pub filename: String,
    /// Package version.
    #[arg(long)]
    pub version: Option<String>,
    /// Activate after install.
    #[arg(long)]
    pub activate: bool,
    /// Bytes per content message.
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk_size: usize,
    /// Hash method of the trailing hash message.
    #[arg(long, default_value = "md5")]
    pub hash_method: String,
    /// Have the target download the package from this `host:path` or URL.
    #[arg(long, conflicts_with = "pkg")]
    pub remote_download: Option<String>,
    /// Remote download protocol.
    #[arg(long, default_value = "sftp")]
    pub protocol: String,
    /// Remote download username.
    #[arg(long)]
    pub remote_username: Option<String>,
    /// Remote download password.
    #[arg(long)]
    pub remote_password: Option<String>,
}

// OS service.

/// OS subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum OsCommands {
    /// Transfer and validate an OS package.
    Install(OsInstallArgs),
    /// Activate an installed OS version.
    Activate(OsActivateArgs),
    /// Show the running OS version.
    Verify,
}

/// Arguments of `os install`.
#[derive(Args, Debug, Clone)]
pub struct OsInstallArgs {
    /// OS package file.
    #[arg(long)]
    pub pkg: PathBuf,
    /// Version of the package.
    #[arg(long)]
    pub version: String,
    /// Install on the standby supervisor.
    #[arg(long)]
    pub standby: bool,
    /// Bytes per content message.
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk_size: usize,
}

/// Arguments of `os activate`.
#[derive(Args, Debug, Clone)]
pub struct OsActivateArgs {
    /// Version to activate.
    #[arg(long)]
    pub version: String,
    /// Activate on the standby supervisor.
    #[arg(long)]
    pub standby: bool,
    /// Do not reboot after activation.
    #[arg(long)]
    pub no_reboot: bool,
}

// Healthz service.

/// Healthz subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum HealthzCommands {
    /// Show the health of a component.
    Get(HealthzPathArgs),
    /// List health events of a component.
    List(HealthzListArgs),
    /// Run a health check.
    Check(HealthzCheckArgs),
    /// Acknowledge a health event.
    Ack(HealthzAckArgs),
    /// Download a health artifact.
    Artifact(HealthzArtifactArgs),
}

/// Component path argument.
#[derive(Args, Debug, Clone)]
pub struct HealthzPathArgs {
    /// Component path.
    #[arg(long)]
    pub path: String,
}

/// Arguments of `healthz list`.
#[derive(Args, Debug, Clone)]
pub struct HealthzListArgs {
    /// Component path.
    #[arg(long)]
    pub path: String,
    /// Include acknowledged events.
    #[arg(long)]
    pub include_acknowledged: bool,
}

/// Arguments of `healthz check`.
#[derive(Args, Debug, Clone)]
pub struct HealthzCheckArgs {
    /// Component path.
    #[arg(long)]
    pub path: String,
    /// Event to re-check.
    #[arg(long)]
    pub event_id: Option<String>,
}

/// Arguments of `healthz ack`.
#[derive(Args, Debug, Clone)]
pub struct HealthzAckArgs {
    /// Component path.
    #[arg(long)]
    pub path: String,
    /// Event id.
    #[arg(long)]
    pub id: String,
}

/// Arguments of `healthz artifact`.
#[derive(Args, Debug, Clone)]
pub struct HealthzArtifactArgs {
    /// Artifact id.
    #[arg(long)]
    pub id: String,
    /// Destination directory for file artifacts.
    #[arg(long, default_value = ".")]
    pub dst: PathBuf,
}

// Factory reset.

/// Factory reset subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FactoryResetCommands {
    /// Reset targets to factory state.
    Start(FactoryResetArgs),
}

/// Arguments of `factory-reset start`.
#[derive(Args, Debug, Clone)]
pub struct FactoryResetArgs {
    /// Reinstall the factory OS.
    #[arg(long)]
    pub factory_os: bool,
    /// Zero-fill persistent storage.
    #[arg(long)]
    pub zero_fill: bool,
    /// Keep installed certificates.
    #[arg(long)]
    pub retain_certs: bool,
}
