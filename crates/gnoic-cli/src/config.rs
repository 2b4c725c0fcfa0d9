//! Configuration file loading and target resolution.
//!
//! Flags and `GNOIC_*` environment variables win over the configuration
//! file, which wins over built-in defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cli::{Format, GlobalArgs};
use crate::error::CliError;
use crate::target::{with_default_port, PemSource, Target, TlsVersion, DEFAULT_PORT};

/// Base name of configuration files searched for.
pub const CONFIG_BASENAME: &str = "gnoic";

const EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

/// Contents of a configuration file, keyed like the global flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Target addresses.
    #[serde(default)]
    pub address: Vec<String>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Default port.
    pub port: Option<u16>,
    /// Dial without TLS.
    pub insecure: Option<bool>,
    /// Skip certificate verification.
    pub skip_verify: Option<bool>,
    /// CA bundle path.
    pub tls_ca: Option<PathBuf>,
    /// Client certificate path.
    pub tls_cert: Option<PathBuf>,
    /// Client key path.
    pub tls_key: Option<PathBuf>,
    /// TLS server name override.
    pub tls_server_name: Option<String>,
    /// Lowest TLS version.
    pub tls_min_version: Option<String>,
    /// Highest TLS version.
    pub tls_max_version: Option<String>,
    /// Pinned TLS version.
    pub tls_version: Option<String>,
    /// Dial timeout, e.g. `10s`.
    #[serde(default, with = "humantime_serde_opt")]
    pub timeout: Option<Duration>,
    /// Gzip compression.
    pub gzip: Option<bool>,
    /// Use the environment's proxy.
    pub proxy_from_env: Option<bool>,
    /// Output format.
    pub format: Option<Format>,
    /// Print protobuf text.
    pub print_proto: Option<bool>,
    /// Debug logging.
    pub debug: Option<bool>,
    /// Per-target overrides keyed by address.
    #[serde(default)]
    pub targets: BTreeMap<String, Option<TargetOverrides>>,
}

/// Settings that may differ per target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TargetOverrides {
    /// Display name.
    pub name: Option<String>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Dial without TLS.
    pub insecure: Option<bool>,
    /// Skip certificate verification.
    pub skip_verify: Option<bool>,
    /// CA bundle path.
    pub tls_ca: Option<PathBuf>,
    /// Client certificate path.
    pub tls_cert: Option<PathBuf>,
    /// Client key path.
    pub tls_key: Option<PathBuf>,
    /// Dial timeout.
    #[serde(default, with = "humantime_serde_opt")]
    pub timeout: Option<Duration>,
    /// Gzip compression.
    pub gzip: Option<bool>,
}

mod humantime_serde_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

impl FileConfig {
    /// Parses a file, choosing the format by extension.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when the file cannot be read, has an
    /// unknown extension, or does not parse.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let parsed = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
            "toml" => toml::from_str(&text).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(&text).map_err(|e| e.to_string()),
            other => Err(format!("unsupported configuration format {other:?}")),
        };
        parsed.map_err(|e| CliError::config(format!("{}: {e}", path.display())))
    }

    /// Finds the configuration file: `explicit`, else `gnoic.*` in `cwd`,
    /// else `.gnoic.*` in `home`.
    #[must_use]
    pub fn discover(explicit: Option<&Path>, cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let in_dir = |dir: &Path, base: &str| {
            EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{base}.{ext}")))
                .find(|p| p.is_file())
        };
        in_dir(cwd, CONFIG_BASENAME)
            .or_else(|| home.and_then(|h| in_dir(h, &format!(".{CONFIG_BASENAME}"))))
    }
}

/// Fully resolved invocation settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Targets, deduplicated and in input order.
    pub targets: Vec<Target>,
    /// Output format.
    pub format: Format,
    /// Print protobuf text.
    pub print_proto: bool,
    /// Debug logging.
    pub debug: bool,
}

impl Settings {
    /// Loads the configuration file (if any) and merges it with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] on unreadable configuration or invalid
    /// settings.
    pub fn load(args: &GlobalArgs) -> Result<Self, CliError> {
        let cwd = std::env::current_dir()?;
        let home = dirs::home_dir();
        let file = match FileConfig::discover(args.config.as_deref(), &cwd, home.as_deref()) {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration");
                FileConfig::load(&path)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(args, &file)
    }

    /// Merges flags with file configuration.
    ///
    /// Targets are not required here; commands that need them check
    /// [`Settings::require_targets`].
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] on invalid TLS versions or target
    /// settings.
    pub fn resolve(args: &GlobalArgs, file: &FileConfig) -> Result<Self, CliError> {
        let (tls_min, tls_max) = tls_range(args, file)?;
        let port = args.port.or(file.port).unwrap_or(DEFAULT_PORT);

        let addresses: Vec<String> = if !args.address.is_empty() {
            args.address.clone()
        } else if !file.address.is_empty() {
            file.address.clone()
        } else {
            file.targets.keys().cloned().collect()
        };

        let mut seen = std::collections::BTreeSet::new();
        let mut targets = Vec::new();
        for raw in addresses.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            let address = with_default_port(raw, port);
            if !seen.insert(address.clone()) {
                continue;
            }
            let overrides = file
                .targets
                .get(raw)
                .or_else(|| file.targets.get(&address))
                .cloned()
                .flatten()
                .unwrap_or_default();
            targets.push(build_target(args, file, &overrides, address, tls_min, tls_max)?);
        }

        Ok(Self {
            targets,
            format: args.format.or(file.format).unwrap_or_default(),
            print_proto: args.print_proto || file.print_proto.unwrap_or(false),
            debug: args.debug || file.debug.unwrap_or(false),
        })
    }

    /// Returns the targets, failing when there are none.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when no address was given.
    pub fn require_targets(&self) -> Result<&[Target], CliError> {
        if self.targets.is_empty() {
            Err(CliError::config("no targets: set --address or targets in the configuration file"))
        } else {
            Ok(&self.targets)
        }
    }
}

fn flag(cli: bool, file: Option<bool>) -> bool {
    cli || file.unwrap_or(false)
}

fn tls_range(
    args: &GlobalArgs,
    file: &FileConfig,
) -> Result<(Option<TlsVersion>, Option<TlsVersion>), CliError> {
    let parse = |v: Option<&String>| v.map(|s| s.parse::<TlsVersion>()).transpose();
    if let Some(pinned) = parse(args.tls_version.as_ref().or(file.tls_version.as_ref()))? {
        return Ok((Some(pinned), Some(pinned)));
    }
    Ok((
        parse(args.tls_min_version.as_ref().or(file.tls_min_version.as_ref()))?,
        parse(args.tls_max_version.as_ref().or(file.tls_max_version.as_ref()))?,
    ))
}

fn build_target(
    args: &GlobalArgs,
    file: &FileConfig,
    overrides: &TargetOverrides,
    address: String,
    tls_min: Option<TlsVersion>,
    tls_max: Option<TlsVersion>,
) -> Result<Target, CliError> {
    let pem = |cli: &Option<PathBuf>, per_target: &Option<PathBuf>, global: &Option<PathBuf>| {
        cli.clone()
            .or_else(|| per_target.clone())
            .or_else(|| global.clone())
            .map(PemSource::Path)
    };
    let mut builder = Target::builder(address)
        .with_username(
            args.username
                .clone()
                .or_else(|| overrides.username.clone())
                .or_else(|| file.username.clone()),
        )
        .with_password(
            args.password
                .clone()
                .or_else(|| overrides.password.clone())
                .or_else(|| file.password.clone()),
        )
        .with_timeout(
            args.timeout
                .or(overrides.timeout)
                .or(file.timeout)
                .unwrap_or(crate::target::DEFAULT_TIMEOUT),
        )
        .insecure(flag(args.insecure, overrides.insecure.or(file.insecure)))
        .skip_verify(flag(args.skip_verify, overrides.skip_verify.or(file.skip_verify)))
        .with_tls_ca(pem(&args.tls_ca, &overrides.tls_ca, &file.tls_ca))
        .with_tls_cert(pem(&args.tls_cert, &overrides.tls_cert, &file.tls_cert))
        .with_tls_key(pem(&args.tls_key, &overrides.tls_key, &file.tls_key))
        .with_tls_server_name(
            args.tls_server_name
                .clone()
                .or_else(|| file.tls_server_name.clone()),
        )
        .with_tls_versions(tls_min, tls_max)
        .with_gzip(flag(args.gzip, overrides.gzip.or(file.gzip)))
        .with_proxy_from_env(flag(args.proxy_from_env, file.proxy_from_env));
    if let Some(name) = &overrides.name {
        builder = builder.with_name(name.clone());
    }
    builder.build()
}
