//! Target descriptors: where a device lives and how to reach it.

use std::fmt;
use std::net::{Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CliError;

/// Default gNOI port appended to addresses without one.
pub const DEFAULT_PORT: u16 = 57400;

/// Default dial timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// PEM material given as a file path or inline bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum PemSource {
    /// Read from this file when dialing.
    Path(PathBuf),
    /// Already loaded.
    Inline(Vec<u8>),
}

impl PemSource {
    /// Returns the PEM bytes, reading the file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>, CliError> {
        match self {
            Self::Path(path) => std::fs::read(path)
                .map_err(|e| CliError::config(format!("{}: {e}", path.display()))),
            Self::Inline(bytes) => Ok(bytes.clone()),
        }
    }
}

impl fmt::Debug for PemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Inline(bytes) => write!(f, "Inline(<{} bytes>)", bytes.len()),
        }
    }
}

/// TLS protocol versions gnoic will negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.2.
    V1_2,
    /// TLS 1.3.
    V1_3,
}

impl FromStr for TlsVersion {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        let token = token.strip_prefix("tls").unwrap_or(&token);
        match token.trim_start_matches(['v', '-', '_']) {
            "1.2" | "12" => Ok(Self::V1_2),
            "1.3" | "13" => Ok(Self::V1_3),
            "1.0" | "10" | "1.1" | "11" => Err(CliError::config(format!(
                "TLS version {s} is not supported, the minimum is 1.2"
            ))),
            _ => Err(CliError::config(format!("invalid TLS version {s:?}"))),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1_2 => f.write_str("1.2"),
            Self::V1_3 => f.write_str("1.3"),
        }
    }
}

/// A device to run operations against.
#[derive(Clone)]
pub struct Target {
    /// Name used in logs and output rows.
    pub name: String,
    /// One or more comma-separated `host:port` addresses, tried in order.
    pub address: String,
    /// Username sent as call metadata.
    pub username: Option<String>,
    /// Password sent as call metadata.
    pub password: Option<String>,
    /// Dial timeout.
    pub timeout: Duration,
    /// Dial without TLS.
    pub insecure: bool,
    /// Accept any server certificate.
    pub skip_verify: bool,
    /// CA bundle used to verify the server.
    pub tls_ca: Option<PemSource>,
    /// Client certificate.
    pub tls_cert: Option<PemSource>,
    /// Client private key.
    pub tls_key: Option<PemSource>,
    /// Name checked against the server certificate, defaults to the host.
    pub tls_server_name: Option<String>,
    /// Lowest TLS version offered.
    pub tls_min_version: Option<TlsVersion>,
    /// Highest TLS version offered.
    pub tls_max_version: Option<TlsVersion>,
    /// Compress requests and accept compressed responses.
    pub gzip: bool,
    /// Tunnel through the proxy named by the environment.
    pub proxy_from_env: bool,
}

impl Target {
    /// Starts building a target for `address`.
    #[must_use]
    pub fn builder(address: impl Into<String>) -> TargetBuilder {
        TargetBuilder::new(address)
    }

    /// Returns each dialable address.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.address
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("insecure", &self.insecure)
            .field("skip_verify", &self.skip_verify)
            .field("gzip", &self.gzip)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Target`].
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    target: Target,
}

impl TargetBuilder {
    fn new(address: impl Into<String>) -> Self {
        Self {
            target: Target {
                name: String::new(),
                address: address.into(),
                username: None,
                password: None,
                timeout: DEFAULT_TIMEOUT,
                insecure: false,
                skip_verify: false,
                tls_ca: None,
                tls_cert: None,
                tls_key: None,
                tls_server_name: None,
                tls_min_version: None,
                tls_max_version: None,
                gzip: false,
                proxy_from_env: false,
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.target.name = name.into();
        self
    }

    /// Set the username.
    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.target.username = username;
        self
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.target.password = password;
        self
    }

    /// Set the dial timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.target.timeout = timeout;
        self
    }

    /// Dial without TLS.
    #[must_use]
    pub const fn insecure(mut self, insecure: bool) -> Self {
        self.target.insecure = insecure;
        self
    }

    /// Skip server certificate verification.
    #[must_use]
    pub const fn skip_verify(mut self, skip: bool) -> Self {
        self.target.skip_verify = skip;
        self
    }

    /// Set the CA bundle.
    #[must_use]
    pub fn with_tls_ca(mut self, ca: Option<PemSource>) -> Self {
        self.target.tls_ca = ca;
        self
    }

    /// Set the client certificate.
    #[must_use]
    pub fn with_tls_cert(mut self, cert: Option<PemSource>) -> Self {
        self.target.tls_cert = cert;
        self
    }

    /// Set the client key.
    #[must_use]
    pub fn with_tls_key(mut self, key: Option<PemSource>) -> Self {
        self.target.tls_key = key;
        self
    }

    /// Override the name verified against the server certificate.
    #[must_use]
    pub fn with_tls_server_name(mut self, name: Option<String>) -> Self {
        self.target.tls_server_name = name;
        self
    }

    /// Clamp the negotiated TLS versions.
    #[must_use]
    pub const fn with_tls_versions(
        mut self,
        min: Option<TlsVersion>,
        max: Option<TlsVersion>,
    ) -> Self {
        self.target.tls_min_version = min;
        self.target.tls_max_version = max;
        self
    }

    /// Enable gzip compression.
    #[must_use]
    pub const fn with_gzip(mut self, gzip: bool) -> Self {
        self.target.gzip = gzip;
        self
    }

    /// Honor `HTTPS_PROXY` and friends.
    #[must_use]
    pub const fn with_proxy_from_env(mut self, enabled: bool) -> Self {
        self.target.proxy_from_env = enabled;
        self
    }

    /// Validates and returns the target.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when the address is missing, the TLS
    /// version range is empty, or only one of certificate and key is set.
    pub fn build(self) -> Result<Target, CliError> {
        let mut target = self.target;
        if target.addresses().next().is_none() {
            return Err(CliError::config("missing address"));
        }
        if target.name.is_empty() {
            let name = target
                .addresses()
                .next()
                .map(str::to_string)
                .unwrap_or_default();
            target.name = name;
        }
        if let (Some(min), Some(max)) = (target.tls_min_version, target.tls_max_version) {
            if min > max {
                return Err(CliError::config(format!(
                    "TLS min version {min} is above max version {max}"
                )));
            }
        }
        if target.tls_cert.is_some() != target.tls_key.is_some() {
            return Err(CliError::config(
                "tls-cert and tls-key must be given together",
            ));
        }
        Ok(target)
    }
}

/// Appends `port` to every comma-separated address that lacks one.
#[must_use]
pub fn with_default_port(address: &str, port: u16) -> String {
    address
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| {
            if a.parse::<SocketAddr>().is_ok() {
                a.to_string()
            } else if a.parse::<Ipv6Addr>().is_ok() {
                format!("[{a}]:{port}")
            } else if a.starts_with('[') && !a.contains("]:") {
                format!("{a}:{port}")
            } else if a.starts_with('[') || a.contains(':') {
                a.to_string()
            } else {
                format!("{a}:{port}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns the host part of `host:port`, without IPv6 brackets.
#[must_use]
pub fn host_of(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match address.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => address,
    }
}
