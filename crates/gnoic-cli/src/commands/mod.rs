//! Command implementations.
//!
//! Each submodule executes one command group across every resolved target:
//! - [`cert`] - certificate management and the local CA
//! - [`file`] - file transfer and inspection
//! - [`system`] - diagnostics, reboots and packages
//! - [`os`] - OS install, activation and verification
//! - [`healthz`] - component health and artifacts
//! - [`factory_reset`] - factory reset
//! - [`services`] - server reflection

use std::future::Future;
use std::io::Write;

use gnoic_api::{build, Configurable, GnoiOption, HashMethod};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::CliError;
use crate::output::{OutputFormat, Report, TargetRows};
use crate::runner::{self, partition};
use crate::target::Target;
use crate::transport::Session;

pub mod cert;
pub mod factory_reset;
pub mod file;
pub mod healthz;
pub mod os;
pub mod services;
pub mod system;

pub use cert::CertCommand;
pub use factory_reset::FactoryResetCommand;
pub use file::FileCommand;
pub use healthz::HealthzCommand;
pub use os::OsCommand;
pub use services::ServicesCommand;
pub use system::SystemCommand;

/// Targets and cancellation shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    targets: Vec<Target>,
    cancel: CancellationToken,
}

impl Context {
    /// Creates a context.
    #[must_use]
    pub const fn new(targets: Vec<Target>, cancel: CancellationToken) -> Self {
        Self { targets, cancel }
    }

    /// Returns the resolved targets.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Returns the root cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `op` against every target; failures are logged and counted.
    pub async fn run<T, F, Fut>(&self, op: F) -> (Vec<(String, T)>, usize)
    where
        T: Send + 'static,
        F: Fn(Session) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CliError>> + Send + 'static,
    {
        partition(runner::run(&self.targets, &self.cancel, op).await)
    }
}

/// Writes the successful results, then fails if any target failed.
///
/// # Errors
///
/// Returns write errors, or [`CliError::Failed`] with the failure count.
pub fn report<W, T>(
    writer: &mut W,
    format: &OutputFormat,
    entries: Vec<(String, T)>,
    failed: usize,
) -> Result<(), CliError>
where
    W: Write,
    T: TargetRows,
{
    if !entries.is_empty() {
        format.write(writer, &Report::new(entries))?;
    }
    runner::summary(failed)
}

/// One-line result of an operation that returns nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Done {
    /// What happened.
    pub result: String,
}

impl Done {
    /// Creates a result line.
    #[must_use]
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

impl TargetRows for Done {
    const HEADERS: &'static [&'static str] = &["Result"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.result.clone()]]
    }
}

/// Builds a request from flag values; bad tokens are configuration errors.
pub(crate) fn request<M: Configurable + Default>(
    options: impl IntoIterator<Item = GnoiOption>,
) -> Result<M, CliError> {
    build(options).map_err(|e| CliError::config(e.to_string()))
}

/// Parses a hash method token; unknown tokens fall back to MD5.
pub(crate) fn hash_method_or_md5(token: &str) -> HashMethod {
    token.parse().unwrap_or_else(|e| {
        warn!("{e}, using MD5");
        HashMethod::Md5
    })
}

/// Writes one line to stdout under its lock, so lines from concurrent
/// targets do not interleave.
pub(crate) fn emit_line(line: &str) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}
