//! `file` command implementation.

use std::io::Write;
use std::path::PathBuf;

use gnoic_api::{decimal_to_octal, octal_to_decimal, GnoiOption, HashMethod};
use gnoic_proto::file::{StatInfo, TransferToRemoteRequest};
use serde::Serialize;

use super::{hash_method_or_md5, report, request, Context, Done};
use crate::cli::{
    FileCommands, FileGetArgs, FilePutArgs, FileRemoveArgs, FileStatArgs, FileTransferArgs,
};
use crate::error::CliError;
use crate::invoke::file::{self as invoke, Downloaded, PutOptions, Uploaded};
use crate::output::{humanize_bytes, rfc3339_nanos, OutputFormat, TargetRows};

/// File command executor.
pub struct FileCommand {
    ctx: Context,
}

impl FileCommand {
    /// Create a new file command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Execute a file subcommand.
    ///
    /// # Errors
    ///
    /// Returns local setup errors before any RPC, or
    /// [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &FileCommands,
    ) -> Result<(), CliError> {
        match command {
            FileCommands::Get(args) => self.get(writer, format, args).await,
            FileCommands::Put(args) => self.put(writer, format, args).await,
            FileCommands::Stat(args) => self.stat(writer, format, args).await,
            FileCommands::Remove(args) => self.remove(writer, format, args).await,
            FileCommands::Transfer(args) => self.transfer(writer, format, args).await,
        }
    }

    async fn get<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &FileGetArgs,
    ) -> Result<(), CliError> {
        let files = args.file.clone();
        let dst = args.dst.clone().unwrap_or_else(|| PathBuf::from("."));
        let prefix = args.target_prefix;
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let files = files.clone();
                let dst = dst.clone();
                async move {
                    let mut downloads = Vec::with_capacity(files.len());
                    for remote in &files {
                        let local = invoke::local_path(&dst, remote, prefix.then(|| session.name()));
                        downloads.push(invoke::get(&session, remote, &local).await?);
                    }
                    Ok(Downloads { files: downloads })
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn put<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &FilePutArgs,
    ) -> Result<(), CliError> {
        octal_to_decimal(args.permissions)
            .map_err(|e| CliError::config(format!("--permissions: {e}")))?;
        if args.chunk_size == 0 {
            return Err(CliError::config("--chunk-size must be positive"));
        }
        let options = PutOptions {
            permissions: args.permissions,
            chunk_size: args.chunk_size,
            hash_method: hash_method_or_md5(&args.hash_method),
        };
        let uploads = invoke::plan_uploads(&args.file, &args.dst)?;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let uploads = uploads.clone();
                async move {
                    let mut files = Vec::with_capacity(uploads.len());
                    for upload in &uploads {
                        files.push(invoke::put(&session, upload, options).await?);
                    }
                    Ok(Uploads { files })
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn stat<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &FileStatArgs,
    ) -> Result<(), CliError> {
        let path = args.path.clone();
        let recursive = args.recursive;
        let humanize = args.humanize;
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let path = path.clone();
                async move {
                    let stats = invoke::stat(&session, &path, recursive).await?;
                    Ok(StatReport {
                        files: stats.iter().map(StatEntry::from).collect(),
                        humanize,
                    })
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn remove<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &FileRemoveArgs,
    ) -> Result<(), CliError> {
        let path = args.path.clone();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let path = path.clone();
                async move {
                    invoke::remove(&session, &path).await?;
                    Ok(Done::new(format!("{path} removed")))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn transfer<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &FileTransferArgs,
    ) -> Result<(), CliError> {
        let request = transfer_request(args)?;
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let request = request.clone();
                async move {
                    let hash = invoke::transfer(&session, request).await?;
                    Ok(Transferred {
                        hash_method: hash
                            .as_ref()
                            .and_then(|h| HashMethod::from_proto(h.method).ok())
                            .map(|m| m.to_string())
                            .unwrap_or_default(),
                        hash: hash.map(|h| hex::encode(h.hash)).unwrap_or_default(),
                    })
                }
            })
            .await;
        report(writer, format, entries, failed)
    }
}

fn transfer_request(args: &FileTransferArgs) -> Result<TransferToRemoteRequest, CliError> {
    let mut options = vec![
        GnoiOption::LocalPath(args.local.clone()),
        GnoiOption::RemotePath(args.remote.clone()),
        GnoiOption::Protocol(args.protocol.clone()),
    ];
    let optional: [(&Option<String>, fn(String) -> GnoiOption); 4] = [
        (&args.remote_username, GnoiOption::Username),
        (&args.remote_password, GnoiOption::Password),
        (&args.source_address, GnoiOption::SourceAddress),
        (&args.source_vrf, GnoiOption::SourceVrf),
    ];
    options.extend(
        optional
            .into_iter()
            .filter_map(|(value, option)| value.clone().map(option)),
    );
    request(options)
}

#[derive(Debug, Clone, Serialize)]
struct Downloads {
    files: Vec<Downloaded>,
}

impl TargetRows for Downloads {
    const HEADERS: &'static [&'static str] = &["Remote", "Local", "Size", "Hash Method"];

    fn rows(&self) -> Vec<Vec<String>> {
        self.files
            .iter()
            .map(|f| {
                vec![
                    f.remote.clone(),
                    f.local.display().to_string(),
                    f.size.to_string(),
                    f.hash_method.clone(),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
struct Uploads {
    files: Vec<Uploaded>,
}

impl TargetRows for Uploads {
    const HEADERS: &'static [&'static str] = &["Local", "Remote", "Size", "Hash"];

    fn rows(&self) -> Vec<Vec<String>> {
        self.files
            .iter()
            .map(|f| {
                vec![
                    f.local.display().to_string(),
                    f.remote.clone(),
                    f.size.to_string(),
                    f.hash.clone(),
                ]
            })
            .collect()
    }
}

/// One stat result with its timestamp and mode rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StatEntry {
    path: String,
    last_modified: String,
    permissions: String,
    umask: String,
    size: u64,
}

impl From<&StatInfo> for StatEntry {
    fn from(info: &StatInfo) -> Self {
        let octal = |mode: u32| {
            decimal_to_octal(mode).map_or_else(|_| mode.to_string(), |digits| format!("{digits:04}"))
        };
        Self {
            path: info.path.clone(),
            last_modified: rfc3339_nanos(info.last_modified as i64),
            permissions: octal(info.permissions),
            umask: octal(info.umask),
            size: info.size,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct StatReport {
    files: Vec<StatEntry>,
    #[serde(skip)]
    humanize: bool,
}

impl TargetRows for StatReport {
    const HEADERS: &'static [&'static str] = &["Path", "Last Modified", "Perms", "Umask", "Size"];

    fn rows(&self) -> Vec<Vec<String>> {
        self.files
            .iter()
            .map(|f| {
                vec![
                    f.path.clone(),
                    f.last_modified.clone(),
                    f.permissions.clone(),
                    f.umask.clone(),
                    if self.humanize {
                        humanize_bytes(f.size)
                    } else {
                        f.size.to_string()
                    },
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
struct Transferred {
    hash_method: String,
    hash: String,
}

impl TargetRows for Transferred {
    const HEADERS: &'static [&'static str] = &["Hash Method", "Hash"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.hash_method.clone(), self.hash.clone()]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoic_proto::common::remote_download::Protocol;

    #[test]
    fn stat_entry_renders_octal_mode() {
        let entry = StatEntry::from(&StatInfo {
            path: "/tmp/a".into(),
            last_modified: 0,
            permissions: 0o644,
            size: 2048,
            umask: 0o022,
        });
        assert_eq!(entry.permissions, "0644");
        assert_eq!(entry.umask, "0022");
        assert_eq!(entry.last_modified, "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn stat_rows_humanize_sizes() {
        let report = StatReport {
            files: vec![StatEntry::from(&StatInfo {
                path: "/a".into(),
                size: 2048,
                ..Default::default()
            })],
            humanize: true,
        };
        assert_eq!(report.rows()[0][4], "2.0 KiB");
    }

    #[test]
    fn transfer_request_nests_remote_download() {
        let args = FileTransferArgs {
            local: "/var/log/messages".into(),
            remote: "backup:/logs/messages".into(),
            protocol: "scp".into(),
            remote_username: Some("admin".into()),
            remote_password: None,
            source_address: Some("10.0.0.1".into()),
            source_vrf: None,
        };
        let req = transfer_request(&args).unwrap();
        assert_eq!(req.local_path, "/var/log/messages");
        let remote = req.remote_download.unwrap();
        assert_eq!(remote.path, "backup:/logs/messages");
        assert_eq!(remote.protocol, Protocol::Scp as i32);
        assert_eq!(remote.credentials.unwrap().username, "admin");
        assert_eq!(remote.source_address, "10.0.0.1");
    }

    #[test]
    fn bad_protocol_is_config_error() {
        let args = FileTransferArgs {
            local: "/a".into(),
            remote: "/b".into(),
            protocol: "gopher".into(),
            remote_username: None,
            remote_password: None,
            source_address: None,
            source_vrf: None,
        };
        assert!(matches!(transfer_request(&args), Err(CliError::Config(_))));
    }
}
