//! File service: Get, Put, Stat, Remove and TransferToRemote.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use gnoic_api::{build, GnoiOption, HashMethod};
use gnoic_proto::file::{
    get_response, GetRequest, PutRequest, RemoveRequest, StatInfo, StatRequest,
    TransferToRemoteRequest,
};
use gnoic_proto::types::HashType;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CliError;
use crate::stream::next_message;
use crate::transport::Session;

/// A file fetched with `File.Get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Downloaded {
    /// Remote path.
    pub remote: String,
    /// Where the file was written.
    pub local: PathBuf,
    /// Bytes received.
    pub size: u64,
    /// Hash method the target used.
    pub hash_method: String,
}

/// Returns the local path for `remote`: its base name under `dst`,
/// optionally prefixed with the target name.
#[must_use]
pub fn local_path(dst: &Path, remote: &str, target_prefix: Option<&str>) -> PathBuf {
    let base = remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|b| !b.is_empty())
        .unwrap_or("download");
    match target_prefix {
        Some(target) => dst.join(format!("{target}_{base}")),
        None => dst.join(base),
    }
}

/// Downloads `remote` into `local`.
///
/// Contents are buffered until the trailing hash message verifies; nothing
/// is written on a mismatch.
///
/// # Errors
///
/// Fails on RPC errors, on a stream that ends without a hash or carries
/// data after it, on hash mismatch, and on local write errors.
pub async fn get(session: &Session, remote: &str, local: &Path) -> Result<Downloaded, CliError> {
    let request: GetRequest = build([GnoiOption::RemoteFile(remote.to_string())])?;
    let mut stream = session.unary(session.file().get(request)).await?;
    let cancel = session.cancel_token();

    let mut contents = Vec::new();
    let mut hash: Option<HashType> = None;
    while let Some(message) = next_message(&mut stream, cancel).await? {
        match (message.response, &hash) {
            (Some(get_response::Response::Contents(chunk)), None) => {
                contents.extend_from_slice(&chunk);
            }
            (Some(get_response::Response::Hash(h)), None) => hash = Some(h),
            (Some(_), Some(_)) => {
                return Err(CliError::protocol(format!("{remote}: message after hash")));
            }
            (None, _) => {
                return Err(CliError::protocol(format!("{remote}: empty response")));
            }
        }
    }
    let hash =
        hash.ok_or_else(|| CliError::protocol(format!("{remote}: stream ended before hash")))?;
    gnoic_api::verify(&hash, &contents)
        .map_err(|e| CliError::Payload(format!("{remote}: {e}")))?;

    if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(local, &contents).await?;
    info!(target = %session.name(), remote, local = %local.display(), size = contents.len(), "file received");

    Ok(Downloaded {
        remote: remote.to_string(),
        local: local.to_path_buf(),
        size: contents.len() as u64,
        hash_method: HashMethod::from_proto(hash.method)
            .map(|m| m.to_string())
            .unwrap_or_default(),
    })
}

/// One local file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Local source.
    pub local: PathBuf,
    /// Remote destination.
    pub remote: String,
}

/// Plans the uploads for `source`.
///
/// A directory is walked depth-first in name order. With more than one
/// file, each lands at `dst` joined with its path relative to `source`.
///
/// # Errors
///
/// Returns [`CliError::Config`] when `source` cannot be read or holds no
/// files.
pub fn plan_uploads(source: &Path, dst: &str) -> Result<Vec<Upload>, CliError> {
    let meta = std::fs::metadata(source)
        .map_err(|e| CliError::config(format!("{}: {e}", source.display())))?;
    if !meta.is_dir() {
        return Ok(vec![Upload {
            local: source.to_path_buf(),
            remote: dst.to_string(),
        }]);
    }

    let mut files = Vec::new();
    walk(source, &mut files).map_err(|e| CliError::config(format!("{}: {e}", source.display())))?;
    if files.is_empty() {
        return Err(CliError::config(format!("{}: no files to upload", source.display())));
    }
    if files.len() == 1 {
        return Ok(vec![Upload {
            local: files.remove(0),
            remote: dst.to_string(),
        }]);
    }
    Ok(files
        .into_iter()
        .map(|local| {
            let relative = local
                .strip_prefix(source)
                .unwrap_or(&local)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            Upload {
                remote: format!("{}/{relative}", dst.trim_end_matches('/')),
                local,
            }
        })
        .collect())
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Settings shared by every upload of one `file put`.
#[derive(Debug, Clone, Copy)]
pub struct PutOptions {
    /// Permissions as octal digits.
    pub permissions: u32,
    /// Bytes per content message.
    pub chunk_size: usize,
    /// Method of the trailing hash.
    pub hash_method: HashMethod,
}

/// A completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Uploaded {
    /// Local source.
    pub local: PathBuf,
    /// Remote destination.
    pub remote: String,
    /// Bytes sent.
    pub size: u64,
    /// Hex digest sent in the hash message.
    pub hash: String,
}

/// Uploads one file with `File.Put`.
///
/// The stream is Open, then one contents message per chunk, then exactly
/// one hash message.
///
/// # Errors
///
/// Fails on RPC errors, local read errors and cancellation.
pub async fn put(
    session: &Session,
    upload: &Upload,
    options: PutOptions,
) -> Result<Uploaded, CliError> {
    let open: PutRequest = build([
        GnoiOption::RemoteFile(upload.remote.clone()),
        GnoiOption::Permissions(options.permissions),
    ])?;
    let mut client = session.file();
    let (_, produced) = super::upload(
        session,
        &upload.local,
        open,
        options.chunk_size,
        options.hash_method,
        move |rx| async move { client.put(rx).await },
    )
    .await?;

    debug!(target = %session.name(), remote = %upload.remote, size = produced.size, "file sent");
    Ok(Uploaded {
        local: upload.local.clone(),
        remote: upload.remote.clone(),
        size: produced.size,
        hash: produced.hash.map(|h| hex::encode(h.hash)).unwrap_or_default(),
    })
}

/// Stats `path`; with `recursive`, descends into directories.
///
/// A directory is recognized by a stat result that is not exactly the
/// entry itself.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn stat(session: &Session, path: &str, recursive: bool) -> Result<Vec<StatInfo>, CliError> {
    let first = stat_once(session, path).await?;
    if !recursive {
        return Ok(first);
    }

    let mut out = Vec::new();
    let mut queue: VecDeque<StatInfo> = first.into();
    while let Some(info) = queue.pop_front() {
        let children = stat_once(session, &info.path).await?;
        match children.as_slice() {
            [only] if only.path == info.path => out.push(info),
            _ => {
                for child in children {
                    if child.path != info.path {
                        queue.push_back(child);
                    }
                }
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

async fn stat_once(session: &Session, path: &str) -> Result<Vec<StatInfo>, CliError> {
    let request: StatRequest = build([GnoiOption::FilePath(path.to_string())])?;
    Ok(session.unary(session.file().stat(request)).await?.stats)
}

/// Removes a remote file.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn remove(session: &Session, path: &str) -> Result<(), CliError> {
    let request: RemoveRequest = build([GnoiOption::RemoteFile(path.to_string())])?;
    session.unary(session.file().remove(request)).await?;
    info!(target = %session.name(), path, "file removed");
    Ok(())
}

/// Asks the target to upload one of its files to a remote host.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn transfer(
    session: &Session,
    request: TransferToRemoteRequest,
) -> Result<Option<HashType>, CliError> {
    let response = session
        .unary(session.file().transfer_to_remote(request))
        .await?;
    Ok(response.hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_uses_basename() {
        let dst = Path::new("/tmp/out");
        assert_eq!(local_path(dst, "/etc/motd", None), dst.join("motd"));
        assert_eq!(
            local_path(dst, "/etc/motd", Some("r1")),
            dst.join("r1_motd")
        );
        assert_eq!(local_path(dst, "/var/log/", None), dst.join("log"));
    }

    #[test]
    fn single_file_keeps_destination() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"a").unwrap();
        assert_eq!(
            plan_uploads(&file, "/tmp/a.txt").unwrap(),
            vec![Upload {
                local: file,
                remote: "/tmp/a.txt".into()
            }]
        );
    }

    #[test]
    fn directory_walk_is_depth_first_and_joined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("sub/deeper/c.txt"), b"c").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let remotes: Vec<_> = plan_uploads(dir.path(), "/cfg/")
            .unwrap()
            .into_iter()
            .map(|u| u.remote)
            .collect();
        assert_eq!(
            remotes,
            vec!["/cfg/a.txt", "/cfg/b.txt", "/cfg/sub/deeper/c.txt"]
        );
    }

    #[test]
    fn empty_directory_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            plan_uploads(dir.path(), "/x"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn missing_source_is_config_error() {
        assert!(matches!(
            plan_uploads(Path::new("/definitely/not/here"), "/x"),
            Err(CliError::Config(_))
        ));
    }
}
