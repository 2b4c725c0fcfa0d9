//! File service request handlers.
//!
//! Each handler works on plain request values so it can be driven without a
//! gRPC transport; [`crate::server`] adapts them to the generated trait.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use futures::{Stream, StreamExt};
use gnoic_api::{decimal_to_octal, octal_to_decimal, ApiError, HashMethod};
use gnoic_proto::common::remote_download::Protocol;
use gnoic_proto::file::{get_response, put_request, GetResponse, PutRequest, StatInfo};
use gnoic_proto::file::TransferToRemoteRequest;
use gnoic_proto::types::{credentials, Credentials, HashType};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::rooted::{contain, resolve_contained, resolve_file_contained};
use crate::transfer::{self, Login, RemoteTarget, TransferProtocol};

/// Prefix of in-flight `Put` temporary files.
pub const TEMP_PREFIX: &str = ".gnoic-put-";

/// Mode applied when a `Put` carries no permissions.
pub const DEFAULT_MODE: u32 = 0o644;

const HASH_READ_CHUNK: u64 = 64 * 1024;

/// Resolves a `Get` target, refusing directories.
pub async fn open_get(root: &Path, remote_file: &str) -> ServerResult<PathBuf> {
    let path = resolve_file_contained(root, remote_file).await?;
    let meta = fs::metadata(&path)
        .await
        .map_err(|e| ServerError::io_at(remote_file, e))?;
    if meta.is_dir() {
        return Err(ServerError::IsDirectory(remote_file.to_string()));
    }
    Ok(path)
}

/// Streams `path` as content messages followed by one hash message.
///
/// Failures are delivered to the client as a terminal status.
pub async fn send_file(
    path: PathBuf,
    method: HashMethod,
    chunk_size: usize,
    tx: mpsc::Sender<Result<GetResponse, Status>>,
) {
    if let Err(e) = send_chunks(&path, method, chunk_size, &tx).await {
        warn!(path = %path.display(), error = %e, "get failed");
        let _ = tx.send(Err(e.into())).await;
    }
}

async fn send_chunks(
    path: &Path,
    method: HashMethod,
    chunk_size: usize,
    tx: &mpsc::Sender<Result<GetResponse, Status>>,
) -> ServerResult<()> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = method.hasher().map_err(invalid)?;
    let mut sent = 0u64;
    loop {
        let mut chunk = Vec::with_capacity(chunk_size);
        let n = (&mut file)
            .take(chunk_size as u64)
            .read_to_end(&mut chunk)
            .await?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk);
        sent += n as u64;
        let msg = GetResponse {
            response: Some(get_response::Response::Contents(chunk)),
        };
        if tx.send(Ok(msg)).await.is_err() {
            debug!(path = %path.display(), "client went away during get");
            return Ok(());
        }
    }
    let msg = GetResponse {
        response: Some(get_response::Response::Hash(hasher.finalize())),
    };
    let _ = tx.send(Ok(msg)).await;
    info!(path = %path.display(), bytes = sent, %method, "get complete");
    Ok(())
}

/// Receives a `Put` stream and installs the file under `root`.
///
/// The stream must be exactly one `Open`, any number of `Contents` and one
/// `Hash`, then end. Content lands in a temporary file beside the
/// destination which is renamed into place only after the hash verifies.
/// The temporary file is removed on every failure path.
pub async fn receive_put<S>(root: &Path, mut stream: S) -> ServerResult<PathBuf>
where
    S: Stream<Item = Result<PutRequest, Status>> + Unpin,
{
    let details = match next_put(&mut stream).await? {
        Some(put_request::Request::Open(details)) => details,
        Some(other) => {
            return Err(ServerError::UnexpectedMessage(format!(
                "{} before Open",
                put_variant(&other)
            )))
        }
        None => {
            return Err(ServerError::UnexpectedMessage(
                "stream ended before Open".into(),
            ))
        }
    };

    let dest = resolve_file_contained(root, &details.remote_file).await?;
    let mode = requested_mode(details.permissions)?;
    if fs::metadata(&dest).await.is_ok_and(|m| m.is_dir()) {
        return Err(ServerError::IsDirectory(details.remote_file));
    }
    let dir = dest
        .parent()
        .ok_or_else(|| ServerError::InvalidArgument(details.remote_file.clone()))?;
    fs::create_dir_all(dir).await?;
    contain(root, dir, &details.remote_file).await?;

    let (file, temp_path) = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?
        .into_parts();
    let mut file = fs::File::from_std(file);
    let mut received = 0u64;

    let expected = loop {
        match next_put(&mut stream).await? {
            Some(put_request::Request::Contents(bytes)) => {
                file.write_all(&bytes).await?;
                received += bytes.len() as u64;
            }
            Some(put_request::Request::Hash(hash)) => break hash,
            Some(put_request::Request::Open(_)) => {
                return Err(ServerError::UnexpectedMessage(
                    "second Open in one Put stream".into(),
                ))
            }
            None => {
                return Err(ServerError::UnexpectedMessage(
                    "stream ended before Hash".into(),
                ))
            }
        }
    };
    if let Some(extra) = next_put(&mut stream).await? {
        return Err(ServerError::UnexpectedMessage(format!(
            "{} after Hash",
            put_variant(&extra)
        )));
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    let reopened = fs::File::open(&temp_path).await?;
    verify_reader(reopened, &expected).await?;
    set_mode(&temp_path, mode).await?;
    temp_path
        .persist(&dest)
        .map_err(|e| ServerError::Io(e.error))?;

    info!(path = %dest.display(), bytes = received, mode = %format!("{mode:o}"), "put complete");
    Ok(dest)
}

async fn next_put<S>(stream: &mut S) -> ServerResult<Option<put_request::Request>>
where
    S: Stream<Item = Result<PutRequest, Status>> + Unpin,
{
    match stream.next().await {
        None => Ok(None),
        Some(Err(status)) => Err(ServerError::ClientStream(status)),
        Some(Ok(PutRequest { request: Some(r) })) => Ok(Some(r)),
        Some(Ok(PutRequest { request: None })) => Err(ServerError::UnexpectedMessage(
            "empty PutRequest".into(),
        )),
    }
}

const fn put_variant(request: &put_request::Request) -> &'static str {
    match request {
        put_request::Request::Open(_) => "Open",
        put_request::Request::Contents(_) => "Contents",
        put_request::Request::Hash(_) => "Hash",
    }
}

fn requested_mode(permissions: u32) -> ServerResult<u32> {
    if permissions == 0 {
        return Ok(DEFAULT_MODE);
    }
    let mode = octal_to_decimal(permissions).map_err(invalid)?;
    if mode > 0o777 {
        return Err(ServerError::InvalidArgument(format!(
            "permissions {permissions} exceed 777"
        )));
    }
    Ok(mode)
}

async fn verify_reader<R>(mut reader: R, expected: &HashType) -> ServerResult<()>
where
    R: AsyncRead + Unpin,
{
    let method = HashMethod::from_proto(expected.method).map_err(invalid)?;
    let mut hasher = method.hasher().map_err(invalid)?;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = (&mut reader)
            .take(HASH_READ_CHUNK)
            .read_to_end(&mut buf)
            .await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf);
    }
    hasher.verify(expected).map_err(|e| match e {
        ApiError::WrongHash { .. } => ServerError::HashMismatch(e),
        other => invalid(other),
    })
}

/// Hashes a local file with `method`.
pub async fn hash_file(path: &Path, method: HashMethod) -> ServerResult<HashType> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = method.hasher().map_err(invalid)?;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = (&mut file)
            .take(HASH_READ_CHUNK)
            .read_to_end(&mut buf)
            .await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf);
    }
    Ok(hasher.finalize())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> ServerResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(path: &Path, mode: u32) -> ServerResult<()> {
    let mut perms = fs::metadata(path).await?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Stats a file, or every entry of a directory sorted by name.
pub async fn stat(root: &Path, client: &str) -> ServerResult<Vec<StatInfo>> {
    let path = resolve_contained(root, client).await?;
    let meta = fs::metadata(&path)
        .await
        .map_err(|e| ServerError::io_at(client, e))?;
    if !meta.is_dir() {
        return Ok(vec![stat_info(client.to_string(), &meta)?]);
    }

    let base = client.trim_end_matches('/');
    let mut entries = fs::read_dir(&path).await?;
    let mut stats = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        let name = entry.file_name();
        stats.push(stat_info(
            format!("{base}/{}", name.to_string_lossy()),
            &meta,
        )?);
    }
    stats.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(stats)
}

fn stat_info(path: String, meta: &Metadata) -> ServerResult<StatInfo> {
    let last_modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as u64);
    Ok(StatInfo {
        path,
        last_modified,
        permissions: decimal_to_octal(mode_bits(meta)).map_err(invalid)?,
        size: meta.len(),
        umask: 0,
    })
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Removes a single file.
pub async fn remove(root: &Path, remote_file: &str) -> ServerResult<()> {
    let path = resolve_file_contained(root, remote_file).await?;
    let meta = fs::metadata(&path)
        .await
        .map_err(|e| ServerError::io_at(remote_file, e))?;
    if meta.is_dir() {
        return Err(ServerError::IsDirectory(remote_file.to_string()));
    }
    fs::remove_file(&path).await?;
    info!(path = %path.display(), "removed");
    Ok(())
}

/// Uploads a served file to a remote host and returns its hash.
pub async fn transfer_to_remote(
    config: &ServerConfig,
    request: TransferToRemoteRequest,
) -> ServerResult<HashType> {
    let local = resolve_file_contained(config.root(), &request.local_path).await?;
    let download = request
        .remote_download
        .ok_or_else(|| ServerError::InvalidArgument("remote_download is required".into()))?;

    let protocol = match Protocol::try_from(download.protocol) {
        Ok(Protocol::Sftp) => TransferProtocol::Sftp,
        Ok(Protocol::Scp) => TransferProtocol::Scp,
        Ok(p @ (Protocol::Http | Protocol::Https)) => {
            return Err(ServerError::Unimplemented(format!(
                "{} upload",
                p.as_str_name()
            )))
        }
        _ => {
            return Err(ServerError::InvalidArgument(format!(
                "unsupported protocol {}",
                download.protocol
            )))
        }
    };
    let remote = RemoteTarget::parse(&download.path)?;
    let login = login(download.credentials)?;
    if !download.source_address.is_empty() || !download.source_vrf.is_empty() {
        debug!(
            source_address = %download.source_address,
            source_vrf = %download.source_vrf,
            "source address and VRF are not applied to SSH uploads"
        );
    }

    let meta = fs::metadata(&local)
        .await
        .map_err(|e| ServerError::io_at(&request.local_path, e))?;
    if meta.is_dir() {
        return Err(ServerError::IsDirectory(request.local_path));
    }

    let timeout = config.transfer_timeout;
    let source = local.clone();
    tokio::task::spawn_blocking(move || {
        transfer::upload(protocol, &remote, &login, &source, timeout)
    })
    .await
    .map_err(|e| ServerError::Transfer(format!("upload task failed: {e}")))??;

    hash_file(&local, config.hash_method).await
}

fn login(credentials: Option<Credentials>) -> ServerResult<Login> {
    let credentials = credentials
        .ok_or_else(|| ServerError::InvalidArgument("credentials are required".into()))?;
    match credentials.password {
        Some(credentials::Password::Cleartext(password)) => Ok(Login {
            username: credentials.username,
            password,
        }),
        Some(credentials::Password::Hashed(_)) => Err(ServerError::InvalidArgument(
            "hashed passwords cannot be used for SSH login".into(),
        )),
        None => Err(ServerError::InvalidArgument("password is required".into())),
    }
}

fn invalid(err: ApiError) -> ServerError {
    ServerError::InvalidArgument(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoic_api::hash;
    use gnoic_proto::common::RemoteDownload;
    use gnoic_proto::file::put_request::Details;
    use test_case::test_case;

    fn open(remote_file: &str, permissions: u32) -> Result<PutRequest, Status> {
        Ok(PutRequest {
            request: Some(put_request::Request::Open(Details {
                remote_file: remote_file.into(),
                permissions,
            })),
        })
    }

    fn contents(bytes: &[u8]) -> Result<PutRequest, Status> {
        Ok(PutRequest {
            request: Some(put_request::Request::Contents(bytes.to_vec())),
        })
    }

    fn hash_msg(h: HashType) -> Result<PutRequest, Status> {
        Ok(PutRequest {
            request: Some(put_request::Request::Hash(h)),
        })
    }

    fn no_temp_files(dir: &Path) -> bool {
        std::fs::read_dir(dir).map_or(true, |entries| {
            entries
                .flatten()
                .all(|e| !e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
        })
    }

    #[tokio::test]
    async fn test_put_writes_file_with_mode() {
        let root = tempfile::tempdir().unwrap();
        let data = b"interface eth0\n";
        let stream = futures::stream::iter(vec![
            open("/cfg/startup.conf", 640),
            contents(&data[..5]),
            contents(&data[5..]),
            hash_msg(hash(HashMethod::Sha256, data).unwrap()),
        ]);
        let dest = receive_put(root.path(), stream).await.unwrap();
        assert_eq!(dest, root.path().join("cfg/startup.conf"));
        assert_eq!(std::fs::read(&dest).unwrap(), data);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o640);
        }
    }

    #[tokio::test]
    async fn test_put_wrong_hash_leaves_nothing() {
        let root = tempfile::tempdir().unwrap();
        let stream = futures::stream::iter(vec![
            open("f", 644),
            contents(b"abc"),
            hash_msg(hash(HashMethod::Md5, b"abd").unwrap()),
        ]);
        let err = receive_put(root.path(), stream).await.unwrap_err();
        assert!(matches!(err, ServerError::HashMismatch(_)));
        assert!(!root.path().join("f").exists());
        assert!(no_temp_files(root.path()));
    }

    #[tokio::test]
    async fn test_put_requires_open_first() {
        let root = tempfile::tempdir().unwrap();
        let stream = futures::stream::iter(vec![contents(b"abc")]);
        let err = receive_put(root.path(), stream).await.unwrap_err();
        assert_eq!(err.to_string(), "unexpected message: Contents before Open");
    }

    #[tokio::test]
    async fn test_put_rejects_second_open() {
        let root = tempfile::tempdir().unwrap();
        let stream = futures::stream::iter(vec![open("f", 644), contents(b"a"), open("g", 644)]);
        let err = receive_put(root.path(), stream).await.unwrap_err();
        assert!(matches!(err, ServerError::UnexpectedMessage(_)));
        assert!(no_temp_files(root.path()));
    }

    #[tokio::test]
    async fn test_put_rejects_content_after_hash() {
        let root = tempfile::tempdir().unwrap();
        let stream = futures::stream::iter(vec![
            open("f", 644),
            hash_msg(hash(HashMethod::Md5, b"").unwrap()),
            contents(b"late"),
        ]);
        let err = receive_put(root.path(), stream).await.unwrap_err();
        assert_eq!(err.to_string(), "unexpected message: Contents after Hash");
        assert!(!root.path().join("f").exists());
    }

    #[tokio::test]
    async fn test_put_missing_hash() {
        let root = tempfile::tempdir().unwrap();
        let stream = futures::stream::iter(vec![open("f", 644), contents(b"abc")]);
        assert!(matches!(
            receive_put(root.path(), stream).await,
            Err(ServerError::UnexpectedMessage(_))
        ));
        assert!(no_temp_files(root.path()));
    }

    #[tokio::test]
    async fn test_put_traversal_refused_before_io() {
        let root = tempfile::tempdir().unwrap();
        let jail = root.path().join("jail");
        std::fs::create_dir(&jail).unwrap();
        let stream = futures::stream::iter(vec![open("../../etc/passwd", 644)]);
        let err = receive_put(&jail, stream).await.unwrap_err();
        assert!(matches!(err, ServerError::PathEscape(_)));
        assert_eq!(std::fs::read_dir(&jail).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_put_unspecified_hash_is_invalid() {
        let root = tempfile::tempdir().unwrap();
        let stream = futures::stream::iter(vec![
            open("f", 644),
            hash_msg(HashType::default()),
        ]);
        let err = receive_put(root.path(), stream).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidArgument(_)));
    }

    #[cfg(unix)]
    fn linked_out() -> (tempfile::TempDir, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("passwd"), b"secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        (root, outside)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_is_refused() {
        let (root, outside) = linked_out();
        let escaped = |r: ServerResult<()>| matches!(r, Err(ServerError::PathEscape(_)));

        assert!(escaped(open_get(root.path(), "/link/passwd").await.map(|_| ())));
        assert!(escaped(stat(root.path(), "/link").await.map(|_| ())));
        assert!(escaped(remove(root.path(), "/link/passwd").await));
        assert_eq!(std::fs::read(outside.path().join("passwd")).unwrap(), b"secret");

        let stream = futures::stream::iter(vec![
            open("/link/sub/planted", 644),
            contents(b"x"),
            hash_msg(hash(HashMethod::Md5, b"x").unwrap()),
        ]);
        assert!(escaped(receive_put(root.path(), stream).await.map(|_| ())));
        assert!(!outside.path().join("sub").exists());
        assert!(no_temp_files(outside.path()));
    }

    #[test_case(0, 0o644; "default")]
    #[test_case(755, 0o755; "rwxr-xr-x")]
    #[test_case(600, 0o600; "owner only")]
    fn test_requested_mode(permissions: u32, expected: u32) {
        assert_eq!(requested_mode(permissions).unwrap(), expected);
    }

    #[test_case(778; "non-octal digit")]
    #[test_case(4755; "setuid")]
    fn test_requested_mode_rejects(permissions: u32) {
        assert!(requested_mode(permissions).is_err());
    }

    #[tokio::test]
    async fn test_get_streams_chunks_then_hash() {
        let root = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(root.path().join("blob"), &data).unwrap();

        let path = open_get(root.path(), "/blob").await.unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(send_file(path, HashMethod::Sha512, 4096, tx));

        let mut sizes = Vec::new();
        let mut buf = Vec::new();
        let mut trailer = None;
        while let Some(msg) = rx.recv().await {
            match msg.unwrap().response.unwrap() {
                get_response::Response::Contents(c) => {
                    sizes.push(c.len());
                    buf.extend(c);
                }
                get_response::Response::Hash(h) => trailer = Some(h),
            }
        }
        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(buf, data);
        assert_eq!(trailer.unwrap(), hash(HashMethod::Sha512, &data).unwrap());
    }

    #[tokio::test]
    async fn test_get_refuses_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("d")).unwrap();
        assert!(matches!(
            open_get(root.path(), "d").await,
            Err(ServerError::IsDirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing_file() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            open_get(root.path(), "/nope").await,
            Err(ServerError::NotFound(p)) if p == "/nope"
        ));
    }

    #[tokio::test]
    async fn test_stat_directory_lists_entries() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("d")).unwrap();
        std::fs::write(root.path().join("d/b"), b"12345").unwrap();
        std::fs::write(root.path().join("d/a"), b"1").unwrap();

        let stats = stat(root.path(), "/d/").await.unwrap();
        let paths: Vec<_> = stats.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["/d/a", "/d/b"]);
        assert_eq!(stats[1].size, 5);
        assert!(stats[0].last_modified > 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stat_reports_octal_digits() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();

        let stats = stat(root.path(), "f").await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].path, "f");
        assert_eq!(stats[0].permissions, 755);
    }

    #[tokio::test]
    async fn test_stat_escape_refused() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            stat(root.path(), "../..").await,
            Err(ServerError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_file_and_refuse_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("f"), b"x").unwrap();
        std::fs::create_dir(root.path().join("d")).unwrap();

        remove(root.path(), "f").await.unwrap();
        assert!(!root.path().join("f").exists());
        assert!(matches!(
            remove(root.path(), "d").await,
            Err(ServerError::IsDirectory(_))
        ));
        assert!(root.path().join("d").exists());
    }

    fn transfer_request(protocol: Protocol, credentials: Option<Credentials>) -> TransferToRemoteRequest {
        TransferToRemoteRequest {
            local_path: "f".into(),
            remote_download: Some(RemoteDownload {
                path: "backup.lab:/tmp/f".into(),
                protocol: protocol as i32,
                credentials,
                ..Default::default()
            }),
        }
    }

    fn cleartext() -> Option<Credentials> {
        Some(Credentials {
            username: "admin".into(),
            password: Some(credentials::Password::Cleartext("admin".into())),
        })
    }

    #[test_case(Protocol::Http; "http")]
    #[test_case(Protocol::Https; "https")]
    #[tokio::test]
    async fn test_transfer_http_unimplemented(protocol: Protocol) {
        let root = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), root.path());
        let err = transfer_to_remote(&config, transfer_request(protocol, cleartext()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Unimplemented(_)));
    }

    #[tokio::test]
    async fn test_transfer_requires_cleartext_password() {
        let root = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), root.path());
        let hashed = Some(Credentials {
            username: "admin".into(),
            password: Some(credentials::Password::Hashed(HashType::default())),
        });
        let err = transfer_to_remote(&config, transfer_request(Protocol::Sftp, hashed))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_transfer_unknown_protocol() {
        let root = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), root.path());
        let err = transfer_to_remote(&config, transfer_request(Protocol::Unknown, cleartext()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_transfer_missing_local_file() {
        let root = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), root.path());
        let err = transfer_to_remote(&config, transfer_request(Protocol::Scp, cleartext()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_hash_file_matches_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let data = vec![7u8; 200_000];
        std::fs::write(&path, &data).unwrap();
        assert_eq!(
            hash_file(&path, HashMethod::Md5).await.unwrap(),
            hash(HashMethod::Md5, &data).unwrap()
        );
    }
}
