//! Uploads for `TransferToRemote` over SSH.
//!
//! `ssh2` is blocking; callers run [`upload`] on the blocking pool.

use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::Session;
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Default SSH port.
pub const SSH_PORT: u16 = 22;

/// SSH-based copy protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferProtocol {
    /// SFTP subsystem.
    Sftp,
    /// Legacy `scp` sink.
    Scp,
}

impl std::fmt::Display for TransferProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sftp => f.write_str("SFTP"),
            Self::Scp => f.write_str("SCP"),
        }
    }
}

/// Destination parsed from a `host:path` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Host name or address, without brackets.
    pub host: String,
    /// Destination path on the remote host.
    pub path: String,
}

impl RemoteTarget {
    /// Parses `host:path`. IPv6 hosts are written in brackets, `[::1]:/tmp/x`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidArgument`] when the host or the path
    /// is missing.
    pub fn parse(input: &str) -> ServerResult<Self> {
        let invalid =
            || ServerError::InvalidArgument(format!("remote path {input:?} is not host:path"));
        let (host, path) = if let Some(rest) = input.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            (host, rest.strip_prefix(':').ok_or_else(invalid)?)
        } else {
            input.split_once(':').ok_or_else(invalid)?
        };
        if host.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_string(),
            path: path.to_string(),
        })
    }
}

/// Password login for the remote host.
#[derive(Clone)]
pub struct Login {
    /// User name.
    pub username: String,
    /// Clear-text password.
    pub password: String,
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Copies `local` to `remote` and returns the number of bytes sent.
///
/// # Errors
///
/// Returns [`ServerError::Transfer`] on connection, authentication or
/// protocol failures and [`ServerError::Io`] on local read errors.
pub fn upload(
    protocol: TransferProtocol,
    remote: &RemoteTarget,
    login: &Login,
    local: &Path,
    timeout: Duration,
) -> ServerResult<u64> {
    let mut file = File::open(local)?;
    let metadata = file.metadata()?;
    let session = connect(&remote.host, login, timeout)?;
    let remote_path = Path::new(&remote.path);

    let sent = match protocol {
        TransferProtocol::Sftp => {
            let sftp = session.sftp()?;
            let mut dst = sftp.create(remote_path)?;
            io::copy(&mut file, &mut dst)?
        }
        TransferProtocol::Scp => {
            let mut channel =
                session.scp_send(remote_path, file_mode(&metadata), metadata.len(), None)?;
            let sent = io::copy(&mut file, &mut channel)?;
            channel.send_eof()?;
            channel.wait_eof()?;
            channel.close()?;
            channel.wait_close()?;
            sent
        }
    };
    debug!(%protocol, host = %remote.host, path = %remote.path, bytes = sent, "upload complete");
    Ok(sent)
}

fn connect(host: &str, login: &Login, timeout: Duration) -> ServerResult<Session> {
    let addr = (host, SSH_PORT)
        .to_socket_addrs()
        .map_err(|e| ServerError::Transfer(format!("resolve {host}: {e}")))?
        .next()
        .ok_or_else(|| ServerError::Transfer(format!("{host} has no addresses")))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| ServerError::Transfer(format!("connect {addr}: {e}")))?;

    let mut session = Session::new()?;
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session.set_tcp_stream(tcp);
    session.handshake()?;
    session.userauth_password(&login.username, &login.password)?;
    if !session.authenticated() {
        return Err(ServerError::Transfer(format!(
            "authentication as {} failed",
            login.username
        )));
    }
    Ok(session)
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> i32 {
    use std::os::unix::fs::PermissionsExt;
    (metadata.permissions().mode() & 0o777) as i32
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> i32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("backup.lab:/tmp/config", "backup.lab", "/tmp/config"; "dns host")]
    #[test_case("10.0.0.1:relative/file", "10.0.0.1", "relative/file"; "relative path")]
    #[test_case("[2001:db8::1]:/var/tmp/x", "2001:db8::1", "/var/tmp/x"; "bracketed ipv6")]
    #[test_case("host:/a:b", "host", "/a:b"; "colon in path")]
    fn test_parse_remote_target(input: &str, host: &str, path: &str) {
        let target = RemoteTarget::parse(input).unwrap();
        assert_eq!(target.host, host);
        assert_eq!(target.path, path);
    }

    #[test_case("no-colon"; "missing separator")]
    #[test_case(":/tmp/x"; "missing host")]
    #[test_case("host:"; "missing path")]
    #[test_case("[::1]/tmp"; "bracket without colon")]
    #[test_case("[::1:/tmp"; "unterminated bracket")]
    fn test_parse_remote_target_rejects(input: &str) {
        assert!(matches!(
            RemoteTarget::parse(input),
            Err(ServerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_login_debug_redacts_password() {
        let login = Login {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{login:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_upload_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let remote = RemoteTarget::parse("127.0.0.1:/tmp/x").unwrap();
        let login = Login {
            username: "u".into(),
            password: "p".into(),
        };
        let err = upload(
            TransferProtocol::Sftp,
            &remote,
            &login,
            &dir.path().join("missing"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
