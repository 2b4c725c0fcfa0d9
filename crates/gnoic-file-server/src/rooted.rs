//! Containment of client paths under the served root.
//!
//! Client paths are interpreted relative to the root whether or not they
//! start with `/`. Resolution is purely lexical: `.` is dropped, `..` pops a
//! component, and popping past the root is refused. [`contain`] then
//! follows symlinks on the deepest existing ancestor and refuses anything
//! that lands outside the root.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::error::{ServerError, ServerResult};

/// Resolves `client` under `root`.
///
/// # Errors
///
/// Returns [`ServerError::PathEscape`] when the path climbs above the root
/// or carries a platform prefix (such as a Windows drive letter).
pub fn resolve(root: &Path, client: &str) -> ServerResult<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(client).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(ServerError::PathEscape(client.to_string()));
                }
            }
            Component::Prefix(_) => return Err(ServerError::PathEscape(client.to_string())),
        }
    }
    Ok(root.join(relative))
}

/// Resolves `client` and requires it to name something below the root.
///
/// # Errors
///
/// As [`resolve`], plus [`ServerError::InvalidArgument`] when the path is
/// empty or names the root itself.
pub fn resolve_file(root: &Path, client: &str) -> ServerResult<PathBuf> {
    let path = resolve(root, client)?;
    if path == root {
        return Err(ServerError::InvalidArgument(format!(
            "path {client:?} does not name a file"
        )));
    }
    Ok(path)
}

/// Checks that `path`, with symlinks followed, stays below `root`.
///
/// `path` need not exist: the deepest ancestor that does is checked, so a
/// symlinked directory pointing outside the root is refused before anything
/// is created through it.
///
/// # Errors
///
/// Returns [`ServerError::PathEscape`] when the real location is outside the
/// root, and [`ServerError::Io`] when the root cannot be resolved.
pub async fn contain(root: &Path, path: &Path, client: &str) -> ServerResult<()> {
    let root = fs::canonicalize(root).await?;
    let mut probe = path;
    let real = loop {
        match fs::canonicalize(probe).await {
            Ok(real) => break real,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                probe = probe
                    .parent()
                    .ok_or_else(|| ServerError::PathEscape(client.to_string()))?;
            }
            Err(e) => return Err(e.into()),
        }
    };
    if real.starts_with(&root) {
        Ok(())
    } else {
        Err(ServerError::PathEscape(client.to_string()))
    }
}

/// [`resolve`] followed by [`contain`].
///
/// # Errors
///
/// As [`resolve`] and [`contain`].
pub async fn resolve_contained(root: &Path, client: &str) -> ServerResult<PathBuf> {
    let path = resolve(root, client)?;
    contain(root, &path, client).await?;
    Ok(path)
}

/// [`resolve_file`] followed by [`contain`].
///
/// # Errors
///
/// As [`resolve_file`] and [`contain`].
pub async fn resolve_file_contained(root: &Path, client: &str) -> ServerResult<PathBuf> {
    let path = resolve_file(root, client)?;
    contain(root, &path, client).await?;
    Ok(path)
}
