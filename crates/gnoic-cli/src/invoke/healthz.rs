//! Healthz service: status trees and the Artifact stream.

use std::path::{Path, PathBuf};

use gnoic_api::{build, GnoiOption};
use gnoic_proto::healthz::{
    artifact_header, artifact_response, AcknowledgeRequest, ArtifactHeader, ArtifactRequest,
    CheckRequest, ComponentStatus, GetRequest, ListRequest,
};
use serde::Serialize;
use tracing::info;

use crate::error::CliError;
use crate::stream::next_message;
use crate::transport::Session;

/// Reads the status tree of one component.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn get(session: &Session, request: GetRequest) -> Result<Option<ComponentStatus>, CliError> {
    Ok(session.unary(session.healthz().get(request)).await?.component)
}

/// Lists health events of one component.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn list(session: &Session, request: ListRequest) -> Result<Vec<ComponentStatus>, CliError> {
    Ok(session.unary(session.healthz().list(request)).await?.statuses)
}

/// Runs a health check.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn check(
    session: &Session,
    request: CheckRequest,
) -> Result<Option<ComponentStatus>, CliError> {
    Ok(session.unary(session.healthz().check(request)).await?.status)
}

/// Acknowledges a health event.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn acknowledge(
    session: &Session,
    request: AcknowledgeRequest,
) -> Result<Option<ComponentStatus>, CliError> {
    Ok(session
        .unary(session.healthz().acknowledge(request))
        .await?
        .status)
}

/// A fetched artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Artifact identifier.
    pub id: String,
    /// `file`, `proto` or `custom`.
    pub kind: &'static str,
    /// Where a file artifact was written.
    pub file: Option<PathBuf>,
    /// Payload bytes of a file artifact.
    pub size: u64,
    /// Messages after the header.
    pub messages: usize,
    /// The header as sent by the target.
    #[serde(skip)]
    pub header: ArtifactHeader,
}

/// Fetches artifact `id`.
///
/// The first message must be the header. File artifacts are collected
/// until the trailer, checked against the header hash and written under
/// `dst` with the header's file name. Other artifact types are drained.
///
/// # Errors
///
/// Fails on RPC errors, a stream that does not start with a header, a hash
/// or size mismatch and local write errors.
pub async fn artifact(session: &Session, id: &str, dst: &Path) -> Result<Artifact, CliError> {
    use artifact_response::Contents;

    let request: ArtifactRequest = build([GnoiOption::Id(id.to_string())])?;
    let mut stream = session.unary(session.healthz().artifact(request)).await?;
    let cancel = session.cancel_token();

    let header = match next_message(&mut stream, cancel).await?.and_then(|m| m.contents) {
        Some(Contents::Header(header)) => header,
        Some(_) => return Err(CliError::protocol(format!("{id}: first message is not a header"))),
        None => return Err(CliError::protocol(format!("{id}: stream ended before header"))),
    };

    let mut outcome = Artifact {
        id: header.id.clone(),
        kind: "custom",
        file: None,
        size: 0,
        messages: 0,
        header: header.clone(),
    };

    let Some(artifact_header::ArtifactType::File(file)) = header.artifact_type else {
        if matches!(header.artifact_type, Some(artifact_header::ArtifactType::Proto(_))) {
            outcome.kind = "proto";
        }
        while next_message(&mut stream, cancel).await?.is_some() {
            outcome.messages += 1;
        }
        return Ok(outcome);
    };

    outcome.kind = "file";
    let mut payload = Vec::new();
    let mut trailer = false;
    while let Some(message) = next_message(&mut stream, cancel).await? {
        outcome.messages += 1;
        match (message.contents, trailer) {
            (Some(Contents::Bytes(bytes)), false) => payload.extend_from_slice(&bytes),
            (Some(Contents::Trailer(_)), false) => trailer = true,
            (Some(Contents::Header(_)), _) => {
                return Err(CliError::protocol(format!("{id}: second header")));
            }
            (_, true) => return Err(CliError::protocol(format!("{id}: message after trailer"))),
            (_, false) => return Err(CliError::protocol(format!("{id}: unexpected message"))),
        }
    }
    if !trailer {
        return Err(CliError::protocol(format!("{id}: stream ended before trailer")));
    }
    if file.size > 0 && file.size as u64 != payload.len() as u64 {
        return Err(CliError::Payload(format!(
            "{id}: expected {} bytes, got {}",
            file.size,
            payload.len()
        )));
    }
    if let Some(hash) = &file.hash {
        gnoic_api::verify(hash, &payload).map_err(|e| CliError::Payload(format!("{id}: {e}")))?;
    }

    let local = dst.join(artifact_file_name(&file.name, id));
    tokio::fs::create_dir_all(dst).await?;
    tokio::fs::write(&local, &payload).await?;
    info!(target = %session.name(), id, local = %local.display(), size = payload.len(), "artifact written");
    outcome.size = payload.len() as u64;
    outcome.file = Some(local);
    Ok(outcome)
}

/// Base name of `name`, falling back to the artifact id.
fn artifact_file_name(name: &str, id: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "..")
        .unwrap_or_else(|| id.to_string())
}
