//! OS service: the Install stream, Activate and Verify.

use std::path::Path;
use std::time::Duration;

use gnoic_api::{build, GnoiOption};
use gnoic_proto::os::{
    activate_response, install_error, install_response, ActivateRequest, InstallError,
    InstallRequest, InstallResponse, TransferRequest, Validated, VerifyRequest, VerifyResponse,
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CliError;
use crate::stream::{produce_chunks, BidiStream, Trailer};
use crate::transport::Session;

/// Pause after a sync progress report before receiving again.
const SYNC_PAUSE: Duration = Duration::from_secs(1);

type InstallStream = BidiStream<InstallRequest, InstallResponse>;

/// Transfers `package` to the target and waits for it to validate.
///
/// The target answers the transfer request with TransferReady, at which
/// point the package streams in chunks followed by TransferEnd. Progress
/// reports are logged; Validated ends the install and InstallError fails
/// it.
///
/// # Errors
///
/// Fails on RPC errors, install errors reported by the target, responses
/// out of sequence, local read errors and cancellation.
pub async fn install(
    session: &Session,
    transfer: TransferRequest,
    package: &Path,
    chunk_size: usize,
) -> Result<Validated, CliError> {
    use install_response::Response;

    let mut file = Some(tokio::fs::File::open(package).await?);
    let first: InstallRequest = build([GnoiOption::TransferRequest(transfer)])?;
    let mut client = session.os();
    let mut stream = BidiStream::open(session.cancel_token(), first, move |rx| async move {
        client.install(rx).await
    })
    .await?;

    loop {
        match stream.expect("install response").await?.response {
            Some(Response::TransferReady(_)) => {
                let file = file
                    .take()
                    .ok_or_else(|| CliError::protocol("transfer ready received twice"))?;
                debug!(target = %session.name(), "transfer ready");
                let sent = send_package(&mut stream, session.name(), file, chunk_size).await?;
                if let Some(validated) = sent {
                    return Ok(validated);
                }
            }
            Some(Response::TransferProgress(progress)) => {
                debug!(target = %session.name(), bytes = progress.bytes_received, "transfer progress");
            }
            Some(Response::SyncProgress(progress)) => {
                sync_progress(stream.cancel_token(), session.name(), progress.percentage_transferred).await?;
            }
            Some(Response::Validated(validated)) => {
                stream.close_send();
                info!(target = %session.name(), version = %validated.version, "package validated");
                return Ok(validated);
            }
            Some(Response::InstallError(err)) => return Err(install_error(&err)),
            None => return Err(CliError::protocol("empty install response")),
        }
    }
}

/// Streams the package while receiving progress.
///
/// The producer runs as a separate task. It reports local failures on the
/// error channel and completion on the done channel; a stream that went
/// away ends it quietly so the receive side reports the cause. Leaving
/// this function cancels the producer.
async fn send_package(
    stream: &mut InstallStream,
    target: &str,
    file: tokio::fs::File,
    chunk_size: usize,
) -> Result<Option<Validated>, CliError> {
    use install_response::Response;

    let tx = stream
        .sender()
        .ok_or_else(|| CliError::protocol("install stream closed before transfer"))?;
    let cancel = stream.cancel_token().child_token();
    let _producer_guard = cancel.clone().drop_guard();
    let (err_tx, mut err_rx) = mpsc::channel::<CliError>(1);
    let (done_tx, mut done_rx) = oneshot::channel::<u64>();

    tokio::spawn(async move {
        match produce_chunks(file, chunk_size, Trailer::End, &tx, &cancel).await {
            Ok(Some(produced)) => {
                let _ = done_tx.send(produced.size);
            }
            Ok(None) => {}
            Err(err) => {
                let _ = err_tx.send(err).await;
            }
        }
    });

    let mut sending = true;
    loop {
        tokio::select! {
            biased;
            Some(err) = err_rx.recv() => return Err(err),
            done = &mut done_rx, if sending => {
                sending = false;
                if let Ok(size) = done {
                    debug!(size, "transfer end sent");
                    return Ok(None);
                }
            }
            message = stream.recv() => match message? {
                None => return Err(CliError::protocol("stream ended during transfer")),
                Some(InstallResponse { response }) => match response {
                    Some(Response::TransferProgress(progress)) => {
                        debug!(bytes = progress.bytes_received, "transfer progress");
                    }
                    Some(Response::SyncProgress(progress)) => {
                        sync_progress(stream.cancel_token(), target, progress.percentage_transferred).await?;
                    }
                    Some(Response::Validated(validated)) => return Ok(Some(validated)),
                    Some(Response::InstallError(err)) => return Err(install_error(&err)),
                    Some(Response::TransferReady(_)) => {
                        return Err(CliError::protocol("transfer ready received during transfer"));
                    }
                    None => return Err(CliError::protocol("empty install response")),
                },
            },
        }
    }
}

/// Logs a sync progress report and pauses before the next receive.
async fn sync_progress(cancel: &CancellationToken, target: &str, percent: u32) -> Result<(), CliError> {
    info!(target = %target, percent, "sync progress");
    tokio::select! {
        () = cancel.cancelled() => Err(CliError::Cancelled),
        () = tokio::time::sleep(SYNC_PAUSE) => Ok(()),
    }
}

fn install_error(err: &InstallError) -> CliError {
    let kind = install_error::Type::try_from(err.r#type)
        .map_or_else(|_| err.r#type.to_string(), |t| t.as_str_name().to_string());
    CliError::protocol(format!("install error: type={kind} detail={:?}", err.detail))
}

/// Activates an installed version.
///
/// # Errors
///
/// Fails on RPC errors and when the target answers with an activate error.
pub async fn activate(session: &Session, request: ActivateRequest) -> Result<(), CliError> {
    use activate_response::Response;

    let response = session.unary(session.os().activate(request)).await?;
    match response.response {
        Some(Response::ActivateOk(_)) => {
            info!(target = %session.name(), "version activated");
            Ok(())
        }
        Some(Response::ActivateError(err)) => {
            let kind = gnoic_proto::os::activate_error::Type::try_from(err.r#type)
                .map_or_else(|_| err.r#type.to_string(), |t| t.as_str_name().to_string());
            Err(CliError::protocol(format!(
                "activate error: type={kind} detail={:?}",
                err.detail
            )))
        }
        None => Err(CliError::protocol("empty activate response")),
    }
}

/// Reads the running version.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn verify(session: &Session) -> Result<VerifyResponse, CliError> {
    session.unary(session.os().verify(VerifyRequest {})).await
}
