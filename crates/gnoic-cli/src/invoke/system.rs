//! System service invokers.

use std::path::Path;

use gnoic_api::HashMethod;
use gnoic_proto::system::{
    CancelRebootRequest, KillProcessRequest, PingRequest, PingResponse, RebootRequest,
    RebootStatusRequest, RebootStatusResponse, SetPackageRequest, SwitchControlProcessorRequest,
    SwitchControlProcessorResponse, TimeRequest, TracerouteRequest, TracerouteResponse,
};
use tonic::Streaming;
use tracing::info;

use crate::error::CliError;
use crate::stream::next_message;
use crate::transport::Session;

async fn drain<T>(
    session: &Session,
    mut stream: Streaming<T>,
    mut on_message: impl FnMut(T) -> Result<(), CliError>,
) -> Result<usize, CliError> {
    let mut count = 0;
    while let Some(message) = next_message(&mut stream, session.cancel_token()).await? {
        count += 1;
        on_message(message)?;
    }
    Ok(count)
}

/// Runs a ping on the target, handing each reply to `on_reply` as it
/// arrives. Returns the number of replies.
///
/// # Errors
///
/// Fails on RPC errors and on the first error from `on_reply`.
pub async fn ping(
    session: &Session,
    request: PingRequest,
    on_reply: impl FnMut(PingResponse) -> Result<(), CliError>,
) -> Result<usize, CliError> {
    let stream = session.unary(session.system().ping(request)).await?;
    drain(session, stream, on_reply).await
}

/// Runs a traceroute on the target, handing each hop to `on_hop`.
///
/// # Errors
///
/// As [`ping`].
pub async fn traceroute(
    session: &Session,
    request: TracerouteRequest,
    on_hop: impl FnMut(TracerouteResponse) -> Result<(), CliError>,
) -> Result<usize, CliError> {
    let stream = session.unary(session.system().traceroute(request)).await?;
    drain(session, stream, on_hop).await
}

/// Returns the device clock in Unix nanoseconds.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn time(session: &Session) -> Result<u64, CliError> {
    Ok(session
        .unary(session.system().time(TimeRequest {}))
        .await?
        .time)
}

/// Requests a reboot.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn reboot(session: &Session, request: RebootRequest) -> Result<(), CliError> {
    session.unary(session.system().reboot(request)).await?;
    info!(target = %session.name(), "reboot requested");
    Ok(())
}

/// Cancels a pending reboot.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn cancel_reboot(session: &Session, request: CancelRebootRequest) -> Result<(), CliError> {
    session.unary(session.system().cancel_reboot(request)).await?;
    info!(target = %session.name(), "reboot cancelled");
    Ok(())
}

/// Reads the reboot status.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn reboot_status(
    session: &Session,
    request: RebootStatusRequest,
) -> Result<RebootStatusResponse, CliError> {
    session.unary(session.system().reboot_status(request)).await
}

/// Switches to another control processor.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn switch_control_processor(
    session: &Session,
    request: SwitchControlProcessorRequest,
) -> Result<SwitchControlProcessorResponse, CliError> {
    session
        .unary(session.system().switch_control_processor(request))
        .await
}

/// Signals a process on the target.
///
/// # Errors
///
/// Fails on RPC errors.
pub async fn kill_process(session: &Session, request: KillProcessRequest) -> Result<(), CliError> {
    session.unary(session.system().kill_process(request)).await?;
    Ok(())
}

/// Installs a package.
///
/// With `local`, the package header is followed by the file contents and
/// their hash; without, the header alone asks the device to fetch it from
/// its remote download location.
///
/// # Errors
///
/// Fails on RPC errors, local read errors and cancellation.
pub async fn set_package(
    session: &Session,
    header: SetPackageRequest,
    local: Option<&Path>,
    chunk_size: usize,
    hash_method: HashMethod,
) -> Result<u64, CliError> {
    let mut client = session.system();
    let size = match local {
        Some(local) => {
            let (_, produced) = super::upload(
                session,
                local,
                header,
                chunk_size,
                hash_method,
                move |rx| async move { client.set_package(rx).await },
            )
            .await?;
            produced.size
        }
        None => {
            let request = tokio_stream::once(header);
            session.unary(client.set_package(request)).await?;
            0
        }
    };
    info!(target = %session.name(), size, "package set");
    Ok(size)
}
