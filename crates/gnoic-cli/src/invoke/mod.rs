//! RPC invokers, one per gNOI method.
//!
//! Each invoker takes an open [`Session`](crate::transport::Session) plus
//! already validated parameters, drives the RPC (including any stream state
//! machine) and returns a typed result. Invokers observe the session's
//! cancellation token between stream operations.

use std::future::Future;
use std::path::Path;

use gnoic_api::{Configurable, HashMethod};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::CliError;
use crate::stream::{produce_chunks, send_or_cancel, Produced, Trailer, REQUEST_BUFFER};
use crate::transport::Session;

pub mod cert;
pub mod factory_reset;
pub mod file;
pub mod healthz;
pub mod os;
pub mod reflection;
pub mod system;

/// Default chunk size for file, package and OS transfers.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Runs a client-streaming upload of `local`: `first`, then the contents
/// in `chunk_size` pieces, then their hash.
///
/// The send loop runs as its own task under a child of the session token;
/// it is cancelled once the server answers. A server error wins over a
/// local one.
pub(crate) async fn upload<Req, Resp, F, Fut>(
    session: &Session,
    local: &Path,
    first: Req,
    chunk_size: usize,
    hash_method: HashMethod,
    call: F,
) -> Result<(Resp, Produced), CliError>
where
    Req: Configurable + Default + Send + 'static,
    F: FnOnce(ReceiverStream<Req>) -> Fut,
    Fut: Future<Output = Result<tonic::Response<Resp>, tonic::Status>>,
{
    let file = tokio::fs::File::open(local).await?;
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    let cancel = session.cancel_token().child_token();
    let producer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if !send_or_cancel(&tx, &cancel, first).await {
                return Ok(None);
            }
            produce_chunks(file, chunk_size, Trailer::Hash(hash_method), &tx, &cancel).await
        }
    });

    let response = session.unary(call(ReceiverStream::new(rx))).await;
    cancel.cancel();
    let produced = producer.await;
    let response = response?;
    let produced = produced
        .map_err(|e| CliError::protocol(format!("upload task failed: {e}")))??
        .ok_or_else(|| CliError::protocol("server answered before the upload completed"))?;
    Ok((response, produced))
}
