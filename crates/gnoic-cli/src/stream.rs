//! Cancellation-aware drivers for gNOI client and bidirectional streams.
//!
//! [`BidiStream`] is the receive side of every bidirectional invoker;
//! [`produce_chunks`] is the send loop shared by File.Put,
//! System.SetPackage and OS.Install.

use std::future::Future;

use gnoic_api::{build, Configurable, GnoiOption, HashMethod};
use gnoic_proto::types::HashType;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Response, Status, Streaming};
use tracing::debug;

use crate::error::CliError;

/// Requests buffered ahead of the transport.
pub(crate) const REQUEST_BUFFER: usize = 16;

/// Client half of a bidirectional stream.
///
/// The first request is queued before the call is issued, so servers that
/// wait for a request before sending response headers do not stall the
/// open.
#[derive(Debug)]
pub struct BidiStream<Req, Resp> {
    tx: Option<mpsc::Sender<Req>>,
    rx: Streaming<Resp>,
    cancel: CancellationToken,
}

impl<Req, Resp> BidiStream<Req, Resp>
where
    Req: Send + 'static,
{
    /// Opens the stream with `first` as its first request.
    ///
    /// # Errors
    ///
    /// Returns the call status, or [`CliError::Cancelled`].
    pub async fn open<F, Fut>(
        cancel: &CancellationToken,
        first: Req,
        call: F,
    ) -> Result<Self, CliError>
    where
        F: FnOnce(ReceiverStream<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Streaming<Resp>>, Status>>,
    {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        tx.send(first)
            .await
            .map_err(|_| CliError::protocol("request stream closed before open"))?;
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(CliError::Cancelled),
            response = call(ReceiverStream::new(rx)) => response?,
        };
        Ok(Self {
            tx: Some(tx),
            rx: response.into_inner(),
            cancel: cancel.clone(),
        })
    }

    /// Sends one request.
    ///
    /// # Errors
    ///
    /// Fails after [`close_send`](Self::close_send), when the transport has
    /// dropped the request stream, or on cancellation.
    pub fn send(&self, request: Req) -> impl Future<Output = Result<(), CliError>> + Send {
        // The future owns its sender and token so it does not borrow the
        // (non-`Sync`) response stream across awaits.
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        async move {
            let tx = tx.ok_or_else(|| CliError::protocol("send after close"))?;
            tokio::select! {
                () = cancel.cancelled() => Err(CliError::Cancelled),
                sent = tx.send(request) => {
                    sent.map_err(|_| CliError::protocol("request stream closed by peer"))
                }
            }
        }
    }

    /// Receives the next response; `None` at end of stream.
    ///
    /// On cancellation the send side is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns the stream's status, or [`CliError::Cancelled`].
    pub async fn recv(&mut self) -> Result<Option<Resp>, CliError> {
        tokio::select! {
            () = self.cancel.cancelled() => {
                self.close_send();
                Err(CliError::Cancelled)
            }
            message = self.rx.message() => Ok(message?),
        }
    }

    /// Receives the next response, treating end of stream as an error.
    ///
    /// # Errors
    ///
    /// As [`recv`](Self::recv), plus [`CliError::Protocol`] naming `what`
    /// at end of stream.
    pub async fn expect(&mut self, what: &str) -> Result<Resp, CliError> {
        self.recv()
            .await?
            .ok_or_else(|| CliError::protocol(format!("stream ended while waiting for {what}")))
    }

    /// Half-closes the stream; the server sees end of requests.
    pub fn close_send(&mut self) {
        self.tx = None;
    }

    /// Half-closes the stream and reads it to its end, so a trailing error
    /// status fails the call. Responses past the last expected one are
    /// skipped.
    ///
    /// # Errors
    ///
    /// As [`recv`](Self::recv).
    pub async fn finish(&mut self) -> Result<(), CliError> {
        self.close_send();
        while self.recv().await?.is_some() {
            debug!("skipping response after the last expected one");
        }
        Ok(())
    }

    /// Returns a sender for a producer task, if the send side is open.
    #[must_use]
    pub fn sender(&self) -> Option<mpsc::Sender<Req>> {
        self.tx.clone()
    }

    /// Returns the token this stream observes.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Sends `request` through `tx` unless `cancel` fires first.
///
/// Returns `false` when cancelled or when the stream is gone.
pub async fn send_or_cancel<Req>(
    tx: &mpsc::Sender<Req>,
    cancel: &CancellationToken,
    request: Req,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        sent = tx.send(request) => sent.is_ok(),
    }
}

/// Receives the next message of a server stream unless `cancel` fires.
///
/// # Errors
///
/// Returns the stream's status, or [`CliError::Cancelled`].
pub async fn next_message<T>(
    stream: &mut Streaming<T>,
    cancel: &CancellationToken,
) -> Result<Option<T>, CliError> {
    tokio::select! {
        () = cancel.cancelled() => Err(CliError::Cancelled),
        message = stream.message() => Ok(message?),
    }
}

/// Reads up to `size` bytes; a short result means end of file.
///
/// # Errors
///
/// Returns the underlying read error.
pub async fn read_chunk<R>(reader: &mut R, size: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut chunk = Vec::with_capacity(size);
    reader.take(size as u64).read_to_end(&mut chunk).await?;
    Ok(chunk)
}

/// Message that closes a chunked content sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailer {
    /// A hash of all contents, computed with the given method.
    Hash(HashMethod),
    /// An explicit end-of-transfer marker.
    End,
}

/// What a completed [`produce_chunks`] sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    /// Content bytes sent.
    pub size: u64,
    /// The trailing hash, for [`Trailer::Hash`].
    pub hash: Option<HashType>,
}

/// Reads `reader` in `chunk_size` pieces and sends one contents message per
/// piece, then the trailer.
///
/// Returns `Ok(None)` when the stream went away or `cancel` fired before
/// the trailer was sent; the receive side reports why.
///
/// # Errors
///
/// Fails on local read errors and when a message cannot be built.
pub async fn produce_chunks<Req, R>(
    mut reader: R,
    chunk_size: usize,
    trailer: Trailer,
    tx: &mpsc::Sender<Req>,
    cancel: &CancellationToken,
) -> Result<Option<Produced>, CliError>
where
    Req: Configurable + Default,
    R: AsyncRead + Unpin,
{
    let mut hasher = match trailer {
        Trailer::Hash(method) => Some(method.hasher()?),
        Trailer::End => None,
    };
    let mut size = 0_u64;
    loop {
        let chunk = read_chunk(&mut reader, chunk_size.max(1)).await?;
        if chunk.is_empty() {
            break;
        }
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        size += chunk.len() as u64;
        let request: Req = build([GnoiOption::Contents(chunk)])?;
        if !send_or_cancel(tx, cancel, request).await {
            return Ok(None);
        }
    }

    let hash = hasher.map(gnoic_api::Hasher::finalize);
    let last: Req = match &hash {
        Some(hash) => build([GnoiOption::Hash(hash.clone())])?,
        None => build([GnoiOption::TransferEnd])?,
    };
    if !send_or_cancel(tx, cancel, last).await {
        return Ok(None);
    }
    Ok(Some(Produced { size, hash }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoic_proto::file::{put_request, PutRequest};
    use gnoic_proto::os::{install_request, InstallRequest};

    #[tokio::test]
    async fn read_chunk_returns_short_tail() {
        let data = vec![7_u8; 10];
        let mut reader = data.as_slice();
        assert_eq!(read_chunk(&mut reader, 4).await.unwrap().len(), 4);
        assert_eq!(read_chunk(&mut reader, 4).await.unwrap().len(), 4);
        assert_eq!(read_chunk(&mut reader, 4).await.unwrap().len(), 2);
        assert!(read_chunk(&mut reader, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_then_one_hash() {
        let data = vec![1_u8; 10];
        let (tx, mut rx) = mpsc::channel::<PutRequest>(16);
        let cancel = CancellationToken::new();
        let produced = produce_chunks(
            data.as_slice(),
            4,
            Trailer::Hash(HashMethod::Md5),
            &tx,
            &cancel,
        )
        .await
        .unwrap()
        .unwrap();
        drop(tx);
        assert_eq!(produced.size, 10);

        let mut sizes = Vec::new();
        let mut hashes = Vec::new();
        while let Some(msg) = rx.recv().await {
            match msg.request {
                Some(put_request::Request::Contents(c)) => sizes.push(c.len()),
                Some(put_request::Request::Hash(h)) => hashes.push(h),
                other => assert!(other.is_none(), "unexpected {other:?}"),
            }
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(hashes, vec![gnoic_api::hash(HashMethod::Md5, &data).unwrap()]);
        assert_eq!(produced.hash, Some(hashes[0].clone()));
    }

    #[tokio::test]
    async fn transfer_end_trailer_carries_no_hash() {
        let (tx, mut rx) = mpsc::channel::<InstallRequest>(16);
        let cancel = CancellationToken::new();
        let produced = produce_chunks(&b"abc"[..], 2, Trailer::End, &tx, &cancel)
            .await
            .unwrap()
            .unwrap();
        drop(tx);
        assert!(produced.hash.is_none());
        let mut last = None;
        while let Some(msg) = rx.recv().await {
            last = msg.request;
        }
        assert!(matches!(last, Some(install_request::Request::TransferEnd(_))));
    }

    #[tokio::test]
    async fn closed_stream_stops_quietly() {
        let (tx, rx) = mpsc::channel::<PutRequest>(1);
        drop(rx);
        let cancel = CancellationToken::new();
        let produced = produce_chunks(
            &b"abc"[..],
            1,
            Trailer::Hash(HashMethod::Sha256),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        assert!(produced.is_none());
    }

    #[tokio::test]
    async fn cancelled_producer_stops() {
        let (tx, _rx) = mpsc::channel::<PutRequest>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let produced = produce_chunks(
            &vec![0_u8; 64][..],
            8,
            Trailer::Hash(HashMethod::Md5),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        assert!(produced.is_none());
    }
}
