//! gRPC server hosting the File service.

use std::future::Future;
use std::sync::Arc;

use gnoic_proto::file::file_server::{File, FileServer};
use gnoic_proto::file::{
    GetRequest, GetResponse, PutRequest, PutResponse, RemoveRequest, RemoveResponse, StatRequest,
    StatResponse, TransferToRemoteRequest, TransferToRemoteResponse,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handlers;

/// Depth of the per-`Get` response queue.
const GET_QUEUE_DEPTH: usize = 4;

/// The File service rooted at [`ServerConfig::root`].
#[derive(Debug, Clone)]
pub struct FileService {
    config: Arc<ServerConfig>,
}

impl FileService {
    /// Create the service. The configuration should already be validated.
    #[must_use]
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Returns the service configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn log_failure<T>(rpc: &str, result: ServerResult<T>) -> Result<T, Status> {
    result.map_err(|e| {
        warn!(rpc, error = %e, "request failed");
        Status::from(e)
    })
}

#[tonic::async_trait]
impl File for FileService {
    type GetStream = ReceiverStream<Result<GetResponse, Status>>;

    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> Result<Response<Self::GetStream>, Status> {
        let remote_file = request.into_inner().remote_file;
        let path = log_failure("Get", handlers::open_get(self.config.root(), &remote_file).await)?;
        let (tx, rx) = mpsc::channel(GET_QUEUE_DEPTH);
        tokio::spawn(handlers::send_file(
            path,
            self.config.hash_method,
            self.config.chunk_size,
            tx,
        ));
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn transfer_to_remote(
        &self,
        request: Request<TransferToRemoteRequest>,
    ) -> Result<Response<TransferToRemoteResponse>, Status> {
        let hash = log_failure(
            "TransferToRemote",
            handlers::transfer_to_remote(&self.config, request.into_inner()).await,
        )?;
        Ok(Response::new(TransferToRemoteResponse { hash: Some(hash) }))
    }

    async fn put(
        &self,
        request: Request<Streaming<PutRequest>>,
    ) -> Result<Response<PutResponse>, Status> {
        log_failure(
            "Put",
            handlers::receive_put(self.config.root(), request.into_inner()).await,
        )?;
        Ok(Response::new(PutResponse {}))
    }

    async fn stat(&self, request: Request<StatRequest>) -> Result<Response<StatResponse>, Status> {
        let stats = log_failure(
            "Stat",
            handlers::stat(self.config.root(), &request.into_inner().path).await,
        )?;
        Ok(Response::new(StatResponse { stats }))
    }

    async fn remove(
        &self,
        request: Request<RemoveRequest>,
    ) -> Result<Response<RemoveResponse>, Status> {
        log_failure(
            "Remove",
            handlers::remove(self.config.root(), &request.into_inner().remote_file).await,
        )?;
        Ok(Response::new(RemoveResponse {}))
    }
}

/// The embedded gNOI File server.
#[derive(Debug, Clone)]
pub struct GnoiFileServer {
    config: Arc<ServerConfig>,
}

impl GnoiFileServer {
    /// Create a server, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the configuration is invalid.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Ok(Self {
            config: Arc::new(config.validate()?),
        })
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the tonic service, with gzip accepted and offered.
    #[must_use]
    pub fn service(&self) -> FileServer<FileService> {
        FileServer::new(FileService::new(Arc::clone(&self.config)))
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the transport fails.
    pub async fn serve(&self, shutdown: impl Future<Output = ()> + Send) -> ServerResult<()> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        self.serve_with_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    pub async fn serve_with_listener(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> ServerResult<()> {
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            root = %self.config.root().display(),
            hash = %self.config.hash_method,
            "file server listening"
        );
        tonic::transport::Server::builder()
            .add_service(self.service())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;
        info!(addr = %local, "file server stopped");
        Ok(())
    }
}
