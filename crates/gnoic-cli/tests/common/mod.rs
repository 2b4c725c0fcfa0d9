//! Loopback fixtures shared by the integration tests: the embedded File
//! server, recording mock services and dialed sessions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gnoic_api::HashMethod;
use gnoic_cli::target::Target;
use gnoic_cli::transport::{dial, Session};
use gnoic_file_server::{GnoiFileServer, ServerConfig};
use gnoic_proto::cert::certificate_management_server::{
    CertificateManagement, CertificateManagementServer,
};
use gnoic_proto::cert::{
    self, install_certificate_request::InstallRequest as InstallStep,
    install_certificate_response::InstallResponse as InstallReply,
    rotate_certificate_request::RotateRequest,
    rotate_certificate_response::RotateResponse, CanGenerateCsrRequest, CanGenerateCsrResponse,
    GenerateCsrRequest, GenerateCsrResponse, GetCertificatesRequest, GetCertificatesResponse,
    InstallCertificateRequest, InstallCertificateResponse, LoadCertificateAuthorityBundleRequest,
    LoadCertificateAuthorityBundleResponse, LoadCertificateRequest, LoadCertificateResponse,
    RevokeCertificatesRequest, RevokeCertificatesResponse, RotateCertificateRequest,
    RotateCertificateResponse,
};
use gnoic_proto::file::file_server::{File, FileServer};
use gnoic_proto::file::{
    get_response, put_request, GetRequest, GetResponse, PutRequest, PutResponse, RemoveRequest, RemoveResponse,
    StatRequest, StatResponse, TransferToRemoteRequest, TransferToRemoteResponse,
};
use gnoic_proto::healthz::{
    self, artifact_response, healthz_server::{Healthz, HealthzServer}, ArtifactHeader,
    ArtifactRequest, ArtifactResponse,
};
use gnoic_proto::os::os_server::{Os, OsServer};
use gnoic_proto::os::{
    install_error, install_request, install_response, ActivateRequest, ActivateResponse,
    InstallError, InstallRequest, InstallResponse, SyncProgress, TransferReady, Validated,
    VerifyRequest, VerifyResponse,
};
use gnoic_proto::types::HashType;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Router;
use tonic::{Request, Response, Status, Streaming};

/// Serves `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(router.serve_with_incoming(TcpListenerStream::new(listener)));
    addr
}

/// A running embedded File server; dropping it stops the server.
pub struct FileServerHandle {
    pub addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

/// Starts the embedded File server rooted at `root`.
pub async fn file_server(root: &Path) -> FileServerHandle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig::new(addr, root).with_hash_method(HashMethod::Md5);
    let server = GnoiFileServer::new(config).unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve_with_listener(listener, async {
                let _ = stopped.await;
            })
            .await
    });
    FileServerHandle { addr, _stop: stop }
}

/// An insecure target named `name` at `addr`.
pub fn target(name: &str, addr: impl ToString) -> Target {
    Target::builder(addr.to_string())
        .with_name(name)
        .insecure(true)
        .with_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Dials `addr` without TLS.
pub async fn session(addr: SocketAddr) -> Session {
    dial(&target("r1", addr), &CancellationToken::new())
        .await
        .unwrap()
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

// File.Put recorder.

/// One Put message as seen by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum PutMessage {
    Open { remote_file: String, permissions: u32 },
    Contents(usize),
    Hash(HashType),
}

/// File service that records Put streams and accepts them. Get answers
/// with `download` when set.
#[derive(Debug, Clone, Default)]
pub struct RecordingFile {
    pub puts: Arc<Mutex<Vec<PutMessage>>>,
    pub contents: Arc<Mutex<Vec<u8>>>,
    pub download: Option<(Vec<u8>, HashType)>,
}

impl RecordingFile {
    /// Answers every Get with `contents` in two chunks, then `hash`.
    pub fn serving(contents: Vec<u8>, hash: HashType) -> Self {
        Self {
            download: Some((contents, hash)),
            ..Self::default()
        }
    }

    pub async fn serve(&self) -> SocketAddr {
        serve(tonic::transport::Server::builder().add_service(FileServer::new(self.clone()))).await
    }
}

#[tonic::async_trait]
impl File for RecordingFile {
    type GetStream = ReceiverStream<Result<GetResponse, Status>>;

    async fn get(&self, _: Request<GetRequest>) -> Result<Response<Self::GetStream>, Status> {
        let (contents, hash) = self
            .download
            .clone()
            .ok_or_else(|| Status::unimplemented("get"))?;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let (head, tail) = contents.split_at(contents.len() / 2);
            let messages = [
                get_response::Response::Contents(head.to_vec()),
                get_response::Response::Contents(tail.to_vec()),
                get_response::Response::Hash(hash),
            ];
            for response in messages {
                let message = GetResponse {
                    response: Some(response),
                };
                if tx.send(Ok(message)).await.is_err() {
                    return;
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn transfer_to_remote(
        &self,
        _: Request<TransferToRemoteRequest>,
    ) -> Result<Response<TransferToRemoteResponse>, Status> {
        Err(Status::unimplemented("transfer"))
    }

    async fn put(
        &self,
        request: Request<Streaming<PutRequest>>,
    ) -> Result<Response<PutResponse>, Status> {
        let mut inbound = request.into_inner();
        while let Some(message) = inbound.next().await {
            let recorded = match message?.request {
                Some(put_request::Request::Open(d)) => PutMessage::Open {
                    remote_file: d.remote_file,
                    permissions: d.permissions,
                },
                Some(put_request::Request::Contents(c)) => {
                    self.contents.lock().unwrap().extend_from_slice(&c);
                    PutMessage::Contents(c.len())
                }
                Some(put_request::Request::Hash(h)) => PutMessage::Hash(h),
                None => return Err(Status::invalid_argument("empty put message")),
            };
            let done = matches!(recorded, PutMessage::Hash(_));
            self.puts.lock().unwrap().push(recorded);
            if done {
                break;
            }
        }
        Ok(Response::new(PutResponse {}))
    }

    async fn stat(&self, _: Request<StatRequest>) -> Result<Response<StatResponse>, Status> {
        Err(Status::unimplemented("stat"))
    }

    async fn remove(&self, _: Request<RemoveRequest>) -> Result<Response<RemoveResponse>, Status> {
        Err(Status::unimplemented("remove"))
    }
}

// Certificate rotation device.

/// Certificate service that answers Rotate and Install like a device
/// would and records the request sequence.
#[derive(Debug, Clone, Default)]
pub struct RotatingDevice {
    pub sequence: Arc<Mutex<Vec<&'static str>>>,
    pub loaded: Arc<Mutex<Option<LoadCertificateRequest>>>,
    pub csr_pem: Arc<Mutex<String>>,
    /// Status the device ends the stream with after FinalizeRotation.
    pub finalize_error: Option<tonic::Code>,
}

impl RotatingDevice {
    /// A device that rejects the rotation once it is finalized.
    pub fn failing_finalize(code: tonic::Code) -> Self {
        Self {
            finalize_error: Some(code),
            ..Self::default()
        }
    }

    fn generate(&self, req: GenerateCsrRequest) -> GenerateCsrResponse {
        self.sequence.lock().unwrap().push("GenerateCSR");
        let cn = req
            .csr_params
            .map(|p| p.common_name)
            .unwrap_or_else(|| "device".into());
        let pem = device_csr(&cn);
        *self.csr_pem.lock().unwrap() = pem.clone();
        GenerateCsrResponse {
            csr: Some(cert::Csr {
                r#type: cert::CertificateType::CtX509 as i32,
                csr: pem.into_bytes(),
            }),
        }
    }

    fn load(&self, req: LoadCertificateRequest) -> LoadCertificateResponse {
        self.sequence.lock().unwrap().push("LoadCertificate");
        *self.loaded.lock().unwrap() = Some(req);
        LoadCertificateResponse {}
    }

    pub async fn serve(&self) -> SocketAddr {
        serve(
            tonic::transport::Server::builder()
                .add_service(CertificateManagementServer::new(self.clone())),
        )
        .await
    }
}

fn device_csr(common_name: &str) -> String {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()]).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    params.serialize_request(&key).unwrap().pem().unwrap()
}

#[tonic::async_trait]
impl CertificateManagement for RotatingDevice {
    type RotateStream = ReceiverStream<Result<RotateCertificateResponse, Status>>;
    type InstallStream = ReceiverStream<Result<InstallCertificateResponse, Status>>;

    async fn rotate(
        &self,
        request: Request<Streaming<RotateCertificateRequest>>,
    ) -> Result<Response<Self::RotateStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let device = self.clone();
        tokio::spawn(async move {
            while let Some(Ok(message)) = inbound.next().await {
                let reply = match message.rotate_request {
                    Some(RotateRequest::GenerateCsr(req)) => {
                        Some(RotateResponse::GeneratedCsr(device.generate(req)))
                    }
                    Some(RotateRequest::LoadCertificate(req)) => {
                        Some(RotateResponse::LoadCertificate(device.load(req)))
                    }
                    Some(RotateRequest::FinalizeRotation(_)) => {
                        device.sequence.lock().unwrap().push("FinalizeRotation");
                        if let Some(code) = device.finalize_error {
                            let _ = tx.send(Err(Status::new(code, "finalize rejected"))).await;
                            return;
                        }
                        None
                    }
                    None => None,
                };
                if let Some(reply) = reply {
                    let response = RotateCertificateResponse {
                        rotate_response: Some(reply),
                    };
                    if tx.send(Ok(response)).await.is_err() {
                        break;
                    }
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn install(
        &self,
        request: Request<Streaming<InstallCertificateRequest>>,
    ) -> Result<Response<Self::InstallStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let device = self.clone();
        tokio::spawn(async move {
            while let Some(Ok(message)) = inbound.next().await {
                let reply = match message.install_request {
                    Some(InstallStep::GenerateCsr(req)) => {
                        InstallReply::GeneratedCsr(device.generate(req))
                    }
                    Some(InstallStep::LoadCertificate(req)) => {
                        InstallReply::LoadCertificate(device.load(req))
                    }
                    _ => continue,
                };
                let response = InstallCertificateResponse {
                    install_response: Some(reply),
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn generate_csr(
        &self,
        _: Request<GenerateCsrRequest>,
    ) -> Result<Response<GenerateCsrResponse>, Status> {
        Err(Status::unimplemented("generate csr"))
    }

    async fn load_certificate(
        &self,
        _: Request<LoadCertificateRequest>,
    ) -> Result<Response<LoadCertificateResponse>, Status> {
        Err(Status::unimplemented("load certificate"))
    }

    async fn load_certificate_authority_bundle(
        &self,
        _: Request<LoadCertificateAuthorityBundleRequest>,
    ) -> Result<Response<LoadCertificateAuthorityBundleResponse>, Status> {
        Err(Status::unimplemented("load ca bundle"))
    }

    async fn get_certificates(
        &self,
        _: Request<GetCertificatesRequest>,
    ) -> Result<Response<GetCertificatesResponse>, Status> {
        Err(Status::unimplemented("get certificates"))
    }

    async fn revoke_certificates(
        &self,
        _: Request<RevokeCertificatesRequest>,
    ) -> Result<Response<RevokeCertificatesResponse>, Status> {
        Err(Status::unimplemented("revoke certificates"))
    }

    async fn can_generate_csr(
        &self,
        _: Request<CanGenerateCsrRequest>,
    ) -> Result<Response<CanGenerateCsrResponse>, Status> {
        Err(Status::unimplemented("can generate csr"))
    }
}

// OS install device.

/// OS service that accepts a transfer. It fails the install after
/// `fail_after` content chunks, reports sync progress after `sync_after`
/// chunks, and validates the package at transfer end.
#[derive(Debug, Clone)]
pub struct InstallingOs {
    pub fail_after: Option<usize>,
    pub sync_after: Option<usize>,
    pub chunks: Arc<Mutex<usize>>,
}

impl InstallingOs {
    pub fn rejecting(fail_after: usize) -> Self {
        Self {
            fail_after: Some(fail_after),
            sync_after: None,
            chunks: Arc::default(),
        }
    }

    pub fn syncing(sync_after: usize) -> Self {
        Self {
            fail_after: None,
            sync_after: Some(sync_after),
            chunks: Arc::default(),
        }
    }

    pub async fn serve(&self) -> SocketAddr {
        serve(tonic::transport::Server::builder().add_service(OsServer::new(self.clone()))).await
    }
}

#[tonic::async_trait]
impl Os for InstallingOs {
    type InstallStream = ReceiverStream<Result<InstallResponse, Status>>;

    async fn install(
        &self,
        request: Request<Streaming<InstallRequest>>,
    ) -> Result<Response<Self::InstallStream>, Status> {
        use install_response::Response as Reply;

        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(4);
        let os = self.clone();
        tokio::spawn(async move {
            while let Some(Ok(message)) = inbound.next().await {
                let reply = match message.request {
                    Some(install_request::Request::TransferRequest(_)) => {
                        Reply::TransferReady(TransferReady {})
                    }
                    Some(install_request::Request::TransferContent(_)) => {
                        let seen = {
                            let mut chunks = os.chunks.lock().unwrap();
                            *chunks += 1;
                            *chunks
                        };
                        if os.sync_after == Some(seen) {
                            Reply::SyncProgress(SyncProgress {
                                percentage_transferred: 50,
                            })
                        } else if os.fail_after.is_some_and(|n| seen >= n) {
                            let _ = tx
                                .send(Ok(InstallResponse {
                                    response: Some(Reply::InstallError(InstallError {
                                        r#type: install_error::Type::IntegrityFail as i32,
                                        detail: "checksum".into(),
                                    })),
                                }))
                                .await;
                            return;
                        } else {
                            continue;
                        }
                    }
                    Some(install_request::Request::TransferEnd(_)) => {
                        Reply::Validated(Validated {
                            version: "2.0".into(),
                            ..Default::default()
                        })
                    }
                    None => continue,
                };
                if tx
                    .send(Ok(InstallResponse {
                        response: Some(reply),
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn activate(
        &self,
        _: Request<ActivateRequest>,
    ) -> Result<Response<ActivateResponse>, Status> {
        Err(Status::unimplemented("activate"))
    }

    async fn verify(&self, _: Request<VerifyRequest>) -> Result<Response<VerifyResponse>, Status> {
        Ok(Response::new(VerifyResponse {
            version: "1.0".into(),
            ..Default::default()
        }))
    }
}

// Healthz artifact device.

/// Healthz service that streams one artifact: the header, `payload` in
/// `chunk`-sized pieces, then the trailer.
#[derive(Debug, Clone)]
pub struct ArtifactDevice {
    pub header: ArtifactHeader,
    pub payload: Vec<u8>,
    pub chunk: usize,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl ArtifactDevice {
    pub fn new(header: ArtifactHeader, payload: Vec<u8>, chunk: usize) -> Self {
        Self {
            header,
            payload,
            chunk,
            requested: Arc::default(),
        }
    }

    pub async fn serve(&self) -> SocketAddr {
        serve(tonic::transport::Server::builder().add_service(HealthzServer::new(self.clone())))
            .await
    }
}

#[tonic::async_trait]
impl Healthz for ArtifactDevice {
    type ArtifactStream = ReceiverStream<Result<ArtifactResponse, Status>>;

    async fn artifact(
        &self,
        request: Request<ArtifactRequest>,
    ) -> Result<Response<Self::ArtifactStream>, Status> {
        use artifact_response::Contents;

        self.requested.lock().unwrap().push(request.into_inner().id);
        let mut messages = vec![Contents::Header(self.header.clone())];
        messages.extend(
            self.payload
                .chunks(self.chunk.max(1))
                .map(|c| Contents::Bytes(c.to_vec())),
        );
        messages.push(Contents::Trailer(healthz::ArtifactTrailer {}));

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for contents in messages {
                let message = ArtifactResponse {
                    contents: Some(contents),
                };
                if tx.send(Ok(message)).await.is_err() {
                    return;
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn get(
        &self,
        _: Request<healthz::GetRequest>,
    ) -> Result<Response<healthz::GetResponse>, Status> {
        Err(Status::unimplemented("get"))
    }

    async fn list(
        &self,
        _: Request<healthz::ListRequest>,
    ) -> Result<Response<healthz::ListResponse>, Status> {
        Err(Status::unimplemented("list"))
    }

    async fn acknowledge(
        &self,
        _: Request<healthz::AcknowledgeRequest>,
    ) -> Result<Response<healthz::AcknowledgeResponse>, Status> {
        Err(Status::unimplemented("acknowledge"))
    }

    async fn check(
        &self,
        _: Request<healthz::CheckRequest>,
    ) -> Result<Response<healthz::CheckResponse>, Status> {
        Err(Status::unimplemented("check"))
    }
}
