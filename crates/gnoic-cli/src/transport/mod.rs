//! Dialing targets and handing out authenticated service clients.

pub mod auth;
pub mod proxy;
pub mod tls;

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use gnoic_proto::{cert, factory_reset, file, healthz, os, reflection, system};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::debug;

pub use auth::Credentials;
pub use proxy::Proxy;

use crate::error::CliError;
use crate::target::Target;

/// Channel type every client is built over.
pub type AuthChannel = InterceptedService<Channel, Credentials>;

trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// Opens byte streams to one target: direct or tunnelled, plain or TLS.
#[derive(Clone)]
struct Connector {
    target: Arc<Target>,
    tls: Option<TlsConnector>,
}

impl Connector {
    fn new(target: &Target) -> Result<Self, CliError> {
        let tls = if target.insecure {
            None
        } else {
            Some(TlsConnector::from(Arc::new(tls::client_config(target)?)))
        };
        Ok(Self {
            target: Arc::new(target.clone()),
            tls,
        })
    }

    async fn open(&self, address: &str) -> std::io::Result<Box<dyn Io>> {
        let proxy = if self.target.proxy_from_env {
            proxy::from_env(address, |k| std::env::var(k).ok())
                .map_err(|e| std::io::Error::other(e.to_string()))?
        } else {
            None
        };
        let tcp = match &proxy {
            Some(proxy) => {
                debug!(address, proxy = proxy.authority(), "tunnelling through proxy");
                proxy.connect(address).await?
            }
            None => TcpStream::connect(address).await?,
        };
        tcp.set_nodelay(true)?;
        if let Ok(peer) = tcp.peer_addr() {
            debug!(target = %self.target.name, %peer, "connected");
        }

        match &self.tls {
            None => Ok(Box::new(tcp)),
            Some(connector) => {
                let name = tls::server_name(&self.target, address)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                Ok(Box::new(connector.connect(name, tcp).await?))
            }
        }
    }

    async fn channel(&self, address: &str) -> Result<Channel, CliError> {
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|e| CliError::config(format!("invalid address {address:?}: {e}")))?;
        let connector = self.clone();
        let dial_address = address.to_string();
        endpoint
            .connect_with_connector(tower::service_fn(move |_: Uri| {
                let connector = connector.clone();
                let address = dial_address.clone();
                async move { connector.open(&address).await.map(TokioIo::new) }
            }))
            .await
            .map_err(|e| CliError::Connection(format!("{address}: {}", error_chain(&e))))
    }
}

/// Joins an error and its sources with `": "`, skipping repeats.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts: Vec<String> = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

/// Dials `target`, trying each of its addresses in order.
///
/// The whole attempt is bounded by the target's timeout and aborted when
/// `cancel` fires.
///
/// # Errors
///
/// Returns [`CliError::Config`] for bad TLS material or credentials,
/// [`CliError::Connection`] when no address could be reached and
/// [`CliError::Cancelled`] on cancellation.
pub async fn dial(target: &Target, cancel: &CancellationToken) -> Result<Session, CliError> {
    let credentials = Credentials::new(target.username.as_deref(), target.password.as_deref())?;
    let connector = Connector::new(target)?;

    let attempt = async {
        let mut last_error = None;
        for address in target.addresses() {
            debug!(target = %target.name, address, "dialing");
            match connector.channel(address).await {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    debug!(target = %target.name, address, error = %e, "dial failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CliError::config("missing address")))
    };

    let channel = tokio::select! {
        () = cancel.cancelled() => return Err(CliError::Cancelled),
        result = tokio::time::timeout(target.timeout, attempt) => match result {
            Ok(channel) => channel?,
            Err(_) => {
                return Err(CliError::Connection(format!(
                    "{}: dial timed out after {}",
                    target.address,
                    humantime::format_duration(target.timeout)
                )))
            }
        },
    };

    Ok(Session {
        target: target.clone(),
        channel,
        credentials,
        cancel: cancel.clone(),
    })
}

/// An open connection to one target.
///
/// Dropping the session releases the channel.
#[derive(Debug, Clone)]
pub struct Session {
    target: Target,
    channel: Channel,
    credentials: Credentials,
    cancel: CancellationToken,
}

impl Session {
    /// Returns the target this session is connected to.
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Returns the target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Returns the cancellation token scoped to this target.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Awaits a unary call unless the target is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns the call's status as [`CliError::Rpc`], or
    /// [`CliError::Cancelled`].
    pub async fn unary<R>(
        &self,
        call: impl Future<Output = Result<tonic::Response<R>, tonic::Status>>,
    ) -> Result<R, CliError> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(CliError::Cancelled),
            result = call => Ok(result?.into_inner()),
        }
    }
}

macro_rules! clients {
    ($( $(#[$doc:meta])* $method:ident => $module:ident::$sub:ident::$client:ident; )*) => {
        impl Session {
            $(
                $(#[$doc])*
                #[must_use]
                pub fn $method(&self) -> $module::$sub::$client<AuthChannel> {
                    let client = $module::$sub::$client::with_interceptor(
                        self.channel.clone(),
                        self.credentials.clone(),
                    );
                    if self.target.gzip {
                        client
                            .send_compressed(CompressionEncoding::Gzip)
                            .accept_compressed(CompressionEncoding::Gzip)
                    } else {
                        client
                    }
                }
            )*
        }
    };
}

clients! {
    /// Certificate management client.
    cert => cert::certificate_management_client::CertificateManagementClient;
    /// File service client.
    file => file::file_client::FileClient;
    /// System service client.
    system => system::system_client::SystemClient;
    /// OS service client.
    os => os::os_client::OsClient;
    /// Healthz client.
    healthz => healthz::healthz_client::HealthzClient;
    /// Factory reset client.
    factory_reset => factory_reset::factory_reset_client::FactoryResetClient;
    /// Server reflection client.
    reflection => reflection::server_reflection_client::ServerReflectionClient;
}
