//! gnoic file server binary.
//!
//! Serves a local directory over the gNOI File service.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gnoic_api::HashMethod;
use gnoic_file_server::{GnoiFileServer, ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_CHUNK_SIZE};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve a directory over the gNOI File service.
#[derive(Debug, Parser)]
#[command(name = "gnoic-file-server", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "GNOIC_FILE_SERVER_ADDRESS", default_value = DEFAULT_BIND_ADDR)]
    address: SocketAddr,

    /// Directory every client path is resolved under.
    #[arg(long, env = "GNOIC_FILE_SERVER_ROOT", default_value = ".")]
    root: PathBuf,

    /// Hash method for Get trailers and TransferToRemote (md5, sha256, sha512).
    #[arg(long, env = "GNOIC_FILE_SERVER_HASH_METHOD", default_value = "md5")]
    hash_method: HashMethod,

    /// Size of each Get content message, in bytes.
    #[arg(long, env = "GNOIC_FILE_SERVER_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Enable debug logging.
    #[arg(long, env = "GNOIC_FILE_SERVER_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let root = args.root.clone();
    let config = ServerConfig::new(args.address, args.root)
        .with_hash_method(args.hash_method)
        .with_chunk_size(args.chunk_size);
    let server = GnoiFileServer::new(config)
        .with_context(|| format!("cannot serve {}", root.display()))?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
    };
    server
        .serve(shutdown)
        .await
        .with_context(|| format!("file server on {}", args.address))?;
    Ok(())
}
