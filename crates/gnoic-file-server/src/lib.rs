//! # gnoic-file-server
//!
//! An embedded gNOI File service that serves a local directory.
//!
//! Every client path is resolved under the configured root; paths that climb
//! out of it, by `..` or through a symlink, are refused before any file is
//! read, written or removed. `Put` uploads land in
//! a temporary file beside the destination and are renamed into place only
//! once the client's hash verifies. `TransferToRemote` pushes a served file
//! to another host over SFTP or SCP.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gnoic_file_server::{GnoiFileServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("127.0.0.1:57401".parse()?, "/var/lib/gnoic");
//!     let server = GnoiFileServer::new(config)?;
//!     server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod rooted;
pub mod server;
pub mod transfer;

pub use config::{ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_CHUNK_SIZE, DEFAULT_TRANSFER_TIMEOUT};
pub use error::{ServerError, ServerResult};
pub use server::{FileService, GnoiFileServer};
