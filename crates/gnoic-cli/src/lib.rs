//! # gnoic-cli
//!
//! Runs gNOI operations against many network devices at once.
//!
//! Every command resolves a set of [`target::Target`]s, dials each one
//! concurrently and runs the same operation against all of them. One
//! target failing never stops its peers; failures are logged and counted,
//! and results of the others are rendered together.
//!
//! ```text
//! ┌───────────┐   gRPC (TLS/h2)   ┌──────────┐
//! │           │──────────────────►│ target 1 │
//! │   gnoic   │──────────────────►│ target 2 │
//! │           │──────────────────►│ target n │
//! └───────────┘                   └──────────┘
//! ```
//!
//! - [`transport`] dials targets and carries credentials
//! - [`runner`] fans an operation out and collects per-target outcomes
//! - [`stream`] drives client and bidirectional streams
//! - [`invoke`] holds the per-service RPC logic
//! - [`commands`] renders results for the clap tree in [`cli`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod invoke;
pub mod output;
pub mod runner;
pub mod stream;
pub mod target;
pub mod transport;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
