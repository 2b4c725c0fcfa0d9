//! Factory reset.

use gnoic_proto::factory_reset::{start_response, ResetError, StartRequest};
use tracing::info;

use crate::error::CliError;
use crate::transport::Session;

/// Starts a factory reset.
///
/// # Errors
///
/// Fails on RPC errors and when the target refuses with a reset error.
pub async fn start(session: &Session, request: StartRequest) -> Result<(), CliError> {
    let response = session
        .unary(session.factory_reset().start(request))
        .await?;
    match response.response {
        Some(start_response::Response::ResetSuccess(_)) => {
            info!(target = %session.name(), "factory reset started");
            Ok(())
        }
        Some(start_response::Response::ResetError(err)) => {
            Err(CliError::protocol(reset_error_message(&err)))
        }
        None => Err(CliError::protocol("empty factory reset response")),
    }
}

/// Describes a reset error, naming each unsupported option.
#[must_use]
pub fn reset_error_message(err: &ResetError) -> String {
    let mut reasons = Vec::new();
    if err.factory_os_unsupported {
        reasons.push("factory OS unsupported");
    }
    if err.zero_fill_unsupported {
        reasons.push("zero fill unsupported");
    }
    if err.other {
        reasons.push("other error");
    }
    let mut message = format!("reset error: {}", reasons.join(", "));
    if reasons.is_empty() {
        message.push_str("unspecified");
    }
    if !err.detail.is_empty() {
        message.push_str(&format!(": {}", err.detail));
    }
    message
}
