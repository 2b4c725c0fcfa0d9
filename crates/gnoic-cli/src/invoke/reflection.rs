//! Server reflection: listing the services a target exposes.

use gnoic_api::{build, GnoiOption};
use gnoic_proto::reflection::{server_reflection_response, ServerReflectionRequest};

use crate::error::CliError;
use crate::stream::BidiStream;
use crate::transport::Session;

/// Lists the services exposed by the target, sorted by name.
///
/// # Errors
///
/// Fails on RPC errors and on a reflection error response.
pub async fn list_services(session: &Session) -> Result<Vec<String>, CliError> {
    use server_reflection_response::MessageResponse;

    let request: ServerReflectionRequest = build([
        GnoiOption::Host(session.target().address.clone()),
        GnoiOption::ListServices("*".into()),
    ])?;
    let mut client = session.reflection();
    let mut stream = BidiStream::open(session.cancel_token(), request, move |rx| async move {
        client.server_reflection_info(rx).await
    })
    .await?;
    let response = stream.expect("list services response").await?;
    stream.close_send();

    match response.message_response {
        Some(MessageResponse::ListServicesResponse(list)) => {
            let mut names: Vec<String> = list.service.into_iter().map(|s| s.name).collect();
            names.sort();
            Ok(names)
        }
        Some(MessageResponse::ErrorResponse(err)) => Err(CliError::protocol(format!(
            "reflection error {}: {}",
            err.error_code, err.error_message
        ))),
        _ => Err(CliError::protocol("unexpected reflection response")),
    }
}
