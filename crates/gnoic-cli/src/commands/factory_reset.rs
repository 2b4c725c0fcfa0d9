//! `factory-reset` command implementation.

use std::io::Write;

use gnoic_api::GnoiOption;
use gnoic_proto::factory_reset::StartRequest;

use super::{report, request, Context, Done};
use crate::cli::{FactoryResetArgs, FactoryResetCommands};
use crate::error::CliError;
use crate::invoke::factory_reset as invoke;
use crate::output::OutputFormat;

/// Factory reset command executor.
pub struct FactoryResetCommand {
    ctx: Context,
}

impl FactoryResetCommand {
    /// Create a new factory reset command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Execute a factory reset subcommand.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &FactoryResetCommands,
    ) -> Result<(), CliError> {
        match command {
            FactoryResetCommands::Start(args) => self.start(writer, format, args).await,
        }
    }

    async fn start<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &FactoryResetArgs,
    ) -> Result<(), CliError> {
        let req = start_request(args)?;
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    invoke::start(&session, req).await?;
                    Ok(Done::new("factory reset started"))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }
}

fn start_request(args: &FactoryResetArgs) -> Result<StartRequest, CliError> {
    request([
        GnoiOption::FactoryOs(args.factory_os),
        GnoiOption::ZeroFill(args.zero_fill),
        GnoiOption::RetainCerts(args.retain_certs),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_request() {
        let req = start_request(&FactoryResetArgs {
            factory_os: true,
            zero_fill: false,
            retain_certs: true,
        })
        .unwrap();
        assert!(req.factory_os);
        assert!(!req.zero_fill);
        assert!(req.retain_certs);
    }
}
