//! gnoic binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use gnoic_cli::cli::{CertCommands, Cli, Commands};
use gnoic_cli::commands::{
    CertCommand, Context, FactoryResetCommand, FileCommand, HealthzCommand, OsCommand,
    ServicesCommand, SystemCommand,
};
use gnoic_cli::config::Settings;
use gnoic_cli::output::OutputFormat;
use gnoic_cli::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.global) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = if settings.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Commands that run without contacting any target.
fn is_offline(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Cert {
            command: CertCommands::CreateCa(_)
        }
    )
}

async fn run(cli: Cli, settings: Settings) -> Result<(), CliError> {
    let format = OutputFormat::new(settings.format, settings.print_proto);
    if !is_offline(&cli.command) {
        settings.require_targets()?;
    }
    debug!(targets = settings.targets.len(), "resolved targets");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let ctx = Context::new(settings.targets, cancel);
    let mut stdout = io::stdout();

    match &cli.command {
        Commands::Cert { command } => {
            let cmd = CertCommand::new(&ctx);
            cmd.execute(&mut stdout, &format, command).await
        }
        Commands::File { command } => {
            let cmd = FileCommand::new(&ctx);
            cmd.execute(&mut stdout, &format, command).await
        }
        Commands::System { command } => {
            let cmd = SystemCommand::new(&ctx);
            cmd.execute(&mut stdout, &format, command).await
        }
        Commands::Os { command } => {
            let cmd = OsCommand::new(&ctx);
            cmd.execute(&mut stdout, &format, command).await
        }
        Commands::Healthz { command } => {
            let cmd = HealthzCommand::new(&ctx);
            cmd.execute(&mut stdout, &format, command).await
        }
        Commands::FactoryReset { command } => {
            let cmd = FactoryResetCommand::new(&ctx);
            cmd.execute(&mut stdout, &format, command).await
        }
        Commands::Services => {
            let cmd = ServicesCommand::new(&ctx);
            cmd.execute(&mut stdout, &format).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoic_cli::cli::{FileCommands, Format, SystemCommands};

    #[test]
    fn cli_parses_global_flags_before_command() {
        let cli = Cli::parse_from([
            "gnoic",
            "-a",
            "r1,r2:6030",
            "--insecure",
            "--format",
            "json",
            "system",
            "time",
        ]);
        assert_eq!(cli.global.address, vec!["r1", "r2:6030"]);
        assert!(cli.global.insecure);
        assert_eq!(cli.global.format, Some(Format::Json));
        assert!(matches!(
            cli.command,
            Commands::System {
                command: SystemCommands::Time
            }
        ));
    }

    #[test]
    fn cli_parses_file_put() {
        let cli = Cli::parse_from([
            "gnoic", "file", "put", "--file", "a.bin", "--dst", "/tmp/a.bin",
        ]);
        let Commands::File {
            command: FileCommands::Put(args),
        } = cli.command
        else {
            unreachable!("parsed as file put");
        };
        assert_eq!(args.dst, "/tmp/a.bin");
    }

    #[test]
    fn create_ca_is_offline() {
        let cli = Cli::parse_from(["gnoic", "cert", "create-ca"]);
        assert!(is_offline(&cli.command));
        let cli = Cli::parse_from(["gnoic", "services"]);
        assert!(!is_offline(&cli.command));
    }

    #[test]
    fn cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["gnoic", "bogus"]).is_err());
    }
}
