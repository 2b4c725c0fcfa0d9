//! `os` command implementation.

use std::io::Write;

use gnoic_api::GnoiOption;
use gnoic_proto::os::{
    standby_state, verify_standby, ActivateRequest, TransferRequest, Validated, VerifyResponse,
};
use serde::Serialize;

use super::{report, request, Context, Done};
use crate::cli::{OsActivateArgs, OsCommands, OsInstallArgs};
use crate::error::CliError;
use crate::invoke::os as invoke;
use crate::output::{print_proto, OutputFormat, TargetRows};
use crate::runner::summary;

/// OS command executor.
pub struct OsCommand {
    ctx: Context,
}

impl OsCommand {
    /// Create a new OS command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Execute an OS subcommand.
    ///
    /// # Errors
    ///
    /// Returns local setup errors before any RPC, or
    /// [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &OsCommands,
    ) -> Result<(), CliError> {
        match command {
            OsCommands::Install(args) => self.install(writer, format, args).await,
            OsCommands::Activate(args) => self.activate(writer, format, args).await,
            OsCommands::Verify => self.verify(writer, format).await,
        }
    }

    async fn install<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &OsInstallArgs,
    ) -> Result<(), CliError> {
        if !args.pkg.is_file() {
            return Err(CliError::config(format!(
                "{}: not a file",
                args.pkg.display()
            )));
        }
        if args.chunk_size == 0 {
            return Err(CliError::config("--chunk-size must be positive"));
        }
        let transfer: TransferRequest = request([
            GnoiOption::Version(args.version.clone()),
            GnoiOption::StandbySupervisor(args.standby),
        ])?;
        let package = args.pkg.clone();
        let chunk_size = args.chunk_size;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let transfer = transfer.clone();
                let package = package.clone();
                async move {
                    let validated =
                        invoke::install(&session, transfer, &package, chunk_size).await?;
                    Ok(Installed::from(validated))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn activate<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &OsActivateArgs,
    ) -> Result<(), CliError> {
        let req: ActivateRequest = request([
            GnoiOption::Version(args.version.clone()),
            GnoiOption::StandbySupervisor(args.standby),
            GnoiOption::NoReboot(args.no_reboot),
        ])?;
        let version = args.version.clone();

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                let version = version.clone();
                async move {
                    invoke::activate(&session, req).await?;
                    Ok(Done::new(format!("activated {version}")))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn verify<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| async move {
                let response = invoke::verify(&session).await?;
                if proto {
                    print_proto(session.name(), &response)?;
                }
                Ok(Verified::from(&response))
            })
            .await;
        if proto {
            return summary(failed);
        }
        report(writer, format, entries, failed)
    }
}

/// A package the target accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Installed {
    version: String,
    description: String,
}

impl From<Validated> for Installed {
    fn from(v: Validated) -> Self {
        Self {
            version: v.version,
            description: v.description,
        }
    }
}

impl TargetRows for Installed {
    const HEADERS: &'static [&'static str] = &["Version", "Description"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.version.clone(), self.description.clone()]]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Verified {
    version: String,
    activation_fail_message: String,
    standby: String,
}

impl From<&VerifyResponse> for Verified {
    fn from(r: &VerifyResponse) -> Self {
        Self {
            version: r.version.clone(),
            activation_fail_message: r.activation_fail_message.clone(),
            standby: standby(r),
        }
    }
}

fn standby(r: &VerifyResponse) -> String {
    match r.verify_standby.as_ref().and_then(|s| s.state.as_ref()) {
        None => String::new(),
        Some(verify_standby::State::StandbyState(s)) => standby_state::State::try_from(s.state)
            .map_or_else(|_| s.state.to_string(), |st| st.as_str_name().to_string()),
        Some(verify_standby::State::VerifyResponse(v)) if v.activation_fail_message.is_empty() => {
            format!("{} {}", v.id, v.version)
        }
        Some(verify_standby::State::VerifyResponse(v)) => {
            format!("{} {}: {}", v.id, v.version, v.activation_fail_message)
        }
    }
}

impl TargetRows for Verified {
    const HEADERS: &'static [&'static str] = &["Version", "Activation Fail Message", "Standby"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.version.clone(),
            self.activation_fail_message.clone(),
            self.standby.clone(),
        ]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoic_proto::os::{StandbyResponse, StandbyState, VerifyStandby};

    #[test]
    fn standby_unsupported() {
        let r = VerifyResponse {
            version: "1.0".into(),
            verify_standby: Some(VerifyStandby {
                state: Some(verify_standby::State::StandbyState(StandbyState {
                    state: standby_state::State::Unsupported as i32,
                })),
            }),
            ..Default::default()
        };
        assert_eq!(Verified::from(&r).standby, "UNSUPPORTED");
    }

    #[test]
    fn standby_with_failure() {
        let r = VerifyResponse {
            verify_standby: Some(VerifyStandby {
                state: Some(verify_standby::State::VerifyResponse(StandbyResponse {
                    id: "sup2".into(),
                    version: "1.1".into(),
                    activation_fail_message: "boot loop".into(),
                })),
            }),
            ..Default::default()
        };
        assert_eq!(Verified::from(&r).standby, "sup2 1.1: boot loop");
    }

    #[test]
    fn verify_without_standby() {
        let r = VerifyResponse {
            version: "2.0".into(),
            ..Default::default()
        };
        let v = Verified::from(&r);
        assert!(v.standby.is_empty());
        assert_eq!(v.rows(), vec![vec!["2.0".to_string(), String::new(), String::new()]]);
    }

    #[test]
    fn installed_row() {
        let i = Installed::from(Validated {
            version: "3.1".into(),
            description: "ok".into(),
        });
        assert_eq!(i.rows()[0], vec!["3.1".to_string(), "ok".to_string()]);
    }
}
