//! `services` command implementation.

use std::io::Write;

use serde::Serialize;

use super::{report, Context};
use crate::error::CliError;
use crate::invoke::reflection;
use crate::output::{OutputFormat, TargetRows};

/// Server reflection command executor.
pub struct ServicesCommand {
    ctx: Context,
}

impl ServicesCommand {
    /// Create a new services command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Lists the services every target exposes.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let (entries, failed) = self
            .ctx
            .run(|session| async move {
                Ok(Services {
                    services: reflection::list_services(&session).await?,
                })
            })
            .await;
        report(writer, format, entries, failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Services {
    services: Vec<String>,
}

impl TargetRows for Services {
    const HEADERS: &'static [&'static str] = &["Service"];

    fn rows(&self) -> Vec<Vec<String>> {
        self.services.iter().map(|s| vec![s.clone()]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_service() {
        let services = Services {
            services: vec!["gnoi.file.File".into(), "gnoi.system.System".into()],
        };
        let mut out = Vec::new();
        report(
            &mut out,
            &OutputFormat::default(),
            vec![("r1".to_string(), services)],
            0,
        )
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("gnoi.file.File"));
        assert_eq!(out.lines().filter(|l| l.starts_with("r1")).count(), 2);
    }
}
