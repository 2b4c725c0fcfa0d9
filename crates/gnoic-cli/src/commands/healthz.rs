//! `healthz` command implementation.

use std::io::Write;

use gnoic_api::{path_to_xpath, GnoiOption};
use gnoic_proto::healthz::{
    artifact_header, AcknowledgeRequest, ArtifactHeader, CheckRequest, ComponentStatus, GetRequest,
    ListRequest, Status,
};
use serde::{Serialize, Serializer};

use super::{report, request, Context};
use crate::cli::{
    HealthzAckArgs, HealthzArtifactArgs, HealthzCheckArgs, HealthzCommands, HealthzListArgs,
    HealthzPathArgs,
};
use crate::error::CliError;
use crate::invoke::healthz::{self as invoke, Artifact};
use crate::output::{print_proto, rfc3339_nanos, OutputFormat, Report, TableDisplay, TargetRows};
use crate::runner::summary;

/// Healthz command executor.
pub struct HealthzCommand {
    ctx: Context,
}

impl HealthzCommand {
    /// Create a new healthz command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Execute a healthz subcommand.
    ///
    /// # Errors
    ///
    /// Returns local setup errors before any RPC, or
    /// [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &HealthzCommands,
    ) -> Result<(), CliError> {
        match command {
            HealthzCommands::Get(args) => self.get(writer, format, args).await,
            HealthzCommands::List(args) => self.list(writer, format, args).await,
            HealthzCommands::Check(args) => self.check(writer, format, args).await,
            HealthzCommands::Ack(args) => self.ack(writer, format, args).await,
            HealthzCommands::Artifact(args) => self.artifact(writer, format, args).await,
        }
    }

    async fn get<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &HealthzPathArgs,
    ) -> Result<(), CliError> {
        let req: GetRequest = request([GnoiOption::ComponentPath(args.path.clone())])?;
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let status = invoke::get(&session, req).await?;
                    Health::new(session.name(), status, proto)
                }
            })
            .await;
        trees(writer, format, entries, failed)
    }

    async fn list<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &HealthzListArgs,
    ) -> Result<(), CliError> {
        let req: ListRequest = request([
            GnoiOption::ComponentPath(args.path.clone()),
            GnoiOption::IncludeAcknowledged(args.include_acknowledged),
        ])?;
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let statuses = invoke::list(&session, req).await?;
                    if proto {
                        for status in &statuses {
                            print_proto(session.name(), status)?;
                        }
                    }
                    Ok(Events {
                        events: statuses.iter().map(HealthNode::from).collect(),
                    })
                }
            })
            .await;
        if proto {
            return summary(failed);
        }
        report(writer, format, entries, failed)
    }

    async fn check<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &HealthzCheckArgs,
    ) -> Result<(), CliError> {
        let mut options = vec![GnoiOption::ComponentPath(args.path.clone())];
        options.extend(args.event_id.clone().map(GnoiOption::EventId));
        let req: CheckRequest = request(options)?;
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let status = invoke::check(&session, req).await?;
                    Health::new(session.name(), status, proto)
                }
            })
            .await;
        trees(writer, format, entries, failed)
    }

    async fn ack<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &HealthzAckArgs,
    ) -> Result<(), CliError> {
        let req: AcknowledgeRequest = request([
            GnoiOption::ComponentPath(args.path.clone()),
            GnoiOption::Id(args.id.clone()),
        ])?;
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let status = invoke::acknowledge(&session, req).await?;
                    Health::new(session.name(), status, proto)
                }
            })
            .await;
        trees(writer, format, entries, failed)
    }

    async fn artifact<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &HealthzArtifactArgs,
    ) -> Result<(), CliError> {
        std::fs::create_dir_all(&args.dst)
            .map_err(|e| CliError::config(format!("{}: {e}", args.dst.display())))?;
        let id = args.id.clone();
        let dst = args.dst.clone();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let id = id.clone();
                let dst = dst.join(session.name());
                async move {
                    tokio::fs::create_dir_all(&dst).await?;
                    let artifact = invoke::artifact(&session, &id, &dst).await?;
                    if artifact.file.is_none() {
                        print_proto(session.name(), &artifact.header)?;
                    }
                    Ok(artifact)
                }
            })
            .await;
        report(writer, format, entries, failed)
    }
}

/// Writes status trees, indented in text form.
fn trees<W: Write>(
    writer: &mut W,
    format: &OutputFormat,
    entries: Vec<(String, Health)>,
    failed: usize,
) -> Result<(), CliError> {
    if !format.print_proto() && !entries.is_empty() {
        format.write(writer, &Trees(Report::new(entries)))?;
    }
    summary(failed)
}

/// One component's health, with its subcomponents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct HealthNode {
    path: String,
    status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subcomponents: Vec<HealthNode>,
}

impl From<&ComponentStatus> for HealthNode {
    fn from(c: &ComponentStatus) -> Self {
        Self {
            path: c.path.as_ref().map(path_to_xpath).unwrap_or_default(),
            status: Status::try_from(c.status)
                .map_or_else(|_| c.status.to_string(), |s| s.as_str_name().to_string()),
            id: c.id.clone(),
            acknowledged: c.acknowledged,
            created: c.created.as_ref().map(timestamp),
            expires: c.expires.as_ref().map(timestamp),
            artifacts: c.artifacts.iter().map(artifact_label).collect(),
            subcomponents: c.subcomponents.iter().map(Self::from).collect(),
        }
    }
}

impl HealthNode {
    fn render(&self, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let mut line = format!("{indent}{}: {}", self.path, self.status);
        if !self.id.is_empty() {
            line.push_str(&format!(" id={}", self.id));
        }
        if self.acknowledged {
            line.push_str(" (acknowledged)");
        }
        lines.push(line);
        if let Some(created) = &self.created {
            lines.push(format!("{indent}  created: {created}"));
        }
        if let Some(expires) = &self.expires {
            lines.push(format!("{indent}  expires: {expires}"));
        }
        for artifact in &self.artifacts {
            lines.push(format!("{indent}  artifact: {artifact}"));
        }
        for sub in &self.subcomponents {
            sub.render(depth + 1, lines);
        }
    }

    fn flatten<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        for sub in &self.subcomponents {
            sub.flatten(out);
        }
    }
}

fn timestamp(ts: &prost_types::Timestamp) -> String {
    rfc3339_nanos(
        ts.seconds
            .saturating_mul(1_000_000_000)
            .saturating_add(i64::from(ts.nanos)),
    )
}

fn artifact_label(header: &ArtifactHeader) -> String {
    match &header.artifact_type {
        Some(artifact_header::ArtifactType::File(f)) => format!("{} (file {})", header.id, f.name),
        Some(artifact_header::ArtifactType::Proto(_)) => format!("{} (proto)", header.id),
        Some(artifact_header::ArtifactType::Custom(_)) => format!("{} (custom)", header.id),
        None => header.id.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
struct Health {
    component: Option<HealthNode>,
}

impl Health {
    fn new(target: &str, status: Option<ComponentStatus>, proto: bool) -> Result<Self, CliError> {
        if proto {
            if let Some(status) = &status {
                print_proto(target, status)?;
            }
        }
        Ok(Self {
            component: status.as_ref().map(HealthNode::from),
        })
    }
}

struct Trees(Report<Health>);

impl Serialize for Trees {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl TableDisplay for Trees {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for (target, health) in self.0.entries() {
            writeln!(writer, "{target}:")?;
            match &health.component {
                Some(node) => {
                    let mut lines = Vec::new();
                    node.render(1, &mut lines);
                    for line in lines {
                        writeln!(writer, "{line}")?;
                    }
                }
                None => writeln!(writer, "  (no status)")?,
            }
        }
        Ok(())
    }
}

/// Health events, one row per component and artifact.
#[derive(Debug, Clone, Serialize)]
struct Events {
    events: Vec<HealthNode>,
}

impl TargetRows for Events {
    const HEADERS: &'static [&'static str] = &[
        "Path",
        "Status",
        "ID",
        "Acknowledged",
        "Created",
        "Expires",
        "Artifact",
    ];

    fn rows(&self) -> Vec<Vec<String>> {
        let mut nodes = Vec::new();
        for event in &self.events {
            event.flatten(&mut nodes);
        }
        let mut rows = Vec::new();
        for node in nodes {
            let base = vec![
                node.path.clone(),
                node.status.clone(),
                node.id.clone(),
                node.acknowledged.to_string(),
                node.created.clone().unwrap_or_default(),
                node.expires.clone().unwrap_or_default(),
            ];
            if node.artifacts.is_empty() {
                rows.push([base.clone(), vec![String::new()]].concat());
            }
            for artifact in &node.artifacts {
                rows.push([base.clone(), vec![artifact.clone()]].concat());
            }
        }
        rows
    }
}

impl TargetRows for Artifact {
    const HEADERS: &'static [&'static str] = &["ID", "Kind", "File", "Size"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.id.clone(),
            self.kind.to_string(),
            self.file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_default(),
            self.size.to_string(),
        ]]
    }
}
