//! `system` command implementation.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gnoic_api::{path_to_xpath, GnoiOption};
use gnoic_proto::system::{
    reboot_status, traceroute_response, CancelRebootRequest, KillProcessRequest, PingRequest,
    Package, PingResponse, RebootMethod, RebootRequest, RebootStatusRequest, RebootStatusResponse,
    SetPackageRequest, SwitchControlProcessorRequest, SwitchControlProcessorResponse,
    TracerouteRequest, TracerouteResponse,
};
use serde::Serialize;

use super::{emit_line, hash_method_or_md5, report, request, Context, Done};
use crate::cli::{
    CancelRebootArgs, KillProcessArgs, PingArgs, RebootArgs, RebootStatusArgs, SetPackageArgs,
    SwitchControlProcessorArgs, SystemCommands, TracerouteArgs,
};
use crate::error::CliError;
use crate::invoke::system as invoke;
use crate::output::{print_proto, rfc3339_nanos, OutputFormat, TargetRows};
use crate::runner::summary;

/// System command executor.
pub struct SystemCommand {
    ctx: Context,
}

impl SystemCommand {
    /// Create a new system command.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Execute a system subcommand.
    ///
    /// # Errors
    ///
    /// Returns local setup errors before any RPC, or
    /// [`CliError::Failed`] when some targets failed.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &SystemCommands,
    ) -> Result<(), CliError> {
        match command {
            SystemCommands::Ping(args) => self.ping(writer, format, args).await,
            SystemCommands::Traceroute(args) => self.traceroute(writer, format, args).await,
            SystemCommands::Time => self.time(writer, format).await,
            SystemCommands::Reboot(args) => self.reboot(writer, format, args).await,
            SystemCommands::CancelReboot(args) => self.cancel_reboot(writer, format, args).await,
            SystemCommands::RebootStatus(args) => self.reboot_status(writer, format, args).await,
            SystemCommands::SwitchControlProcessor(args) => {
                self.switch_control_processor(writer, format, args).await
            }
            SystemCommands::KillProcess(args) => self.kill_process(writer, format, args).await,
            SystemCommands::SetPackage(args) => self.set_package(writer, format, args).await,
        }
    }

    async fn ping<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &PingArgs,
    ) -> Result<(), CliError> {
        let req = ping_request(args)?;
        let (proto, json) = (format.print_proto(), format.is_json());
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let name = session.name().to_string();
                    let mut replies = Vec::new();
                    invoke::ping(&session, req, |reply| {
                        if proto {
                            print_proto(&name, &reply)?;
                        } else if json {
                            replies.push(PingReply::from(&reply));
                        } else {
                            emit_line(&format!("{name}: {}", ping_line(&reply)))?;
                        }
                        Ok(())
                    })
                    .await?;
                    Ok(PingReplies { replies })
                }
            })
            .await;
        if json && !proto {
            return report(writer, format, entries, failed);
        }
        summary(failed)
    }

    async fn traceroute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &TracerouteArgs,
    ) -> Result<(), CliError> {
        let req = traceroute_request(args)?;
        let (proto, json) = (format.print_proto(), format.is_json());
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let name = session.name().to_string();
                    let mut hops = Vec::new();
                    invoke::traceroute(&session, req, |hop| {
                        if proto {
                            print_proto(&name, &hop)?;
                        } else if json {
                            hops.push(Hop::from(&hop));
                        } else {
                            emit_line(&format!("{name}: {}", traceroute_line(&hop)))?;
                        }
                        Ok(())
                    })
                    .await?;
                    Ok(Hops { hops })
                }
            })
            .await;
        if json && !proto {
            return report(writer, format, entries, failed);
        }
        summary(failed)
    }

    async fn time<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let (entries, failed) = self
            .ctx
            .run(|session| async move {
                let device = invoke::time(&session).await?;
                Ok(DeviceTime::new(device, local_nanos()))
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn reboot<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &RebootArgs,
    ) -> Result<(), CliError> {
        let mut options = vec![
            GnoiOption::RebootMethod(args.method.clone()),
            GnoiOption::Force(args.force),
        ];
        if let Some(delay) = args.delay {
            options.push(GnoiOption::Delay(duration_nanos(delay)));
        }
        if let Some(message) = &args.message {
            options.push(GnoiOption::Message(message.clone()));
        }
        options.extend(args.subcomponent.iter().cloned().map(GnoiOption::Subcomponent));
        let req: RebootRequest = request(options)?;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    invoke::reboot(&session, req).await?;
                    Ok(Done::new("reboot requested"))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn cancel_reboot<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &CancelRebootArgs,
    ) -> Result<(), CliError> {
        let mut options: Vec<GnoiOption> = args.message.iter().cloned().map(GnoiOption::Message).collect();
        options.extend(args.subcomponent.iter().cloned().map(GnoiOption::Subcomponent));
        let req: CancelRebootRequest = request(options)?;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    invoke::cancel_reboot(&session, req).await?;
                    Ok(Done::new("reboot cancelled"))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn reboot_status<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &RebootStatusArgs,
    ) -> Result<(), CliError> {
        let req: RebootStatusRequest = request(
            args.subcomponent.iter().cloned().map(GnoiOption::Subcomponent),
        )?;
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let response = invoke::reboot_status(&session, req).await?;
                    if proto {
                        print_proto(session.name(), &response)?;
                    }
                    Ok(RebootState::from(&response))
                }
            })
            .await;
        if proto {
            return summary(failed);
        }
        report(writer, format, entries, failed)
    }

    async fn switch_control_processor<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &SwitchControlProcessorArgs,
    ) -> Result<(), CliError> {
        let req: SwitchControlProcessorRequest =
            request([GnoiOption::ControlProcessor(args.path.clone())])?;
        let proto = format.print_proto();
        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    let response = invoke::switch_control_processor(&session, req).await?;
                    if proto {
                        print_proto(session.name(), &response)?;
                    }
                    Ok(Switched::from(&response))
                }
            })
            .await;
        if proto {
            return summary(failed);
        }
        report(writer, format, entries, failed)
    }

    async fn kill_process<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &KillProcessArgs,
    ) -> Result<(), CliError> {
        if args.pid.is_none() && args.name.is_none() {
            return Err(CliError::config("one of --pid or --name is required"));
        }
        let mut options = vec![
            GnoiOption::Signal(args.signal.clone()),
            GnoiOption::Restart(args.restart),
        ];
        options.extend(args.pid.map(GnoiOption::Pid));
        options.extend(args.name.clone().map(GnoiOption::ProcessName));
        let req: KillProcessRequest = request(options)?;

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let req = req.clone();
                async move {
                    invoke::kill_process(&session, req).await?;
                    Ok(Done::new("signal sent"))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }

    async fn set_package<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &SetPackageArgs,
    ) -> Result<(), CliError> {
        let header = set_package_header(args)?;
        let local: Option<PathBuf> = args.pkg.clone();
        if let Some(local) = &local {
            if !local.is_file() {
                return Err(CliError::config(format!("{}: not a file", local.display())));
            }
        }
        if args.chunk_size == 0 {
            return Err(CliError::config("--chunk-size must be positive"));
        }
        let chunk_size = args.chunk_size;
        let hash_method = hash_method_or_md5(&args.hash_method);

        let (entries, failed) = self
            .ctx
            .run(move |session| {
                let header = header.clone();
                let local = local.clone();
                async move {
                    let size = invoke::set_package(
                        &session,
                        header,
                        local.as_deref(),
                        chunk_size,
                        hash_method,
                    )
                    .await?;
                    Ok(Done::new(if local.is_some() {
                        format!("package sent ({size} bytes)")
                    } else {
                        "remote download requested".to_string()
                    }))
                }
            })
            .await;
        report(writer, format, entries, failed)
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn signed_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

fn local_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, duration_nanos)
}

fn ping_request(args: &PingArgs) -> Result<PingRequest, CliError> {
    let mut options = vec![
        GnoiOption::Destination(args.destination.clone()),
        GnoiOption::DoNotFragment(args.do_not_fragment),
        GnoiOption::DoNotResolve(args.do_not_resolve),
    ];
    options.extend(args.source.clone().map(GnoiOption::Source));
    options.extend(args.count.map(GnoiOption::Count));
    options.extend(args.interval.map(|d| GnoiOption::Interval(signed_nanos(d))));
    options.extend(args.wait.map(|d| GnoiOption::Wait(signed_nanos(d))));
    options.extend(args.size.map(GnoiOption::Size));
    options.extend(args.l3_protocol.clone().map(GnoiOption::L3Protocol));
    options.extend(args.network_instance.clone().map(GnoiOption::NetworkInstance));
    request(options)
}

fn traceroute_request(args: &TracerouteArgs) -> Result<TracerouteRequest, CliError> {
    let mut options = vec![
        GnoiOption::Destination(args.destination.clone()),
        GnoiOption::DoNotFragment(args.do_not_fragment),
        GnoiOption::DoNotResolve(args.do_not_resolve),
        GnoiOption::DoNotLookupAsn(args.do_not_lookup_asn),
    ];
    options.extend(args.source.clone().map(GnoiOption::Source));
    options.extend(args.initial_ttl.map(GnoiOption::InitialTtl));
    options.extend(args.max_ttl.map(GnoiOption::MaxTtl));
    options.extend(args.wait.map(|d| GnoiOption::Wait(signed_nanos(d))));
    options.extend(args.l3_protocol.clone().map(GnoiOption::L3Protocol));
    options.extend(args.l4_protocol.clone().map(GnoiOption::L4Protocol));
    options.extend(args.network_instance.clone().map(GnoiOption::NetworkInstance));
    request(options)
}

fn set_package_header(args: &SetPackageArgs) -> Result<SetPackageRequest, CliError> {
    let mut options = vec![
        GnoiOption::Filename(args.filename.clone()),
        GnoiOption::Activate(args.activate),
    ];
    options.extend(args.version.clone().map(GnoiOption::Version));
    if let Some(remote) = &args.remote_download {
        options.push(GnoiOption::RemotePath(remote.clone()));
        options.push(GnoiOption::Protocol(args.protocol.clone()));
        options.extend(args.remote_username.clone().map(GnoiOption::Username));
        options.extend(args.remote_password.clone().map(GnoiOption::Password));
    }
    let package: Package = request(options)?;
    request([GnoiOption::Package(package)])
}

fn ms(nanos: i64) -> String {
    format!("{:.3}ms", nanos as f64 / 1e6)
}

fn ping_line(reply: &PingResponse) -> String {
    if reply.sent > 0 {
        let loss = 100.0 * f64::from(reply.sent - reply.received) / f64::from(reply.sent);
        format!(
            "--- {} ping statistics --- {} packets transmitted, {} received, {loss:.1}% loss, \
             min/avg/max/stddev = {}/{}/{}/{}",
            reply.source,
            reply.sent,
            reply.received,
            ms(reply.min_time),
            ms(reply.avg_time),
            ms(reply.max_time),
            ms(reply.std_dev),
        )
    } else {
        format!(
            "{} bytes from {}: icmp_seq={} ttl={} time={}",
            reply.bytes,
            reply.source,
            reply.sequence,
            reply.ttl,
            ms(reply.time)
        )
    }
}

fn traceroute_line(hop: &TracerouteResponse) -> String {
    if !hop.destination_name.is_empty() || !hop.destination_address.is_empty() {
        return format!(
            "traceroute to {} ({}), {} hops max, {} byte packets",
            hop.destination_name, hop.destination_address, hop.hops, hop.packet_size
        );
    }
    let name = if hop.name.is_empty() { &hop.address } else { &hop.name };
    let mut line = format!("{:>2}  {name} ({}) {}", hop.hop, hop.address, ms(hop.rtt));
    if let Ok(state) = traceroute_response::State::try_from(hop.state) {
        if !matches!(state, traceroute_response::State::Default) {
            line.push(' ');
            line.push_str(state.as_str_name());
        }
    }
    if !hop.as_path.is_empty() {
        let asns: Vec<String> = hop.as_path.iter().map(|a| format!("AS{a}")).collect();
        line.push_str(&format!(" [{}]", asns.join(" ")));
    }
    line
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct PingReply {
    source: String,
    time: i64,
    sent: i32,
    received: i32,
    min_time: i64,
    avg_time: i64,
    max_time: i64,
    std_dev: i64,
    bytes: i32,
    sequence: i32,
    ttl: i32,
    #[serde(skip)]
    line: String,
}

impl From<&PingResponse> for PingReply {
    fn from(r: &PingResponse) -> Self {
        Self {
            source: r.source.clone(),
            time: r.time,
            sent: r.sent,
            received: r.received,
            min_time: r.min_time,
            avg_time: r.avg_time,
            max_time: r.max_time,
            std_dev: r.std_dev,
            bytes: r.bytes,
            sequence: r.sequence,
            ttl: r.ttl,
            line: ping_line(r),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct PingReplies {
    replies: Vec<PingReply>,
}

impl TargetRows for PingReplies {
    const HEADERS: &'static [&'static str] = &["Reply"];
    const SORTED: bool = false;

    fn rows(&self) -> Vec<Vec<String>> {
        self.replies.iter().map(|r| vec![r.line.clone()]).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
struct Hop {
    destination_name: String,
    destination_address: String,
    hop: i32,
    address: String,
    name: String,
    rtt: i64,
    state: String,
    as_path: Vec<i32>,
}

impl From<&TracerouteResponse> for Hop {
    fn from(r: &TracerouteResponse) -> Self {
        Self {
            destination_name: r.destination_name.clone(),
            destination_address: r.destination_address.clone(),
            hop: r.hop,
            address: r.address.clone(),
            name: r.name.clone(),
            rtt: r.rtt,
            state: traceroute_response::State::try_from(r.state)
                .map(|s| s.as_str_name().to_string())
                .unwrap_or_default(),
            as_path: r.as_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Hops {
    hops: Vec<Hop>,
}

impl TargetRows for Hops {
    const HEADERS: &'static [&'static str] = &["Hop", "Address", "Name", "RTT"];
    const SORTED: bool = false;

    fn rows(&self) -> Vec<Vec<String>> {
        self.hops
            .iter()
            .filter(|h| h.hop > 0)
            .map(|h| vec![h.hop.to_string(), h.address.clone(), h.name.clone(), ms(h.rtt)])
            .collect()
    }
}

/// Device clock next to the local one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct DeviceTime {
    time: String,
    timestamp: u64,
    diff: String,
}

impl DeviceTime {
    fn new(device: u64, local: u64) -> Self {
        let (sign, delta) = if local >= device {
            ("", local - device)
        } else {
            ("-", device - local)
        };
        // Whole microseconds keep the rendering short.
        let delta = Duration::from_nanos(delta - delta % 1_000);
        Self {
            time: rfc3339_nanos(i64::try_from(device).unwrap_or(i64::MAX)),
            timestamp: device,
            diff: format!("{sign}{}", humantime::format_duration(delta)),
        }
    }
}

impl TargetRows for DeviceTime {
    const HEADERS: &'static [&'static str] = &["Time", "Timestamp", "Diff"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.time.clone(),
            self.timestamp.to_string(),
            self.diff.clone(),
        ]]
    }
}

#[derive(Debug, Clone, Serialize)]
struct RebootState {
    active: bool,
    wait: u64,
    when: String,
    reason: String,
    count: u32,
    method: String,
    status: String,
}

impl From<&RebootStatusResponse> for RebootState {
    fn from(r: &RebootStatusResponse) -> Self {
        Self {
            active: r.active,
            wait: r.wait,
            when: if r.when == 0 {
                String::new()
            } else {
                rfc3339_nanos(i64::try_from(r.when).unwrap_or(i64::MAX))
            },
            reason: r.reason.clone(),
            count: r.count,
            method: RebootMethod::try_from(r.method)
                .map(|m| m.as_str_name().to_string())
                .unwrap_or_default(),
            status: r
                .status
                .as_ref()
                .map(|s| {
                    let status = reboot_status::Status::try_from(s.status)
                        .map_or_else(|_| s.status.to_string(), |st| st.as_str_name().to_string());
                    if s.message.is_empty() {
                        status
                    } else {
                        format!("{status}: {}", s.message)
                    }
                })
                .unwrap_or_default(),
        }
    }
}

impl TargetRows for RebootState {
    const HEADERS: &'static [&'static str] =
        &["Active", "Wait", "When", "Reason", "Count", "Method", "Status"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.active.to_string(),
            humantime::format_duration(Duration::from_nanos(self.wait)).to_string(),
            self.when.clone(),
            self.reason.clone(),
            self.count.to_string(),
            self.method.clone(),
            self.status.clone(),
        ]]
    }
}

#[derive(Debug, Clone, Serialize)]
struct Switched {
    control_processor: String,
    version: String,
    uptime: String,
}

impl From<&SwitchControlProcessorResponse> for Switched {
    fn from(r: &SwitchControlProcessorResponse) -> Self {
        Self {
            control_processor: r
                .control_processor
                .as_ref()
                .map(path_to_xpath)
                .unwrap_or_default(),
            version: r.version.clone(),
            uptime: rfc3339_nanos(r.uptime),
        }
    }
}

impl TargetRows for Switched {
    const HEADERS: &'static [&'static str] = &["Control Processor", "Version", "Uptime"];

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.control_processor.clone(),
            self.version.clone(),
            self.uptime.clone(),
        ]]
    }
}
