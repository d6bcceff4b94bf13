//! mongotap: replay, filter and analyze MongoDB traffic recordings.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mongotap::analyze::{self, format_bytes};
use mongotap::config::{Cli, Commands, OutputFormat};
use mongotap::error::{MongotapError, Result};
use mongotap::filter::{self, FilterConfig, FilterStats};
use mongotap::recording::{open_source, Packet, RecordingWriter};
use mongotap::replay::{
    CommandSender, RawSender, ReplayConfig, ReplayEngine, ReplayMode, ReplayStats, ReplayTarget,
};
use mongotap::script::{self, ScriptOptions};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!(failed, "finished with failures");
            ExitCode::from(1)
        }
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatch the subcommand; returns the number of failed operations
async fn run(cli: Cli) -> Result<u64> {
    match cli.command {
        Commands::Play {
            recording,
            target,
            mode,
            speed,
            requests_only,
            user_ops,
            user_ops_smart,
            dry_run,
            limit,
            timeout_ms,
        } => {
            let config = ReplayConfig {
                mode,
                speed: validate_speed(speed)?,
                requests_only,
                user_ops_only: user_ops,
                user_ops_smart,
                dry_run,
                limit,
                op_timeout: timeout_ms.map(Duration::from_millis),
            };
            let mut replay_target = if dry_run {
                info!("dry run: commands are parsed but not sent");
                ReplayTarget::DryRun
            } else {
                let uri = target.ok_or_else(|| {
                    MongotapError::config("--target is required unless --dry-run is set")
                })?;
                match mode {
                    ReplayMode::Raw => {
                        ReplayTarget::Raw(RawSender::connect(&uri, false).await?)
                    }
                    ReplayMode::Command => ReplayTarget::Command(
                        CommandSender::connect(&uri, config.op_timeout).await?,
                    ),
                }
            };
            play(&recording, config, &mut replay_target, cli.format).await
        }

        Commands::Validate {
            recording,
            target,
            speed,
            requests_only,
            user_ops_smart,
            limit,
        } => {
            let config = ReplayConfig {
                mode: ReplayMode::Raw,
                speed: validate_speed(speed)?,
                requests_only,
                user_ops_smart,
                limit,
                ..Default::default()
            };
            let mut replay_target = ReplayTarget::Raw(RawSender::connect(&target, true).await?);
            play(&recording, config, &mut replay_target, cli.format).await
        }

        Commands::Filter {
            input,
            output,
            requests_only,
            user_ops_only,
            user_ops_smart,
            exclude_internal,
            include_commands,
            exclude_commands,
            min_offset,
            max_offset,
        } => {
            let config = FilterConfig {
                requests_only,
                user_ops_only,
                user_ops_smart,
                exclude_internal,
                include_commands,
                exclude_commands,
                min_offset,
                max_offset,
            };
            let source = open_source(&input)?;
            let mut writer = RecordingWriter::create(&output)?;
            let stats = filter::run(source, &mut writer, &config)?;
            print_filter_summary(&stats, cli.format)?;
            Ok(0)
        }

        Commands::Analyze { recording } => {
            let report = analyze::analyze(open_source(&recording)?)?;
            match cli.format {
                OutputFormat::Text => print!("{}", analyze::render_text(&report)),
                OutputFormat::Json => println!("{}", to_json(&report)?),
            }
            Ok(0)
        }

        Commands::Packets {
            recording,
            filter,
            limit,
        } => {
            let list_filter = PacketListFilter::parse(&filter)?;
            list_packets(open_source(&recording)?, &list_filter, limit)?;
            Ok(0)
        }

        Commands::ScriptGen {
            recording,
            crud_only,
            requests_only,
            output,
        } => {
            let options = ScriptOptions {
                crud_only,
                requests_only,
            };
            let source = open_source(&recording)?;
            let stats = match output {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)?;
                    let stats = script::generate(source, &mut file, &options)?;
                    info!(path = %path.display(), "script written");
                    stats
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    script::generate(source, &mut lock, &options)?
                }
            };
            if stats.unparseable > 0 {
                warn!(
                    unparseable = stats.unparseable,
                    "some packets could not be translated"
                );
            }
            Ok(0)
        }
    }
}

fn validate_speed(speed: f64) -> Result<f64> {
    if speed < 0.0 || !speed.is_finite() {
        return Err(MongotapError::config(format!(
            "speed must be a non-negative number, got {speed}"
        )));
    }
    Ok(speed)
}

/// Run the replay engine with Ctrl-C wired to graceful drain
async fn play(
    recording: &Path,
    config: ReplayConfig,
    target: &mut ReplayTarget,
    format: OutputFormat,
) -> Result<u64> {
    let source = open_source(recording)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, draining");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut engine = ReplayEngine::new(config, shutdown_rx);
    let stats = engine.run(source, target).await?;
    print_replay_summary(&stats, format)?;
    Ok(stats.failed)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| MongotapError::config(format!("failed to serialize report: {err}")))
}

fn print_replay_summary(stats: &ReplayStats, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", to_json(stats)?);
        return Ok(());
    }

    println!();
    println!("{}", "Replay summary".bold());
    println!("  Total packets:   {}", stats.total_packets);
    println!("  Skipped:         {}", stats.skipped);
    println!("  Attempted:       {}", stats.attempted);
    println!("  Succeeded:       {}", stats.succeeded.to_string().green());
    if stats.failed > 0 {
        println!("  Failed:          {}", stats.failed.to_string().red());
    } else {
        println!("  Failed:          0");
    }
    println!(
        "  Duration:        {:.3} s",
        stats.duration_ms as f64 / 1_000.0
    );
    if let Some(mean) = stats.mean_op_micros() {
        println!("  Mean per op:     {mean} us");
    }
    if stats.cancelled {
        println!("  {}", "Cancelled before the stream ended".yellow());
    }
    Ok(())
}

fn print_filter_summary(stats: &FilterStats, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", to_json(stats)?);
        return Ok(());
    }

    println!();
    println!("{}", "Filter results".bold());
    println!(
        "  Input:   {} packets, {}",
        stats.input_packets,
        format_bytes(stats.input_bytes)
    );
    println!(
        "  Output:  {} packets, {}",
        stats.output_packets,
        format_bytes(stats.output_bytes)
    );
    if stats.input_packets > 0 {
        let dropped = stats.dropped();
        println!(
            "  Dropped: {} packets ({:.1}%)",
            dropped,
            dropped as f64 / stats.input_packets as f64 * 100.0
        );
    }

    let reasons = [
        ("responses", stats.dropped_responses),
        ("internal operations", stats.dropped_internal),
        ("command filters", stats.dropped_by_command),
        ("time range", stats.dropped_by_time),
        ("empty messages", stats.dropped_empty),
    ];
    if reasons.iter().any(|(_, count)| *count > 0) {
        println!("  By reason:");
        for (label, count) in reasons {
            if count > 0 {
                println!("    {label:<20} {count}");
            }
        }
    }
    Ok(())
}

/// Filter for the `packets` listing
enum PacketListFilter {
    All,
    User,
    Command(String),
    Session(u64),
}

impl PacketListFilter {
    fn parse(text: &str) -> Result<Self> {
        if text == "all" {
            return Ok(Self::All);
        }
        if text == "user" {
            return Ok(Self::User);
        }
        if let Some(name) = text.strip_prefix("command:") {
            return Ok(Self::Command(name.to_string()));
        }
        if let Some(id) = text.strip_prefix("session:") {
            let id = id.parse().map_err(|_| {
                MongotapError::config(format!("invalid session id in filter: {id}"))
            })?;
            return Ok(Self::Session(id));
        }
        Err(MongotapError::config(format!(
            "unknown packet filter {text:?}; expected all, user, command:<name> or session:<id>"
        )))
    }

    fn matches(&self, packet: &Packet) -> bool {
        match self {
            Self::All => true,
            Self::User => packet.is_likely_user_operation(),
            Self::Command(name) => packet.command_name() == Some(name.as_str()),
            Self::Session(id) => packet.session_id == *id,
        }
    }
}

fn list_packets<I>(source: I, filter: &PacketListFilter, limit: usize) -> Result<()>
where
    I: Iterator<Item = Result<Packet>>,
{
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut shown = 0usize;

    for packet in source {
        let packet = packet?;
        if !filter.matches(&packet) {
            continue;
        }
        if shown >= limit {
            writeln!(out, "... output limited to {limit} packets")?;
            break;
        }
        shown += 1;

        if packet.is_session_event() {
            writeln!(
                out,
                "#{:<8} session={:<6} offset={:>12}us  session event  {}",
                packet.order,
                packet.session_id,
                packet.offset_us,
                packet.metadata_str()
            )?;
            continue;
        }

        let direction = if packet.is_request() {
            "request "
        } else {
            "response"
        };
        let command = packet.command_name().unwrap_or("-");
        let namespace = match (packet.database(), packet.collection()) {
            (Some(db), Some(coll)) => format!("{db}.{coll}"),
            (Some(db), None) => db.to_string(),
            _ => String::new(),
        };
        writeln!(
            out,
            "#{:<8} session={:<6} offset={:>12}us  {:<9} {}  {:<16} {:<24} ({})",
            packet.order,
            packet.session_id,
            packet.offset_us,
            direction,
            opcode_label(packet.opcode()),
            command,
            namespace,
            packet.category()
        )?;
    }
    Ok(())
}

fn opcode_label(code: u32) -> String {
    mongotap::OpCode::from_u32(code)
        .map(|op| op.to_string())
        .unwrap_or_else(|| format!("opcode({code})"))
}
