//! Command-line arguments for mongotap.
//!
//! This module defines the CLI surface using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::replay::ReplayMode;

use super::defaults::*;

/// mongotap CLI
#[derive(Parser, Debug)]
#[command(name = "mongotap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay, filter and analyze MongoDB traffic recordings")]
#[command(long_about = r#"Replay, filter and analyze MongoDB traffic recordings.

Recordings are the .bin files written by the server's traffic recorder.
A recording argument may be a single file or a directory, in which case
every *.bin file is consumed in lexicographic (chronological) order.

QUICK START:
    # What is in this recording?
    mongotap analyze ./recording/

    # Replay user traffic against a staging cluster at double speed
    mongotap play ./recording/ --target mongodb://staging:27017 \
        --requests-only --user-ops-smart --speed 2.0

    # Byte-exact replay
    mongotap play ./recording/ --target mongodb://staging:27017 --mode raw

    # Shrink a recording to the interesting part
    mongotap filter --input big.bin --output small.bin \
        --requests-only --user-ops-smart

    # Turn a recording into a mongosh script
    mongotap script-gen ./recording/ --crud-only > replay.js

ENVIRONMENT VARIABLES:
    MONGOTAP_TARGET       Default target connection URI
    MONGOTAP_LOG_LEVEL    Log level (trace, debug, info, warn, error)"#)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MONGOTAP_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Output format for stats and reports
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// How stats and reports are printed
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recording against a target server
    #[command(long_about = r#"Replay a recording against a target server.

EXAMPLES:
    # Semantic replay preserving original timing
    mongotap play ./recording/ --target mongodb://localhost:27017

    # Byte-exact replay, fire-and-forget, as fast as possible
    mongotap play ./recording/ --target mongodb://localhost:27017 \
        --mode raw --speed 0

    # Only application traffic, first 1000 operations
    mongotap play ./recording/ --target mongodb://localhost:27017 \
        --requests-only --user-ops-smart --limit 1000

    # Check what would be sent, without a server
    mongotap play ./recording/ --dry-run"#)]
    Play {
        /// Recording file or directory of .bin files
        recording: PathBuf,

        /// Target connection URI (e.g. mongodb://localhost:27017)
        #[arg(long, env = "MONGOTAP_TARGET", required_unless_present = "dry_run")]
        target: Option<String>,

        /// Replay strategy
        #[arg(long, value_enum, default_value = "command")]
        mode: ReplayMode,

        /// Speed multiplier; 1.0 preserves capture timing, 0 fast-forwards
        #[arg(long, default_value_t = DEFAULT_SPEED)]
        speed: f64,

        /// Only replay requests (skip responses)
        #[arg(long)]
        requests_only: bool,

        /// Only replay user operations (simple command-name filter)
        #[arg(long)]
        user_ops: bool,

        /// Only replay user operations (context-aware database/collection check)
        #[arg(long)]
        user_ops_smart: bool,

        /// Parse and validate without sending
        #[arg(long)]
        dry_run: bool,

        /// Stop after N send attempts
        #[arg(long)]
        limit: Option<u64>,

        /// Per-operation timeout in milliseconds (command mode)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Raw-mode replay that reads one response per send
    #[command(long_about = r#"Raw-mode replay that reads one response per send.

Identical to `play --mode raw` except each send waits for the server's
response, so transport-level failures surface per operation instead of
being swallowed by fire-and-forget."#)]
    Validate {
        /// Recording file or directory of .bin files
        recording: PathBuf,

        /// Target connection URI
        #[arg(long, env = "MONGOTAP_TARGET")]
        target: String,

        /// Speed multiplier; 1.0 preserves capture timing, 0 fast-forwards
        #[arg(long, default_value_t = DEFAULT_SPEED)]
        speed: f64,

        /// Only replay requests (skip responses)
        #[arg(long)]
        requests_only: bool,

        /// Only replay user operations (context-aware check)
        #[arg(long)]
        user_ops_smart: bool,

        /// Stop after N send attempts
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Rewrite a recording, dropping packets that fail a predicate
    #[command(long_about = r#"Rewrite a recording, dropping packets that fail a predicate.

EXAMPLES:
    # Remove responses (typically halves the size)
    mongotap filter --input rec.bin --output out.bin --requests-only

    # Keep only user operations, context-aware
    mongotap filter --input rec.bin --output out.bin --user-ops-smart

    # Keep only inserts and updates in a time window
    mongotap filter --input rec.bin --output out.bin \
        --include-commands insert,update \
        --min-offset 1000000 --max-offset 9000000"#)]
    Filter {
        /// Input recording file or directory
        #[arg(long)]
        input: PathBuf,

        /// Output recording file
        #[arg(long)]
        output: PathBuf,

        /// Keep only requests; session events are preserved
        #[arg(long)]
        requests_only: bool,

        /// Keep only user operations (simple command-name filter)
        #[arg(long)]
        user_ops_only: bool,

        /// Keep only user operations (context-aware database/collection check)
        #[arg(long)]
        user_ops_smart: bool,

        /// Drop internal operations (hello, getMore, replication)
        #[arg(long)]
        exclude_internal: bool,

        /// Comma-separated command names to keep
        #[arg(long, value_delimiter = ',')]
        include_commands: Vec<String>,

        /// Comma-separated command names to drop
        #[arg(long, value_delimiter = ',')]
        exclude_commands: Vec<String>,

        /// Drop packets before this offset in microseconds
        #[arg(long, default_value_t = 0)]
        min_offset: u64,

        /// Drop packets after this offset in microseconds (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_offset: u64,
    },

    /// Summarize a recording: sessions, opcodes, commands, timing
    Analyze {
        /// Recording file or directory of .bin files
        recording: PathBuf,
    },

    /// List individual packets
    Packets {
        /// Recording file or directory of .bin files
        recording: PathBuf,

        /// all | user | command:<name> | session:<id>
        #[arg(long, default_value = "all")]
        filter: String,

        /// Maximum packets to print
        #[arg(long, default_value_t = DEFAULT_PACKET_LIMIT)]
        limit: usize,
    },

    /// Generate an administrative shell script from a recording
    #[command(name = "script-gen")]
    ScriptGen {
        /// Recording file or directory of .bin files
        recording: PathBuf,

        /// Only translate insert/update/delete/find/findAndModify
        #[arg(long)]
        crud_only: bool,

        /// Skip responses
        #[arg(long)]
        requests_only: bool,

        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
