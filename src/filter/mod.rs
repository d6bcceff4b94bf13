//! Recording rewrite: drop packets failing a predicate, keep the rest.
//!
//! The output is a strict subsequence of the input in the identical frame
//! format, so a filtered recording feeds straight back into raw replay.
//! Every drop is tallied by reason for the summary report.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::recording::{Packet, RecordingWriter};

/// Filter predicate configuration.
///
/// A packet is kept only when every enabled test passes. Offsets are
/// microseconds since recording start; zero disables the bound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep only requests; empty-message session events are preserved
    pub requests_only: bool,

    /// Keep only user operations, by command name alone
    pub user_ops_only: bool,

    /// Keep only user operations, checking database/collection context
    pub user_ops_smart: bool,

    /// Drop internal operations (health checks, replication, getMore)
    pub exclude_internal: bool,

    /// When non-empty, keep only these command names
    #[serde(default)]
    pub include_commands: Vec<String>,

    /// Drop these command names
    #[serde(default)]
    pub exclude_commands: Vec<String>,

    /// Drop packets before this offset (0 = no lower bound)
    pub min_offset: u64,

    /// Drop packets after this offset (0 = no upper bound)
    pub max_offset: u64,
}

/// Why a packet was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Response,
    InternalOperation,
    CommandFilter,
    TimeRange,
    EmptyMessage,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::InternalOperation => "internal-operation",
            Self::CommandFilter => "command-filter",
            Self::TimeRange => "time-range",
            Self::EmptyMessage => "empty-message",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics about one filter run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FilterStats {
    pub input_packets: u64,
    pub output_packets: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub dropped_responses: u64,
    pub dropped_internal: u64,
    pub dropped_by_command: u64,
    pub dropped_by_time: u64,
    pub dropped_empty: u64,
}

impl FilterStats {
    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Response => self.dropped_responses += 1,
            DropReason::InternalOperation => self.dropped_internal += 1,
            DropReason::CommandFilter => self.dropped_by_command += 1,
            DropReason::TimeRange => self.dropped_by_time += 1,
            DropReason::EmptyMessage => self.dropped_empty += 1,
        }
    }

    /// Packets dropped overall
    pub fn dropped(&self) -> u64 {
        self.input_packets - self.output_packets
    }
}

/// Decide whether a packet survives the predicate.
///
/// Returns the first failing test's reason, or `None` to keep the packet.
pub fn evaluate(packet: &Packet, config: &FilterConfig) -> Option<DropReason> {
    if config.min_offset > 0 && packet.offset_us < config.min_offset {
        return Some(DropReason::TimeRange);
    }
    if config.max_offset > 0 && packet.offset_us > config.max_offset {
        return Some(DropReason::TimeRange);
    }

    // Empty messages may be session events: kept under requests_only alone,
    // dropped once a command-based predicate is in play (they cannot
    // satisfy one).
    if config.requests_only && !packet.message.is_empty() && !packet.is_request() {
        return Some(DropReason::Response);
    }

    if config.user_ops_only {
        if packet.message.is_empty() {
            return Some(DropReason::EmptyMessage);
        }
        if !packet.is_user_operation() {
            return Some(DropReason::InternalOperation);
        }
    }

    if config.user_ops_smart {
        if packet.message.is_empty() {
            return Some(DropReason::EmptyMessage);
        }
        if !packet.is_likely_user_operation() {
            return Some(DropReason::InternalOperation);
        }
    }

    if config.exclude_internal && packet.is_internal_operation() {
        return Some(DropReason::InternalOperation);
    }

    if !config.include_commands.is_empty() || !config.exclude_commands.is_empty() {
        let command = packet.command_name().unwrap_or("");
        if !config.include_commands.is_empty()
            && !config.include_commands.iter().any(|c| c == command)
        {
            return Some(DropReason::CommandFilter);
        }
        if config.exclude_commands.iter().any(|c| c == command) {
            return Some(DropReason::CommandFilter);
        }
    }

    None
}

/// Copy surviving packets from `source` into `writer`.
///
/// Decode errors abort the run; the partial output file is left in place
/// for the caller to discard.
pub fn run<I, W>(
    source: I,
    writer: &mut RecordingWriter<W>,
    config: &FilterConfig,
) -> Result<FilterStats>
where
    I: Iterator<Item = Result<Packet>>,
    W: Write,
{
    let mut stats = FilterStats::default();

    for packet in source {
        let packet = packet?;
        stats.input_packets += 1;
        stats.input_bytes += u64::from(packet.size);

        if let Some(reason) = evaluate(&packet, config) {
            debug!(
                order = packet.order,
                session = packet.session_id,
                reason = %reason,
                command = packet.command_name().unwrap_or(""),
                "dropping packet"
            );
            stats.record_drop(reason);
            continue;
        }

        writer.write_packet(&packet)?;
        stats.output_packets += 1;
        stats.output_bytes += u64::from(packet.encoded_size());
    }

    writer.flush()?;
    info!(
        input = stats.input_packets,
        output = stats.output_packets,
        dropped = stats.dropped(),
        "filter complete"
    );
    Ok(stats)
}
