//! Single-pass statistics over a recording.
//!
//! Streams the packets once and accumulates totals, per-session counters,
//! an opcode histogram and command counts. Session start/end events are not
//! tagged in the frame format, so each session's boundaries are synthesized
//! from the first and last order numbers seen for its id.

use std::collections::{BTreeMap, HashMap};

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::recording::Packet;
use crate::wire::OpCode;

/// Complete report over one recording
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AnalyzeReport {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub requests: u64,
    pub responses: u64,
    pub empty_messages: u64,
    pub first_offset_us: u64,
    pub last_offset_us: u64,
    /// Packet count per wire opcode
    pub opcodes: BTreeMap<u32, u64>,
    /// Packet count per command name
    pub commands: BTreeMap<String, u64>,
    /// Per-session statistics, ordered by first appearance
    pub sessions: Vec<SessionReport>,
}

/// Statistics for one recorded session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: u64,
    pub metadata: String,
    pub packets: u64,
    pub requests: u64,
    pub responses: u64,
    pub bytes: u64,
    /// Synthesized session start: first order seen for this id
    pub first_order: u64,
    /// Synthesized session end: last order seen for this id
    pub last_order: u64,
    pub first_offset_us: u64,
    pub last_offset_us: u64,
}

impl AnalyzeReport {
    /// Recording span in microseconds
    pub fn duration_us(&self) -> u64 {
        self.last_offset_us.saturating_sub(self.first_offset_us)
    }
}

/// Streaming accumulator behind [`analyze`]
#[derive(Default)]
pub struct Analyzer {
    report: AnalyzeReport,
    session_index: HashMap<u64, usize>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one packet into the report
    pub fn observe(&mut self, packet: &Packet) {
        let report = &mut self.report;

        if report.total_packets == 0 {
            report.first_offset_us = packet.offset_us;
        }
        report.last_offset_us = packet.offset_us;
        report.total_packets += 1;
        report.total_bytes += u64::from(packet.size);

        let is_request = packet.is_request();
        if packet.message.is_empty() {
            report.empty_messages += 1;
        } else if is_request {
            report.requests += 1;
        } else {
            report.responses += 1;
        }

        if !packet.message.is_empty() {
            *report.opcodes.entry(packet.opcode()).or_insert(0) += 1;
        }
        if let Some(command) = packet.command_name() {
            *report.commands.entry(command.to_string()).or_insert(0) += 1;
        }

        let index = *self.session_index.entry(packet.session_id).or_insert_with(|| {
            report.sessions.push(SessionReport {
                session_id: packet.session_id,
                metadata: packet.metadata_str().into_owned(),
                packets: 0,
                requests: 0,
                responses: 0,
                bytes: 0,
                first_order: packet.order,
                last_order: packet.order,
                first_offset_us: packet.offset_us,
                last_offset_us: packet.offset_us,
            });
            report.sessions.len() - 1
        });
        let session = &mut report.sessions[index];
        session.packets += 1;
        session.bytes += u64::from(packet.size);
        session.last_order = packet.order;
        session.last_offset_us = packet.offset_us;
        if !packet.message.is_empty() {
            if is_request {
                session.requests += 1;
            } else {
                session.responses += 1;
            }
        }
    }

    pub fn finish(self) -> AnalyzeReport {
        self.report
    }
}

/// Analyze an entire packet stream.
///
/// Decode errors abort the analysis; a partial report over a torn recording
/// would be silently wrong.
pub fn analyze<I>(source: I) -> Result<AnalyzeReport>
where
    I: Iterator<Item = Result<Packet>>,
{
    let mut analyzer = Analyzer::new();
    for packet in source {
        analyzer.observe(&packet?);
    }
    Ok(analyzer.finish())
}

/// Render the report as terminal tables
pub fn render_text(report: &AnalyzeReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", "Recording summary".bold()));
    let mut summary = Table::new();
    summary
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    summary.set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Packets".to_string(), report.total_packets.to_string()]);
    summary.add_row(vec!["Bytes".to_string(), format_bytes(report.total_bytes)]);
    summary.add_row(vec!["Requests".to_string(), report.requests.to_string()]);
    summary.add_row(vec!["Responses".to_string(), report.responses.to_string()]);
    summary.add_row(vec![
        "Session events".to_string(),
        report.empty_messages.to_string(),
    ]);
    summary.add_row(vec![
        "Sessions".to_string(),
        report.sessions.len().to_string(),
    ]);
    summary.add_row(vec![
        "Duration".to_string(),
        format!("{:.3} s", report.duration_us() as f64 / 1_000_000.0),
    ]);
    out.push_str(&format!("{summary}\n\n"));

    if !report.opcodes.is_empty() {
        out.push_str(&format!("{}\n", "Opcodes".bold()));
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Opcode", "Packets"]);
        for (code, count) in &report.opcodes {
            let name = OpCode::from_u32(*code)
                .map(|op| op.to_string())
                .unwrap_or_else(|| format!("opcode({code})"));
            table.add_row(vec![name, count.to_string()]);
        }
        out.push_str(&format!("{table}\n\n"));
    }

    if !report.commands.is_empty() {
        out.push_str(&format!("{}\n", "Commands".bold()));
        let mut by_count: Vec<_> = report.commands.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Command", "Count"]);
        for (name, count) in by_count.iter().take(20) {
            table.add_row(vec![name.to_string(), count.to_string()]);
        }
        out.push_str(&format!("{table}\n\n"));
    }

    if !report.sessions.is_empty() {
        out.push_str(&format!("{}\n", "Sessions".bold()));
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            "Session", "Packets", "Requests", "Responses", "Bytes", "Orders", "Metadata",
        ]);
        for session in report.sessions.iter().take(20) {
            table.add_row(vec![
                session.session_id.to_string(),
                session.packets.to_string(),
                session.requests.to_string(),
                session.responses.to_string(),
                format_bytes(session.bytes),
                format!("{}..{}", session.first_order, session.last_order),
                session.metadata.clone(),
            ]);
        }
        if report.sessions.len() > 20 {
            out.push_str(&format!("{table}\n"));
            out.push_str(&format!(
                "... and {} more sessions\n",
                report.sessions.len() - 20
            ));
        } else {
            out.push_str(&format!("{table}\n"));
        }
    }

    out
}

/// Human-readable byte count (KiB/MiB/GiB)
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}iB", bytes as f64 / div as f64, b"KMGTPE"[exp] as char)
}
