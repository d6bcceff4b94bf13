//! The replay loop: filter, pace, dispatch, account.
//!
//! A single cooperative task consumes packets, sleeps until each is due and
//! dispatches the send. The only suspension points are the pacing sleep and
//! the driver I/O, and both honor cancellation: the sleep wakes early, an
//! in-flight send is allowed to complete, and no further packets are
//! scheduled.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::recording::Packet;
use crate::wire::{Command, OpCode, WireHeader};

use super::command::CommandSender;
use super::outcome::ReplayStats;
use super::raw::RawSender;
use super::scheduler::Scheduler;

/// Replay strategy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Write the captured bytes verbatim
    Raw,
    /// Re-issue the parsed command through the driver
    #[default]
    Command,
}

/// Configuration for one replay run
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub mode: ReplayMode,

    /// Divisor applied to inter-packet gaps; 1.0 preserves original timing,
    /// 0 disables pacing (fast-forward)
    pub speed: f64,

    /// Skip responses
    pub requests_only: bool,

    /// Skip non-user operations (simple command-name check)
    pub user_ops_only: bool,

    /// Skip non-user operations (context-aware check)
    pub user_ops_smart: bool,

    /// Parse and validate without sending
    pub dry_run: bool,

    /// Cap on send attempts
    pub limit: Option<u64>,

    /// Per-operation timeout for command mode
    pub op_timeout: Option<std::time::Duration>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            mode: ReplayMode::default(),
            speed: 1.0,
            requests_only: false,
            user_ops_only: false,
            user_ops_smart: false,
            dry_run: false,
            limit: None,
            op_timeout: None,
        }
    }
}

/// Where replayed packets go
pub enum ReplayTarget {
    Raw(RawSender),
    Command(CommandSender),
    /// No target: parse and validate only
    DryRun,
}

/// Per-session lifecycle: Idle until the first packet, Active while packets
/// flow, Closed when the stream ends.
#[derive(Default)]
struct SessionTracker {
    active: HashMap<u64, u64>,
}

impl SessionTracker {
    fn touch(&mut self, session_id: u64, order: u64) {
        if let Entry::Vacant(entry) = self.active.entry(session_id) {
            entry.insert(order);
            debug!(session = session_id, first_order = order, "session active");
        }
    }

    fn close_all(&mut self, raw: Option<&mut RawSender>) {
        if let Some(sender) = raw {
            for session_id in self.active.keys() {
                sender.close_session(*session_id);
            }
        }
        let closed = self.active.len();
        self.active.clear();
        if closed > 0 {
            debug!(sessions = closed, "sessions closed");
        }
    }
}

/// Drives packets from a recording to a target
pub struct ReplayEngine {
    config: ReplayConfig,
    shutdown: watch::Receiver<bool>,
}

impl ReplayEngine {
    pub fn new(config: ReplayConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self { config, shutdown }
    }

    /// Run the replay loop to completion, cancellation or the operation
    /// limit.
    ///
    /// Per-packet errors are soft: they are logged, counted and the loop
    /// continues. The returned stats carry the final verdict.
    pub async fn run<I>(&mut self, source: I, target: &mut ReplayTarget) -> Result<ReplayStats>
    where
        I: Iterator<Item = Result<Packet>>,
    {
        let mut stats = ReplayStats {
            started_at_ms: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(self.config.speed);
        let mut sessions = SessionTracker::default();
        let started = Instant::now();

        info!(
            mode = ?self.config.mode,
            speed = self.config.speed,
            dry_run = self.config.dry_run,
            "starting replay"
        );

        for packet in source {
            if *self.shutdown.borrow() {
                stats.cancelled = true;
                break;
            }

            let packet = match packet {
                Ok(packet) => packet,
                Err(err) => {
                    warn!(error = %err, "recording read error, skipping");
                    stats.skipped += 1;
                    continue;
                }
            };

            stats.total_packets += 1;
            sessions.touch(packet.session_id, packet.order);

            if packet.message.is_empty() {
                stats.skipped += 1;
                continue;
            }
            if self.config.requests_only && !packet.is_request() {
                stats.skipped += 1;
                continue;
            }
            if self.config.user_ops_only && !packet.is_user_operation() {
                stats.skipped += 1;
                continue;
            }
            if self.config.user_ops_smart && !packet.is_likely_user_operation() {
                stats.skipped += 1;
                continue;
            }
            if let Some(limit) = self.config.limit {
                if stats.attempted >= limit {
                    info!(limit, "operation limit reached");
                    break;
                }
            }

            tokio::select! {
                _ = scheduler.pace(packet.offset_us) => {}
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    stats.cancelled = true;
                    break;
                }
            }

            if self.config.dry_run || matches!(target, ReplayTarget::DryRun) {
                self.dry_run_packet(&packet, &mut stats);
                continue;
            }

            match target {
                ReplayTarget::Raw(sender) => {
                    let outcome = sender.send(packet.session_id, &packet.message).await;
                    stats.attempted += 1;
                    if outcome.success {
                        stats.succeeded += 1;
                        debug!(
                            session = packet.session_id,
                            request_id = outcome.request_id,
                            micros = outcome.duration.as_micros() as u64,
                            "sent"
                        );
                    } else {
                        stats.failed += 1;
                        warn!(
                            session = packet.session_id,
                            op_code = outcome.op_code,
                            error = outcome.error.as_deref().unwrap_or(""),
                            "raw send failed"
                        );
                    }
                }
                ReplayTarget::Command(sender) => {
                    let command = match Command::extract(&packet) {
                        Ok(command) => command,
                        Err(err) => {
                            debug!(order = packet.order, error = %err, "skipping unparseable packet");
                            stats.skipped += 1;
                            continue;
                        }
                    };
                    let outcome = sender.send(&command).await;
                    stats.attempted += 1;
                    if outcome.success {
                        stats.succeeded += 1;
                        debug!(
                            database = %outcome.database,
                            command = %outcome.name,
                            micros = outcome.duration.as_micros() as u64,
                            "sent"
                        );
                    } else {
                        stats.failed += 1;
                        warn!(
                            database = %outcome.database,
                            command = %outcome.name,
                            error = outcome.error.as_deref().unwrap_or(""),
                            "command failed"
                        );
                    }
                }
                ReplayTarget::DryRun => unreachable!("handled above"),
            }
        }

        // session teardown releases raw transports and drains the pool
        match target {
            ReplayTarget::Raw(sender) => {
                sessions.close_all(Some(sender));
                sender.shutdown();
            }
            _ => sessions.close_all(None),
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            total = stats.total_packets,
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            cancelled = stats.cancelled,
            duration_ms = stats.duration_ms,
            "replay finished"
        );
        Ok(stats)
    }

    /// Validate a packet the way the real send path would, without I/O
    fn dry_run_packet(&self, packet: &Packet, stats: &mut ReplayStats) {
        match self.config.mode {
            ReplayMode::Raw => {
                stats.attempted += 1;
                let valid = WireHeader::parse(&packet.message).is_some_and(|header| {
                    let legacy = header.opcode().map(OpCode::is_legacy).unwrap_or(false);
                    !legacy && header.message_length as usize == packet.message.len()
                });
                if valid {
                    stats.succeeded += 1;
                } else {
                    stats.failed += 1;
                    debug!(order = packet.order, "dry run: raw message would be rejected");
                }
            }
            ReplayMode::Command => match Command::extract(packet) {
                Ok(command) => {
                    stats.attempted += 1;
                    stats.succeeded += 1;
                    debug!(database = %command.database, command = %command.name, "dry run");
                }
                Err(err) => {
                    debug!(order = packet.order, error = %err, "dry run: skipping unparseable packet");
                    stats.skipped += 1;
                }
            },
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            // sender dropped without cancelling; never wake this arm
            std::future::pending::<()>().await;
        }
    }
}
