//! Per-operation outcomes and aggregate replay statistics.

use std::time::Duration;

use bson::Document;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Result of sending one raw wire message
#[derive(Debug, Clone)]
pub struct RawOutcome {
    pub success: bool,
    pub op_code: u32,
    pub request_id: i32,
    pub response_to: i32,
    pub duration: Duration,
    /// Raw response bytes, when response reading is enabled
    pub response: Option<Bytes>,
    pub error: Option<String>,
}

impl RawOutcome {
    pub(crate) fn failure(op_code: u32, request_id: i32, response_to: i32, duration: Duration, error: String) -> Self {
        Self {
            success: false,
            op_code,
            request_id,
            response_to,
            duration,
            response: None,
            error: Some(error),
        }
    }
}

/// Result of sending one semantic command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub database: String,
    pub name: String,
    pub duration: Duration,
    pub response: Option<Document>,
    pub error: Option<String>,
}

/// Aggregate counts for one replay run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Wall-clock start of the run, milliseconds since the epoch
    pub started_at_ms: i64,
    /// Packets read from the recording
    pub total_packets: u64,
    /// Packets skipped by filters, empty messages or parse failures
    pub skipped: u64,
    /// Send attempts
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
    /// Whether the run was cancelled before the stream ended
    pub cancelled: bool,
}

impl ReplayStats {
    /// Whether every attempted operation succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Mean latency per attempted operation, in microseconds
    pub fn mean_op_micros(&self) -> Option<u64> {
        if self.attempted == 0 {
            return None;
        }
        Some(self.duration_ms * 1_000 / self.attempted)
    }
}
