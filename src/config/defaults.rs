//! Shared default values for CLI arguments and I/O tuning.

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default replay speed multiplier (1.0 = original timing)
pub const DEFAULT_SPEED: f64 = 1.0;

/// Default cap on packets printed by the `packets` subcommand
pub const DEFAULT_PACKET_LIMIT: usize = 50;

/// Read buffer for recording files; recordings are large and sequential
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;
