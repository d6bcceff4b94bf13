//! MongoDB wire-protocol inspection.
//!
//! This module is a pure library over captured message bytes, shared by the
//! filter, the replay engine, the script generator and the classifier:
//!
//! - [`header`] - the 16-byte wire header and the opcode set
//! - [`inspect`] - byte-level extraction of command name, database,
//!   collection and category without a full BSON parse
//! - [`classify`] - user-vs-internal operation judgement
//! - [`command`] - full semantic extraction for command-mode replay

pub mod classify;
pub mod command;
pub mod header;
pub mod inspect;

#[cfg(test)]
pub(crate) mod testutil;

pub use command::{strip_internal_fields, Command, STRIPPED_FIELDS};
pub use header::{OpCode, WireHeader, WIRE_HEADER_LEN};
pub use inspect::CommandCategory;
