//! Semantic command extraction for replay in command mode.
//!
//! Raw replay forwards captured bytes untouched; command mode instead
//! re-parses the OP_MSG body into a [`bson::Document`] and re-issues it
//! through the driver. Driver- and server-managed fields are stripped first
//! so the driver does not see stale session or transaction state.

use bson::{Bson, Document};

use crate::error::{MongotapError, Result};
use crate::recording::Packet;

use super::header::OpCode;
use super::inspect::{self, OP_MSG_BODY_OFFSET};

/// Fields removed from extracted commands, at every nesting depth.
///
/// Only these exact keys are stripped; operator keys like `$set` or `$match`
/// pass through untouched.
pub const STRIPPED_FIELDS: &[&str] = &[
    "$clusterTime",
    "$db",
    "$readPreference",
    "lsid",
    "txnNumber",
    "autocommit",
    "startTransaction",
    "readConcern",
    "writeConcern",
];

/// A parsed semantic view of an OP_MSG request
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Target database name
    pub database: String,

    /// Command name: the first field name of the body document
    pub name: String,

    /// The command body with internal fields stripped
    pub document: Document,
}

impl Command {
    /// Extract a command from a recorded packet.
    ///
    /// Only `OP_MSG` is supported; `OP_COMPRESSED` bodies would need
    /// decompression, which raw mode deliberately avoids and command mode
    /// does not attempt.
    pub fn extract(packet: &Packet) -> Result<Self> {
        let message = packet.message.as_ref();

        let code = inspect::opcode(message);
        if code != OpCode::Msg.as_u32() {
            return Err(MongotapError::UnsupportedOpcode(code));
        }

        let name = inspect::command_name(message)
            .ok_or(MongotapError::MissingCommandName)?
            .to_string();
        let database = inspect::database(message)
            .ok_or(MongotapError::MissingDatabase)?
            .to_string();

        if message.len() <= OP_MSG_BODY_OFFSET {
            return Err(MongotapError::malformed_wire("OP_MSG carries no body"));
        }

        // from_reader consumes exactly one length-prefixed document, so a
        // trailing kind-1 section does not disturb the parse.
        let document = Document::from_reader(&message[OP_MSG_BODY_OFFSET..])?;

        Ok(Self {
            database,
            name,
            document: strip_internal_fields(&document),
        })
    }
}

/// Remove driver/server internal fields from a document, recursively.
///
/// Idempotent: stripping a stripped document is a no-op.
pub fn strip_internal_fields(document: &Document) -> Document {
    document
        .iter()
        .filter(|(key, _)| !STRIPPED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), strip_value(value)))
        .collect()
}

fn strip_value(value: &Bson) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(strip_internal_fields(doc)),
        Bson::Array(items) => Bson::Array(items.iter().map(strip_value).collect()),
        other => other.clone(),
    }
}
