//! Byte-level inspection of captured wire messages.
//!
//! Pure functions over a packet's message slice: no I/O and no allocation
//! beyond the returned string slices. The inspector deliberately does not
//! parse full BSON; payloads can be large and internal commands carry
//! opaque sub-documents. It walks only as far as each query needs.

use std::fmt;

use super::header::{OpCode, WIRE_HEADER_LEN};

/// Start of the section-0 BSON body: wire header (16) + flags (4) + kind (1)
pub const OP_MSG_BODY_OFFSET: usize = 21;

/// Candidate `$db` values longer than this are payload collisions, not the
/// driver-inserted field.
const MAX_DATABASE_NAME: usize = 64;

/// Read the opcode from the wire header, or 0 if the message is too short
pub fn opcode(message: &[u8]) -> u32 {
    if message.len() < WIRE_HEADER_LEN {
        return 0;
    }
    u32::from_le_bytes([message[12], message[13], message[14], message[15]])
}

/// Whether the message is a request (`response_to == 0`)
pub fn is_request(message: &[u8]) -> bool {
    if message.len() < WIRE_HEADER_LEN {
        return false;
    }
    u32::from_le_bytes([message[8], message[9], message[10], message[11]]) == 0
}

/// Extract the command name from an `OP_MSG` message.
///
/// The command name is the first field name of the section-0 body document.
/// Returns `None` for other opcodes, for messages whose first section is not
/// a body, and on any range failure.
pub fn command_name(message: &[u8]) -> Option<&str> {
    if message.len() < OP_MSG_BODY_OFFSET || opcode(message) != OpCode::Msg.as_u32() {
        return None;
    }
    // Section kind must be 0 (body); kind 1 document sequences are not navigated.
    if message[OP_MSG_BODY_OFFSET - 1] != 0 {
        return None;
    }
    // Skip the document length and the first element's type byte.
    let mut pos = OP_MSG_BODY_OFFSET + 4;
    if pos >= message.len() {
        return None;
    }
    pos += 1;
    let start = pos;
    while pos < message.len() && message[pos] != 0 {
        pos += 1;
    }
    if pos >= message.len() || pos == start {
        return None;
    }
    std::str::from_utf8(&message[start..pos]).ok()
}

/// Extract the target database from an `OP_MSG` message.
///
/// Scans for the `$db` field every compliant driver inserts into the body.
/// Candidate matches inside payload strings are rejected by shape: the match
/// must be followed by its name terminator, a sane length prefix and a
/// null-terminated value free of control bytes.
pub fn database(message: &[u8]) -> Option<&str> {
    if message.len() < OP_MSG_BODY_OFFSET || opcode(message) != OpCode::Msg.as_u32() {
        return None;
    }
    let mut search = OP_MSG_BODY_OFFSET;
    while let Some(found) = find(&message[search..], b"$db") {
        let idx = search + found;
        if let Some(value) = read_db_value(message, idx) {
            return Some(value);
        }
        search = idx + 1;
    }
    None
}

fn read_db_value(message: &[u8], idx: usize) -> Option<&str> {
    let mut pos = idx + 3;
    if *message.get(pos)? != 0 {
        return None;
    }
    pos += 1;
    let len_bytes = message.get(pos..pos + 4)?;
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    pos += 4;
    // BSON string length counts the trailing null
    if len == 0 || len > MAX_DATABASE_NAME {
        return None;
    }
    let value = message.get(pos..pos + len)?;
    if value[len - 1] != 0 {
        return None;
    }
    let name = std::str::from_utf8(&value[..len - 1]).ok()?;
    if name.is_empty() || name.bytes().any(|b| b.is_ascii_control()) {
        return None;
    }
    Some(name)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Extract the target collection from an `OP_MSG` message.
///
/// For commands whose first BSON value names the collection (`insert`,
/// `find`, `update`, ...) that value is a UTF-8 string. Returns `None` when
/// the first value is any other type; guessing on a type mismatch would
/// mis-read commands like `hello` or `getMore`.
pub fn collection(message: &[u8]) -> Option<&str> {
    let name = command_name(message)?;
    let type_pos = OP_MSG_BODY_OFFSET + 4;
    if *message.get(type_pos)? != 0x02 {
        return None;
    }
    let mut pos = type_pos + 1 + name.len() + 1;
    let len_bytes = message.get(pos..pos + 4)?;
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    pos += 4;
    if len == 0 {
        return None;
    }
    let value = message.get(pos..pos + len)?;
    if value[len - 1] != 0 {
        return None;
    }
    std::str::from_utf8(&value[..len - 1]).ok()
}

/// Human-oriented grouping of command names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    Crud,
    Read,
    ReadContinuation,
    Ddl,
    HealthCheck,
    Info,
    Replication,
    Admin,
    RecordingControl,
    LegacyQuery,
    LegacyReply,
    Unknown,
    Other,
}

impl CommandCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crud => "crud",
            Self::Read => "read",
            Self::ReadContinuation => "read-continuation",
            Self::Ddl => "ddl",
            Self::HealthCheck => "health-check",
            Self::Info => "info",
            Self::Replication => "replication",
            Self::Admin => "admin",
            Self::RecordingControl => "recording-control",
            Self::LegacyQuery => "legacy-query",
            Self::LegacyReply => "legacy-reply",
            Self::Unknown => "unknown",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorize a message by its command name, or by opcode when no command
/// can be extracted
pub fn category(message: &[u8]) -> CommandCategory {
    let Some(name) = command_name(message) else {
        let code = opcode(message);
        if code == OpCode::Query.as_u32() {
            return CommandCategory::LegacyQuery;
        }
        if code == OpCode::Reply.as_u32() {
            return CommandCategory::LegacyReply;
        }
        return CommandCategory::Unknown;
    };

    match name {
        "insert" | "update" | "delete" | "findAndModify" => CommandCategory::Crud,
        "find" | "aggregate" | "count" | "distinct" => CommandCategory::Read,
        "getMore" => CommandCategory::ReadContinuation,
        "create" | "drop" | "createIndexes" | "dropIndexes" | "listIndexes" | "collMod"
        | "renameCollection" => CommandCategory::Ddl,
        "hello" | "isMaster" | "ping" => CommandCategory::HealthCheck,
        "buildInfo" => CommandCategory::Info,
        "replSetHeartbeat" | "replSetGetStatus" | "replSetUpdatePosition" => {
            CommandCategory::Replication
        }
        "getParameter" | "setParameter" | "shutdown" | "killOp" | "currentOp" => {
            CommandCategory::Admin
        }
        "startRecordingTraffic" | "stopRecordingTraffic" => CommandCategory::RecordingControl,
        _ => CommandCategory::Other,
    }
}
