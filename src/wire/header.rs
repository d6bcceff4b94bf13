//! Wire-protocol header and opcode definitions.

use std::fmt;

/// Length of the standard wire-protocol message header
pub const WIRE_HEADER_LEN: usize = 16;

/// MongoDB wire-protocol opcodes.
///
/// Everything except `Compressed` and `Msg` was removed from current servers
/// and is rejected for raw send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Reply,
    Update,
    Insert,
    Query,
    GetMore,
    Delete,
    KillCursors,
    Compressed,
    Msg,
}

impl OpCode {
    /// Map a raw wire-protocol code to an opcode, if known
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Reply),
            2001 => Some(Self::Update),
            2002 => Some(Self::Insert),
            2004 => Some(Self::Query),
            2005 => Some(Self::GetMore),
            2006 => Some(Self::Delete),
            2007 => Some(Self::KillCursors),
            2012 => Some(Self::Compressed),
            2013 => Some(Self::Msg),
            _ => None,
        }
    }

    /// The raw wire-protocol code
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Reply => 1,
            Self::Update => 2001,
            Self::Insert => 2002,
            Self::Query => 2004,
            Self::GetMore => 2005,
            Self::Delete => 2006,
            Self::KillCursors => 2007,
            Self::Compressed => 2012,
            Self::Msg => 2013,
        }
    }

    /// Whether this opcode was removed from current servers.
    ///
    /// Only `OP_MSG` and `OP_COMPRESSED` are accepted for send; the rest of
    /// the set (OP_REPLY included) cannot be replayed raw.
    pub fn is_legacy(self) -> bool {
        !matches!(self, Self::Compressed | Self::Msg)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reply => "OP_REPLY",
            Self::Update => "OP_UPDATE",
            Self::Insert => "OP_INSERT",
            Self::Query => "OP_QUERY",
            Self::GetMore => "OP_GET_MORE",
            Self::Delete => "OP_DELETE",
            Self::KillCursors => "OP_KILL_CURSORS",
            Self::Compressed => "OP_COMPRESSED",
            Self::Msg => "OP_MSG",
        };
        f.write_str(name)
    }
}

/// The 16-byte prefix of every wire-protocol message.
///
/// All fields are little-endian. `response_to == 0` marks a request; any
/// other value references the `request_id` being answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: u32,
}

impl WireHeader {
    /// Parse the header from the start of a message slice.
    ///
    /// Returns `None` when the slice is shorter than the header.
    pub fn parse(message: &[u8]) -> Option<Self> {
        if message.len() < WIRE_HEADER_LEN {
            return None;
        }
        Some(Self {
            message_length: i32::from_le_bytes([message[0], message[1], message[2], message[3]]),
            request_id: i32::from_le_bytes([message[4], message[5], message[6], message[7]]),
            response_to: i32::from_le_bytes([message[8], message[9], message[10], message[11]]),
            op_code: u32::from_le_bytes([message[12], message[13], message[14], message[15]]),
        })
    }

    /// Whether this message is a request
    pub fn is_request(&self) -> bool {
        self.response_to == 0
    }

    /// The opcode, if it is one of the known set
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u32(self.op_code)
    }
}

impl fmt::Display for WireHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode() {
            Some(op) => write!(
                f,
                "{} length={} requestId={} responseTo={}",
                op, self.message_length, self.request_id, self.response_to
            ),
            None => write!(
                f,
                "opcode({}) length={} requestId={} responseTo={}",
                self.op_code, self.message_length, self.request_id, self.response_to
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_header(length: i32, request_id: i32, response_to: i32, op_code: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WIRE_HEADER_LEN);
        buf.extend_from_slice(&length.to_le_bytes());
        buf.extend_from_slice(&request_id.to_le_bytes());
        buf.extend_from_slice(&response_to.to_le_bytes());
        buf.extend_from_slice(&op_code.to_le_bytes());
        buf
    }

    #[test]
    fn test_parse_header() {
        let bytes = build_header(16, 100, 0, 2013);
        let header = WireHeader::parse(&bytes).unwrap();
        assert_eq!(header.message_length, 16);
        assert_eq!(header.request_id, 100);
        assert_eq!(header.response_to, 0);
        assert_eq!(header.op_code, 2013);
        assert!(header.is_request());
        assert_eq!(header.opcode(), Some(OpCode::Msg));
    }

    #[test]
    fn test_parse_response_header() {
        let bytes = build_header(16, 200, 100, 1);
        let header = WireHeader::parse(&bytes).unwrap();
        assert!(!header.is_request());
        assert_eq!(header.opcode(), Some(OpCode::Reply));
    }

    #[test]
    fn test_parse_short_slice() {
        assert!(WireHeader::parse(&[0u8; 15]).is_none());
        assert!(WireHeader::parse(&[]).is_none());
    }

    #[test]
    fn test_opcode_roundtrip() {
        for code in [1u32, 2001, 2002, 2004, 2005, 2006, 2007, 2012, 2013] {
            let op = OpCode::from_u32(code).unwrap();
            assert_eq!(op.as_u32(), code);
        }
        assert!(OpCode::from_u32(0).is_none());
        assert!(OpCode::from_u32(2010).is_none());
    }

    #[test]
    fn test_legacy_classification() {
        assert!(OpCode::Reply.is_legacy());
        assert!(OpCode::Query.is_legacy());
        assert!(OpCode::Insert.is_legacy());
        assert!(OpCode::Update.is_legacy());
        assert!(OpCode::Delete.is_legacy());
        assert!(OpCode::GetMore.is_legacy());
        assert!(OpCode::KillCursors.is_legacy());
        assert!(!OpCode::Msg.is_legacy());
        assert!(!OpCode::Compressed.is_legacy());
    }

    #[test]
    fn test_display() {
        assert_eq!(OpCode::Msg.to_string(), "OP_MSG");
        assert_eq!(OpCode::Compressed.to_string(), "OP_COMPRESSED");
    }
}
