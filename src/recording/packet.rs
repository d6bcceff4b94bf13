//! The decoded unit of a traffic recording.
//!
//! Binary frame layout, all integers little-endian:
//!
//! ```text
//! size     : u32      total packet size, including these 4 bytes
//! id       : u64      session/connection identifier
//! session  : bytes    metadata up to and including a 0x00 terminator
//! offset   : u64      microseconds since recording start
//! order    : u64      sequence number
//! message  : bytes    wire-protocol message (may be empty)
//! ```
//!
//! There is no event-type field in the frame. Empty-message packets mark
//! session boundaries, but decode cannot tell start from end; consumers that
//! need the distinction track per-session first/last order numbers.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;

use bytes::Bytes;

use crate::error::{MongotapError, Result};
use crate::wire::{classify, inspect, CommandCategory};

/// Minimum frame size: 4 (size) + 8 (id) + 1 (null) + 8 (offset) + 8 (order)
pub const MIN_PACKET_SIZE: u32 = 29;

/// Safety cap on session metadata, to stop runaway reads on corrupt input
pub const MAX_SESSION_METADATA: usize = 10 * 1024;

/// Event type of a packet, inferred rather than stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Regular,
    SessionStart,
    SessionEnd,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Regular => "Regular",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
        };
        f.write_str(name)
    }
}

/// A single decoded packet from a traffic recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Total packet size including the frame header, as stored
    pub size: u32,

    /// Server-assigned connection identifier
    pub session_id: u64,

    /// Connection endpoint descriptor, preserved verbatim.
    ///
    /// Usually JSON-ish text like `{ remote: "127.0.0.1:51807", ... }`, but
    /// the format is opaque and UTF-8 is not enforced.
    pub session_metadata: Bytes,

    /// Microseconds since recording start
    pub offset_us: u64,

    /// Monotonic sequence number
    pub order: u64,

    /// Raw wire-protocol message, starting with its 16-byte header.
    /// Empty for session events.
    pub message: Bytes,
}

impl Packet {
    /// Read one packet from a byte source.
    ///
    /// Returns `Ok(None)` on clean EOF at a frame boundary; EOF inside a
    /// frame is a [`MongotapError::Truncated`] error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let size = match read_u32_or_eof(reader)? {
            Some(size) => size,
            None => return Ok(None),
        };
        if size < MIN_PACKET_SIZE {
            return Err(MongotapError::bad_frame(format!(
                "packet size {size} below minimum {MIN_PACKET_SIZE}"
            )));
        }

        let session_id = u64::from_le_bytes(read_field(reader, "session id")?);

        let mut session_metadata = Vec::with_capacity(128);
        loop {
            let [byte] = read_field::<R, 1>(reader, "session metadata")?;
            if byte == 0 {
                break;
            }
            session_metadata.push(byte);
            if session_metadata.len() > MAX_SESSION_METADATA {
                return Err(MongotapError::MetadataOverflow(MAX_SESSION_METADATA));
            }
        }

        let offset_us = u64::from_le_bytes(read_field(reader, "offset")?);
        let order = u64::from_le_bytes(read_field(reader, "order")?);

        let header_len = 4 + 8 + session_metadata.len() + 1 + 8 + 8;
        let Some(message_len) = (size as usize).checked_sub(header_len) else {
            return Err(MongotapError::bad_frame(format!(
                "packet size {size} shorter than its {header_len}-byte header"
            )));
        };

        let message = if message_len > 0 {
            let mut buf = vec![0u8; message_len];
            reader.read_exact(&mut buf).map_err(|err| {
                if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    MongotapError::truncated(format!(
                        "EOF inside a {message_len}-byte message body"
                    ))
                } else {
                    MongotapError::Io(err)
                }
            })?;
            Bytes::from(buf)
        } else {
            Bytes::new()
        };

        Ok(Some(Self {
            size,
            session_id,
            session_metadata: Bytes::from(session_metadata),
            offset_us,
            order,
            message,
        }))
    }

    /// Decode a packet from an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = data;
        match Self::read_from(&mut cursor)? {
            Some(packet) => Ok(packet),
            None => Err(MongotapError::truncated("empty packet buffer")),
        }
    }

    /// Event type as far as decode can tell.
    ///
    /// The frame carries no event tag, so every packet decodes as
    /// `Regular`; see the module docs for how consumers split session
    /// start from end.
    pub fn event_type(&self) -> EventType {
        EventType::Regular
    }

    /// Whether this packet marks a session boundary (no wire message)
    pub fn is_session_event(&self) -> bool {
        self.message.is_empty()
    }

    /// Session metadata as text, with invalid UTF-8 replaced
    pub fn metadata_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.session_metadata)
    }

    /// The frame size this packet encodes to, recomputed from its fields
    pub fn encoded_size(&self) -> u32 {
        (4 + 8 + self.session_metadata.len() + 1 + 8 + 8 + self.message.len()) as u32
    }

    /// Wire-protocol opcode, or 0 for session events and short messages
    pub fn opcode(&self) -> u32 {
        inspect::opcode(&self.message)
    }

    /// Whether the message is a request (`response_to == 0`)
    pub fn is_request(&self) -> bool {
        inspect::is_request(&self.message)
    }

    /// Command name of an OP_MSG message
    pub fn command_name(&self) -> Option<&str> {
        inspect::command_name(&self.message)
    }

    /// Target database of an OP_MSG message
    pub fn database(&self) -> Option<&str> {
        inspect::database(&self.message)
    }

    /// Target collection, when the command's first value names one
    pub fn collection(&self) -> Option<&str> {
        inspect::collection(&self.message)
    }

    /// Category of the carried command
    pub fn category(&self) -> CommandCategory {
        inspect::category(&self.message)
    }

    /// Whether this packet is internal cluster chatter (by command name)
    pub fn is_internal_operation(&self) -> bool {
        classify::is_internal_operation(&self.message)
    }

    /// Whether this packet is a user command (simple name-based check)
    pub fn is_user_operation(&self) -> bool {
        classify::is_user_operation(&self.message)
    }

    /// Whether this packet is likely application traffic (context-aware)
    pub fn is_likely_user_operation(&self) -> bool {
        classify::is_likely_user_operation(&self.message)
    }
}

/// Read a 4-byte size prefix, distinguishing clean EOF (no bytes at all)
/// from a torn frame.
fn read_u32_or_eof<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(MongotapError::truncated("EOF inside a size prefix"));
        }
        filled += n;
    }
    Ok(Some(u32::from_le_bytes(buf)))
}

fn read_field<R: Read, const N: usize>(reader: &mut R, field: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            MongotapError::truncated(format!("EOF reading {field}"))
        } else {
            MongotapError::Io(err)
        }
    })?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a packet frame from raw parts, as the server writes it
    pub(crate) fn build_frame(
        session_id: u64,
        session_metadata: &[u8],
        offset_us: u64,
        order: u64,
        message: &[u8],
    ) -> Vec<u8> {
        let total = 4 + 8 + session_metadata.len() + 1 + 8 + 8 + message.len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&session_id.to_le_bytes());
        buf.extend_from_slice(session_metadata);
        buf.push(0);
        buf.extend_from_slice(&offset_us.to_le_bytes());
        buf.extend_from_slice(&order.to_le_bytes());
        buf.extend_from_slice(message);
        buf
    }

    #[test]
    fn test_decode_empty_message() {
        let data = build_frame(12345, b"", 1_000_000, 1, b"");
        let packet = Packet::from_bytes(&data).unwrap();

        assert_eq!(packet.session_id, 12345);
        assert_eq!(packet.offset_us, 1_000_000);
        assert_eq!(packet.order, 1);
        assert!(packet.message.is_empty());
        assert!(packet.is_session_event());
        assert_eq!(packet.event_type(), EventType::Regular);
        assert_eq!(packet.size, 29);
    }

    #[test]
    fn test_decode_size_accounting() {
        // metadata "abc" (4 bytes with null), 32-byte message:
        // 4 + 8 + 4 + 8 + 8 + 32 = 64
        let message: Vec<u8> = (0u8..0x20).collect();
        let data = build_frame(7, b"abc", 500, 3, &message);
        assert_eq!(data.len(), 64);

        let packet = Packet::from_bytes(&data).unwrap();
        assert_eq!(packet.size, 64);
        assert_eq!(packet.session_id, 7);
        assert_eq!(packet.session_metadata.as_ref(), b"abc");
        assert_eq!(packet.metadata_str(), "abc");
        assert_eq!(packet.offset_us, 500);
        assert_eq!(packet.order, 3);
        assert_eq!(packet.message.as_ref(), message.as_slice());
        assert_eq!(packet.encoded_size(), 64);
    }

    #[test]
    fn test_decode_rejects_small_size() {
        let mut data = build_frame(1, b"", 0, 1, b"");
        data[0..4].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(MongotapError::BadFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_size_below_header() {
        // size says 30 but the metadata alone pushes the header past it
        let mut data = build_frame(1, b"0123456789", 0, 1, b"");
        data[0..4].copy_from_slice(&30u32.to_le_bytes());
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(MongotapError::BadFrame(_))
        ));
    }

    #[test]
    fn test_decode_truncated_message() {
        let mut data = build_frame(1, b"meta", 0, 1, &[0xAA; 40]);
        data.truncate(data.len() - 10);
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(MongotapError::Truncated(_))
        ));
    }

    #[test]
    fn test_decode_truncated_header() {
        let data = build_frame(1, b"meta", 0, 1, b"");
        assert!(matches!(
            Packet::from_bytes(&data[..9]),
            Err(MongotapError::Truncated(_))
        ));
    }

    #[test]
    fn test_decode_metadata_overflow() {
        let huge = vec![b'x'; MAX_SESSION_METADATA + 10];
        let data = build_frame(1, &huge, 0, 1, b"");
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(MongotapError::MetadataOverflow(_))
        ));
    }

    #[test]
    fn test_clean_eof_returns_none() {
        let mut empty: &[u8] = b"";
        assert!(Packet::read_from(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_sequential_decode() {
        let mut data = build_frame(1, b"a", 10, 1, b"");
        data.extend_from_slice(&build_frame(2, b"b", 20, 2, b""));

        let mut cursor = data.as_slice();
        let first = Packet::read_from(&mut cursor).unwrap().unwrap();
        let second = Packet::read_from(&mut cursor).unwrap().unwrap();
        assert!(Packet::read_from(&mut cursor).unwrap().is_none());

        assert_eq!(first.session_id, 1);
        assert_eq!(second.session_id, 2);
        assert_eq!(second.offset_us, 20);
    }

    #[test]
    fn test_non_utf8_metadata_preserved() {
        let metadata = [0xFFu8, 0xFE, b'x'];
        let data = build_frame(9, &metadata, 0, 1, b"");
        let packet = Packet::from_bytes(&data).unwrap();
        assert_eq!(packet.session_metadata.as_ref(), &metadata);
        assert!(packet.metadata_str().contains('x'));
    }
}
