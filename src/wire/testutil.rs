//! Shared builders for wire-message unit tests.

use bson::Document;

use super::header::{OpCode, WIRE_HEADER_LEN};

/// Build a complete OP_MSG wire message carrying `body` as its section-0
/// document.
pub(crate) fn build_op_msg(request_id: i32, response_to: i32, body: &Document) -> Vec<u8> {
    let mut doc_bytes = Vec::new();
    body.to_writer(&mut doc_bytes).unwrap();

    let total = WIRE_HEADER_LEN + 4 + 1 + doc_bytes.len();
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&(total as i32).to_le_bytes());
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.extend_from_slice(&response_to.to_le_bytes());
    buf.extend_from_slice(&OpCode::Msg.as_u32().to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flag bits
    buf.push(0); // section kind 0: body
    buf.extend_from_slice(&doc_bytes);
    buf
}

/// Build a bare 16-byte wire message with the given opcode
pub(crate) fn bare_header(op_code: u32, response_to: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(WIRE_HEADER_LEN);
    buf.extend_from_slice(&(WIRE_HEADER_LEN as i32).to_le_bytes());
    buf.extend_from_slice(&7i32.to_le_bytes());
    buf.extend_from_slice(&response_to.to_le_bytes());
    buf.extend_from_slice(&op_code.to_le_bytes());
    buf
}
