//! Shared builders for integration tests: recording frames and OP_MSG wire
//! messages, assembled byte-by-byte the way the server writes them.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use bson::Document;

/// Encode one recording frame from raw parts
pub fn build_frame(
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

/// Build a complete OP_MSG wire message carrying `body` as its section-0
/// document
pub fn build_op_msg(request_id: i32, response_to: i32, body: &Document) -> Vec<u8> {
    let mut doc_bytes = Vec::new();
    body.to_writer(&mut doc_bytes).unwrap();

    let total = 16 + 4 + 1 + doc_bytes.len();
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&(total as i32).to_le_bytes());
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.extend_from_slice(&response_to.to_le_bytes());
    buf.extend_from_slice(&2013u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flag bits
    buf.push(0); // section kind 0: body
    buf.extend_from_slice(&doc_bytes);
    buf
}

/// Build a bare 16-byte wire message with the given opcode
pub fn bare_wire_header(op_code: u32, request_id: i32, response_to: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    buf.extend_from_slice(&16i32.to_le_bytes());
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.extend_from_slice(&response_to.to_le_bytes());
    buf.extend_from_slice(&op_code.to_le_bytes());
    buf
}

/// Write frames into `<dir>/<name>` and return the path
pub fn write_recording(dir: &Path, name: &str, frames: &[Vec<u8>]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for frame in frames {
        file.write_all(frame).unwrap();
    }
    path
}
