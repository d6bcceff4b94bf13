//! Frame encoder for recording output.
//!
//! The filter's output must be bit-identical in framing to its input:
//! identical field widths and encoding, metadata and message bytes copied
//! verbatim. Only `size` is recomputed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{MongotapError, Result};

use super::packet::Packet;

/// Writer producing the same binary frame format the server records
pub struct RecordingWriter<W: Write> {
    writer: W,
    packets_written: u64,
    bytes_written: u64,
}

impl RecordingWriter<BufWriter<File>> {
    /// Create a recording file, creating parent directories as needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path).map_err(|err| {
            MongotapError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to create recording {}: {err}", path.display()),
            ))
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordingWriter<W> {
    /// Wrap an arbitrary byte sink
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            packets_written: 0,
            bytes_written: 0,
        }
    }

    /// Append one packet in the binary frame format
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let size = packet.encoded_size();
        self.writer.write_all(&size.to_le_bytes())?;
        self.writer.write_all(&packet.session_id.to_le_bytes())?;
        self.writer.write_all(&packet.session_metadata)?;
        self.writer.write_all(&[0])?;
        self.writer.write_all(&packet.offset_us.to_le_bytes())?;
        self.writer.write_all(&packet.order.to_le_bytes())?;
        self.writer.write_all(&packet.message)?;

        self.packets_written += 1;
        self.bytes_written += u64::from(size);
        Ok(())
    }

    /// Flush buffered frames to the sink
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Packets written so far
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Frame bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::recording::packet::tests::build_frame;

    #[test]
    fn test_write_matches_source_frame() {
        let frame = build_frame(42, b"{ remote: \"127.0.0.1:51807\" }", 9_000, 5, &[1, 2, 3, 4]);
        let packet = Packet::from_bytes(&frame).unwrap();

        let mut out = Vec::new();
        {
            let mut writer = RecordingWriter::new(&mut out);
            writer.write_packet(&packet).unwrap();
            writer.flush().unwrap();
            assert_eq!(writer.packets_written(), 1);
            assert_eq!(writer.bytes_written(), frame.len() as u64);
        }
        assert_eq!(out, frame);
    }

    #[test]
    fn test_write_preserves_non_utf8_metadata() {
        let frame = build_frame(1, &[0xFF, 0x01, b'z'], 1, 1, b"");
        let packet = Packet::from_bytes(&frame).unwrap();

        let mut out = Vec::new();
        RecordingWriter::new(&mut out).write_packet(&packet).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_size_recomputed() {
        // a packet assembled by hand, not decoded: size field starts wrong
        let packet = Packet {
            size: 9999,
            session_id: 3,
            session_metadata: Bytes::from_static(b"abc"),
            offset_us: 100,
            order: 2,
            message: Bytes::from_static(&[0u8; 32]),
        };

        let mut out = Vec::new();
        RecordingWriter::new(&mut out).write_packet(&packet).unwrap();

        assert_eq!(out.len(), 64);
        assert_eq!(u32::from_le_bytes([out[0], out[1], out[2], out[3]]), 64);

        let decoded = Packet::from_bytes(&out).unwrap();
        assert_eq!(decoded.size, 64);
        assert_eq!(decoded.session_id, 3);
    }
}
