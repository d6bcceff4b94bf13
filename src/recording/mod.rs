//! Traffic recording decode and encode.
//!
//! A recording directory holds one or more `.bin` files, each a
//! concatenation of framed packets produced by the server's traffic
//! recorder. This module turns those bytes into lazy [`Packet`] streams and
//! writes the identical format back out for the filter.

use std::path::Path;

use crate::error::Result;

pub mod packet;
pub mod reader;
pub mod writer;

pub use packet::{EventType, Packet, MAX_SESSION_METADATA, MIN_PACKET_SIZE};
pub use reader::{RecordingReader, RecordingSet};
pub use writer::RecordingWriter;

/// Open a packet source from a recording file or a directory of `.bin`
/// files.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn Iterator<Item = Result<Packet>> + Send>> {
    let path = path.as_ref();
    if path.is_dir() {
        Ok(Box::new(RecordingSet::open(path)?))
    } else {
        Ok(Box::new(RecordingReader::open(path)?))
    }
}
