#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # mongotap
//!
//! Replay, filter and analyze MongoDB wire-protocol traffic recordings.
//!
//! The server's traffic recorder writes `.bin` files of framed packets,
//! each carrying one wire-protocol message annotated with session and
//! timing metadata. mongotap consumes those captures and can:
//!
//! - **replay** them against a live server, byte-exact or semantically;
//! - **filter** a recording into a smaller equivalent one;
//! - **analyze** sessions, opcodes, commands and timing;
//! - **generate** an executable `mongosh` script from the traffic.
//!
//! ## Library Usage
//!
//! ```no_run
//! use mongotap::filter::{self, FilterConfig};
//! use mongotap::recording::{open_source, RecordingWriter};
//!
//! fn main() -> mongotap::Result<()> {
//!     let source = open_source("./recording")?;
//!     let mut writer = RecordingWriter::create("./filtered.bin")?;
//!     let config = FilterConfig {
//!         requests_only: true,
//!         user_ops_smart: true,
//!         ..Default::default()
//!     };
//!     let stats = filter::run(source, &mut writer, &config)?;
//!     println!("kept {} of {} packets", stats.output_packets, stats.input_packets);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`recording`]: streaming frame decoder and encoder for `.bin` captures
//! - [`wire`]: wire-message inspection, classification and command
//!   extraction
//! - [`filter`]: predicate-driven recording rewrite
//! - [`replay`]: raw and command replay with capture-faithful pacing
//! - [`script`]: `mongosh` script generation
//! - [`analyze`]: recording statistics
//! - [`config`]: CLI arguments and defaults
//! - [`error`]: error types and the crate [`Result`] alias

pub mod analyze;
pub mod config;
pub mod error;
pub mod filter;
pub mod recording;
pub mod replay;
pub mod script;
pub mod wire;

pub use error::{MongotapError, Result};
pub use recording::{Packet, RecordingReader, RecordingSet, RecordingWriter};
pub use replay::{ReplayConfig, ReplayEngine, ReplayMode, ReplayStats, ReplayTarget};
pub use wire::{Command, OpCode, WireHeader};
