//! Replay of recorded traffic against a live target.
//!
//! Two strategies share one engine:
//!
//! - **raw** ([`raw::RawSender`]) writes the captured bytes verbatim over
//!   session-affine transports, preserving wire identity bit-for-bit;
//! - **command** ([`command::CommandSender`]) re-parses each OP_MSG body and
//!   re-issues it through the driver, tolerating cross-version skew.
//!
//! The [`engine::ReplayEngine`] owns filtering, pacing ([`scheduler`]),
//! session lifecycle and the outcome accounting in [`outcome`].

pub mod command;
pub mod engine;
pub mod outcome;
pub mod raw;
pub mod scheduler;

pub use command::CommandSender;
pub use engine::{ReplayConfig, ReplayEngine, ReplayMode, ReplayTarget};
pub use outcome::{CommandOutcome, RawOutcome, ReplayStats};
pub use raw::{RawConnector, RawSender, RawTransport, TcpConnector};
pub use scheduler::Scheduler;
