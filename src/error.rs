//! Error types for mongotap.
//!
//! One closed taxonomy covers the whole pipeline. Decoder errors are hard
//! (the frame they hit cannot be recovered); per-packet replay errors are
//! soft and are folded into the aggregate statistics by the caller.

use thiserror::Error;

/// Result type alias for mongotap operations
pub type Result<T> = std::result::Result<T, MongotapError>;

/// Main error type for mongotap
#[derive(Error, Debug)]
pub enum MongotapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad frame: {0}")]
    BadFrame(String),

    #[error("session metadata exceeds {0} bytes")]
    MetadataOverflow(usize),

    #[error("truncated frame: {0}")]
    Truncated(String),

    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u32),

    #[error("malformed wire message: {0}")]
    MalformedWireMessage(String),

    #[error("malformed BSON: {0}")]
    MalformedBson(String),

    #[error("message carries no command name")]
    MissingCommandName,

    #[error("message carries no $db field")]
    MissingDatabase,

    #[error("command {database}.{name} failed: ok != 1")]
    CommandFailed { database: String, name: String },

    #[error("server error: {0}")]
    Server(#[from] mongodb::error::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("replay cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl MongotapError {
    /// Create a BadFrame error from a message
    pub fn bad_frame(msg: impl Into<String>) -> Self {
        Self::BadFrame(msg.into())
    }

    /// Create a Truncated error from a message
    pub fn truncated(msg: impl Into<String>) -> Self {
        Self::Truncated(msg.into())
    }

    /// Create a MalformedWireMessage error from a message
    pub fn malformed_wire(msg: impl Into<String>) -> Self {
        Self::MalformedWireMessage(msg.into())
    }

    /// Create a MalformedBson error from a message
    pub fn malformed_bson(msg: impl Into<String>) -> Self {
        Self::MalformedBson(msg.into())
    }

    /// Create a Config error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<bson::de::Error> for MongotapError {
    fn from(err: bson::de::Error) -> Self {
        Self::MalformedBson(err.to_string())
    }
}
