//! Raw wire replay: captured bytes written verbatim to the target.
//!
//! Raw mode must preserve wire identity bit-for-bit, so the driver is used
//! only for what it is good at (URI parsing, topology discovery and the
//! writable-server check) while the actual writes go over plain transports
//! this module owns. The transport seam is a trait so tests can substitute
//! an in-memory implementation.
//!
//! Packets sharing a `session_id` are routed over the same transport for
//! the life of the session, preserving server-side session state.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{MongotapError, Result};
use crate::wire::{WireHeader, WIRE_HEADER_LEN};

use super::outcome::RawOutcome;

/// Upper bound on one wire message, matching the server's limit
pub const MAX_MESSAGE_SIZE: usize = 48 * 1024 * 1024;

/// One connection able to carry pre-framed wire messages
#[async_trait]
pub trait RawTransport: Send {
    /// Transmit one complete wire message, exactly as framed
    async fn write_message(&mut self, message: &[u8]) -> Result<()>;

    /// Receive one complete wire message
    async fn read_message(&mut self) -> Result<Bytes>;
}

/// Factory for transports, one per recorded session
#[async_trait]
pub trait RawConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RawTransport>>;
}

/// TCP transport over a tokio stream
pub struct TcpTransport {
    stream: TcpStream,
}

#[async_trait]
impl RawTransport for TcpTransport {
    async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.stream.write_all(message).await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Bytes> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).await?;
        let total = u32::from_le_bytes(len_bytes) as usize;
        if total < WIRE_HEADER_LEN || total > MAX_MESSAGE_SIZE {
            return Err(MongotapError::malformed_wire(format!(
                "response length {total} out of range"
            )));
        }
        let mut buf = vec![0u8; total];
        buf[..4].copy_from_slice(&len_bytes);
        self.stream.read_exact(&mut buf[4..]).await?;
        Ok(Bytes::from(buf))
    }
}

/// Connector dialing a fixed `host:port` address
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl RawConnector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn RawTransport>> {
        let stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;
        debug!(address = %self.address, "opened raw transport");
        Ok(Box::new(TcpTransport { stream }))
    }
}

/// Sends captured wire messages to a target server, one transport per
/// recorded session.
pub struct RawSender {
    connector: Box<dyn RawConnector>,
    sessions: HashMap<u64, Box<dyn RawTransport>>,
    read_responses: bool,
}

impl RawSender {
    /// Connect to a target by URI.
    ///
    /// The URI is parsed by the driver (so authentication options and host
    /// lists behave as users expect) and the target is confirmed writable
    /// (standalone, replica-set primary, mongos or load balancer) before any
    /// raw transport is opened.
    pub async fn connect(uri: &str, read_responses: bool) -> Result<Self> {
        let address = resolve_writable_address(uri).await?;
        info!(address = %address, "raw replay target selected");
        Ok(Self::with_connector(
            Box::new(TcpConnector::new(address)),
            read_responses,
        ))
    }

    /// Build a sender over an arbitrary connector
    pub fn with_connector(connector: Box<dyn RawConnector>, read_responses: bool) -> Self {
        Self {
            connector,
            sessions: HashMap::new(),
            read_responses,
        }
    }

    /// Send one captured message on the session's transport.
    ///
    /// Per-packet failures are reported in the outcome, not raised: replay
    /// continues past them.
    pub async fn send(&mut self, session_id: u64, message: &[u8]) -> RawOutcome {
        let started = Instant::now();

        let Some(header) = WireHeader::parse(message) else {
            return RawOutcome::failure(
                0,
                0,
                0,
                started.elapsed(),
                MongotapError::malformed_wire("message shorter than the wire header").to_string(),
            );
        };

        if let Some(op) = header.opcode() {
            if op.is_legacy() {
                return RawOutcome::failure(
                    header.op_code,
                    header.request_id,
                    header.response_to,
                    started.elapsed(),
                    MongotapError::UnsupportedOpcode(header.op_code).to_string(),
                );
            }
        }

        if header.message_length as usize != message.len() {
            return RawOutcome::failure(
                header.op_code,
                header.request_id,
                header.response_to,
                started.elapsed(),
                MongotapError::malformed_wire(format!(
                    "header declares {} bytes, message has {}",
                    header.message_length,
                    message.len()
                ))
                .to_string(),
            );
        }

        if !self.sessions.contains_key(&session_id) {
            match self.connector.connect().await {
                Ok(transport) => {
                    debug!(session = session_id, "session transport opened");
                    self.sessions.insert(session_id, transport);
                }
                Err(err) => {
                    return RawOutcome::failure(
                        header.op_code,
                        header.request_id,
                        header.response_to,
                        started.elapsed(),
                        err.to_string(),
                    );
                }
            }
        }
        let Some(transport) = self.sessions.get_mut(&session_id) else {
            return RawOutcome::failure(
                header.op_code,
                header.request_id,
                header.response_to,
                started.elapsed(),
                "session transport unavailable".to_string(),
            );
        };

        if let Err(err) = transport.write_message(message).await {
            self.sessions.remove(&session_id);
            return RawOutcome::failure(
                header.op_code,
                header.request_id,
                header.response_to,
                started.elapsed(),
                err.to_string(),
            );
        }

        let response = if self.read_responses {
            match transport.read_message().await {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    self.sessions.remove(&session_id);
                    return RawOutcome::failure(
                        header.op_code,
                        header.request_id,
                        header.response_to,
                        started.elapsed(),
                        err.to_string(),
                    );
                }
            }
        } else {
            None
        };

        RawOutcome {
            success: true,
            op_code: header.op_code,
            request_id: header.request_id,
            response_to: header.response_to,
            duration: started.elapsed(),
            response,
            error: None,
        }
    }

    /// Release the transport held for a session
    pub fn close_session(&mut self, session_id: u64) {
        if self.sessions.remove(&session_id).is_some() {
            debug!(session = session_id, "session transport closed");
        }
    }

    /// Drop all session transports
    pub fn shutdown(&mut self) {
        let count = self.sessions.len();
        self.sessions.clear();
        if count > 0 {
            debug!(sessions = count, "raw sender shut down");
        }
    }

    /// Number of live session transports
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// Parse the URI with the driver and confirm the target accepts writes.
///
/// Returns the address the server answers on (its `hello.me`), falling back
/// to the first seed from the URI.
async fn resolve_writable_address(uri: &str) -> Result<String> {
    let options = mongodb::options::ClientOptions::parse(uri).await?;
    let client = mongodb::Client::with_options(options.clone())?;
    let hello = client
        .database("admin")
        .run_command(bson::doc! { "hello": 1 })
        .await?;

    let writable = hello.get_bool("isWritablePrimary").unwrap_or(false)
        || hello.get_str("msg").map(|m| m == "isdbgrid").unwrap_or(false);
    if !writable {
        return Err(MongotapError::config(format!(
            "target {uri} is not writable; raw replay needs a standalone, primary, mongos or load balancer"
        )));
    }

    Ok(hello
        .get_str("me")
        .ok()
        .map(str::to_string)
        .or_else(|| options.hosts.first().map(ToString::to_string))
        .unwrap_or_else(|| uri.to_string()))
}
