//! Semantic replay through the driver's command interface.
//!
//! Command mode trades bit-exact fidelity for tolerance: re-issuing the
//! parsed command lets the driver handle wire framing, so the target may be
//! a different topology or version than the capture source.

use std::time::Duration;

use bson::{doc, Bson, Document};
use mongodb::Client;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{MongotapError, Result};
use crate::wire::Command;

use super::outcome::CommandOutcome;

/// Issues extracted commands against a target database
pub struct CommandSender {
    client: Client,
    timeout: Option<Duration>,
}

impl CommandSender {
    /// Connect to the target and verify it answers
    pub async fn connect(uri: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        info!(uri = %uri, "connected for command replay");
        Ok(Self { client, timeout })
    }

    /// Send one command. Failures are reported in the outcome, not raised.
    pub async fn send(&self, command: &Command) -> CommandOutcome {
        let started = Instant::now();
        let database = self.client.database(&command.database);
        let run = database.run_command(command.document.clone());

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    return CommandOutcome {
                        success: false,
                        database: command.database.clone(),
                        name: command.name.clone(),
                        duration: started.elapsed(),
                        response: None,
                        error: Some(MongotapError::Timeout(limit).to_string()),
                    };
                }
            },
            None => run.await,
        };

        match result {
            Ok(response) => {
                let success = response_ok(&response);
                if !success {
                    debug!(
                        database = %command.database,
                        command = %command.name,
                        "server answered ok != 1"
                    );
                }
                CommandOutcome {
                    success,
                    database: command.database.clone(),
                    name: command.name.clone(),
                    duration: started.elapsed(),
                    response: Some(response),
                    error: if success {
                        None
                    } else {
                        Some(
                            MongotapError::CommandFailed {
                                database: command.database.clone(),
                                name: command.name.clone(),
                            }
                            .to_string(),
                        )
                    },
                }
            }
            Err(err) => CommandOutcome {
                success: false,
                database: command.database.clone(),
                name: command.name.clone(),
                duration: started.elapsed(),
                response: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Whether a response document reports success.
///
/// The server encodes `ok` as an integer or a double depending on path.
pub fn response_ok(response: &Document) -> bool {
    match response.get("ok") {
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Double(v)) => *v == 1.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_ok_encodings() {
        assert!(response_ok(&doc! { "ok": 1i32 }));
        assert!(response_ok(&doc! { "ok": 1i64 }));
        assert!(response_ok(&doc! { "ok": 1.0 }));
        assert!(!response_ok(&doc! { "ok": 0i32 }));
        assert!(!response_ok(&doc! { "ok": 0.0 }));
        assert!(!response_ok(&doc! { "ok": "1" }));
        assert!(!response_ok(&doc! { "n": 1 }));
        assert!(!response_ok(&doc! {}));
    }
}
