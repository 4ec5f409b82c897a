//! Routing of operator input.
//!
//! Administrative commands are applied to the node table by the engine;
//! everything else is forwarded to the gateway as a request and the caller
//! waits for the decoded reply.

use std::fmt;

use meshcon_protocol::{ConsoleCommand, NodeAddress, ProtocolError, Reply, Timestamp};
use tracing::debug;

use crate::correlator::CorrelatorHandle;
use crate::engine::EngineHandle;
use crate::error::{SessionError, SessionResult};
use crate::transcript::TranscriptWriter;

/// Result of an administrative command, shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    Renamed { address: NodeAddress, name: String },
    UnknownAddress(NodeAddress),
    /// Removed addresses, ascending.
    Pruned(Vec<NodeAddress>),
    SessionReset,
}

impl fmt::Display for AdminOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminOutcome::Renamed { address, name } => {
                write!(f, "Set the name of node {address} to \"{name}\"")
            }
            AdminOutcome::UnknownAddress(address) => write!(f, "Error: unknown address {address}."),
            AdminOutcome::Pruned(addresses) if addresses.is_empty() => write!(f, "No nodes pruned."),
            AdminOutcome::Pruned(addresses) => {
                let lines: Vec<String> = addresses
                    .iter()
                    .map(|address| format!("Pruned node {address}."))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            AdminOutcome::SessionReset => write!(f, "Session state reset."),
        }
    }
}

/// What the operator gets back for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleResponse {
    Admin(AdminOutcome),
    Reply(Reply),
}

impl fmt::Display for ConsoleResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleResponse::Admin(outcome) => outcome.fmt(f),
            ConsoleResponse::Reply(reply) => reply.fmt(f),
        }
    }
}

/// Operator-side entry point to the engine.
pub struct CommandDispatcher {
    engine: EngineHandle,
    correlator: CorrelatorHandle,
    transcript: Option<TranscriptWriter>,
}

impl CommandDispatcher {
    pub fn new(engine: EngineHandle, correlator: CorrelatorHandle) -> Self {
        CommandDispatcher {
            engine,
            correlator,
            transcript: None,
        }
    }

    /// Record every operator line in `transcript` before acting on it.
    pub fn with_transcript(mut self, transcript: TranscriptWriter) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Log, classify and execute one operator line.
    pub async fn process_console_message(
        &mut self,
        timestamp: Timestamp,
        text: &str,
    ) -> SessionResult<ConsoleResponse> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::Protocol(ProtocolError::Empty));
        }
        if let Some(transcript) = &mut self.transcript {
            transcript.append_async(timestamp, text).await?;
        }

        match ConsoleCommand::parse(text)? {
            ConsoleCommand::Admin(command) => {
                debug!(?command, "admin command");
                let outcome = self.engine.admin(timestamp, command).await?;
                Ok(ConsoleResponse::Admin(outcome))
            }
            ConsoleCommand::Request(request) => {
                let body = self.correlator.send_and_wait(&request).await?;
                Ok(ConsoleResponse::Reply(Reply::parse(&body)?))
            }
        }
    }
}
