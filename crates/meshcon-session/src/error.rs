//! Session error types.

use std::path::PathBuf;

use meshcon_protocol::ProtocolError;
use meshcon_telemetry::TelemetryError;
use thiserror::Error;

/// Outcome of a request that did not produce a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CorrelatorError {
    /// Another request is still waiting for its reply.
    #[error("another request is still pending")]
    Busy,

    /// The gateway did not reply in time.
    #[error("no reply from gateway")]
    NoReply,

    /// The engine or the transport has shut down.
    #[error("session closed")]
    Closed,
}

/// Result type alias for correlated requests.
pub type CorrelatorResult<T> = Result<T, CorrelatorError>;

/// Errors raised by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// I/O failure on a transcript or the transport.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration is structurally valid but unusable.
    #[error("invalid config: {0}")]
    Config(String),

    /// A transcript line could not be read back.
    #[error("{path}:{line}: {reason}")]
    Transcript {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// An operator line or reply did not follow the protocol grammar.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Telemetry configuration was rejected.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A request did not complete.
    #[error(transparent)]
    Correlator(#[from] CorrelatorError),

    /// Notification delivery failed.
    #[error("notification delivery failed: {0}")]
    Notify(#[from] reqwest::Error),
}

impl SessionError {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SessionError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
