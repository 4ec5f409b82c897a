//! Runner error types.

use meshcon_session::SessionError;
use thiserror::Error;

/// Errors that end a runner command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The line editor could not be started or failed while reading.
    #[error("console: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    /// A command-line argument was unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for runner commands.
pub type RunnerResult<T> = Result<T, RunnerError>;
