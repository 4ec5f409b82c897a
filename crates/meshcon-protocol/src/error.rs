//! Error types for the gateway line protocol.

use thiserror::Error;

/// Errors that can occur when decoding gateway or console lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The line had no tokens at all.
    #[error("empty message")]
    Empty,

    /// Leading tag is neither `sta` nor `rep`.
    #[error("unexpected message from gateway: {0:?}")]
    UnexpectedTag(String),

    /// Status op is not one we know how to aggregate.
    #[error("unknown status op: {0:?}")]
    UnknownStatus(String),

    /// A required field is missing.
    #[error("{op}: missing field `{field}`")]
    MissingField {
        /// Status op or command being decoded.
        op: &'static str,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field could not be converted to its numeric type.
    #[error("{op}: invalid {field} {value:?}")]
    InvalidField {
        /// Status op or command being decoded.
        op: &'static str,
        /// Name of the offending field.
        field: &'static str,
        /// Raw token as received.
        value: String,
    },

    /// Tokens left over after all fields were decoded.
    #[error("{op}: unexpected trailing input {rest:?}")]
    TrailingInput {
        /// Status op being decoded.
        op: &'static str,
        /// The unconsumed remainder.
        rest: String,
    },

    /// Malformed local console command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Line grew past the maximum length without a terminator.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
