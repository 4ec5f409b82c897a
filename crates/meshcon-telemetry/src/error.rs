//! Telemetry error types.

use meshcon_protocol::NodeAddress;
use thiserror::Error;

/// Errors raised by node table operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// Administrative command names a node that is not in the table.
    #[error("unknown address {0}")]
    UnknownAddress(NodeAddress),

    /// Telemetry configuration is out of range.
    #[error("invalid telemetry config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
