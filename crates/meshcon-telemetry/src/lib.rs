//! Telemetry model for a mesh network seen through one gateway.
//!
//! The [`NodeTable`] is the in-memory, rebuildable view of every node the
//! gateway has heard from, plus the gateway's own diagnostics. It is mutated
//! only by the [`TelemetryAggregator`] (for status messages) and by the
//! administrative operations on [`NodeTable`] itself (rename, prune, session
//! reset).
//!
//! All averages are exponential moving averages ([`Ema`]) that stay unset
//! until their first sample.

mod aggregator;
mod ema;
mod error;
mod gateway;
mod node;
mod table;

pub use aggregator::*;
pub use ema::*;
pub use error::*;
pub use gateway::*;
pub use node::*;
pub use table::*;
