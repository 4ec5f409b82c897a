//! Session engine for a mesh gateway console.
//!
//! One gateway is attached over a line transport. Everything it sends and
//! everything the operator types is appended to a transcript before it is
//! processed, and the node table is rebuilt at startup by replaying those
//! transcripts through the same path live traffic takes.
//!
//! # Tasks
//!
//! - **Transport reader**: splits the byte stream into lines, logs each one
//!   and queues it for the engine.
//! - **Transport writer**: writes encoded requests to the gateway.
//! - **Engine**: the only owner of the [`NodeTable`](meshcon_telemetry::NodeTable).
//!   Classifies gateway lines, feeds the aggregator, resolves the pending
//!   request, applies administrative commands and evaluates change checks.
//! - **Notifier**: delivers change notifications off the engine's path.
//!
//! The operator front end talks to the engine through a [`CommandDispatcher`],
//! which waits for replies with a [`CorrelatorHandle`].
//!
//! # Example
//!
//! ```rust
//! use meshcon_protocol::{NodeAddress, Timestamp};
//! use meshcon_session::{ProcessingMode, SessionConfig, SessionEngine};
//!
//! let mut engine = SessionEngine::new(&SessionConfig::default());
//! engine.process_transport_line(
//!     Timestamp::from_secs(1.0),
//!     "sta battery 00AB 2 -54.0 8192",
//!     ProcessingMode::Live,
//! );
//! let node = engine.table().get(NodeAddress(0x00AB)).unwrap();
//! assert!((node.battery.value().unwrap() - 1.8).abs() < 1e-9);
//! ```

mod checker;
mod config;
mod correlator;
mod dispatcher;
mod engine;
mod error;
mod notifier;
mod replay;
mod transcript;
mod transport;

pub use checker::*;
pub use config::*;
pub use correlator::*;
pub use dispatcher::*;
pub use engine::*;
pub use error::*;
pub use notifier::*;
pub use replay::*;
pub use transcript::*;
pub use transport::*;
