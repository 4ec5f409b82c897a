//! The `meshcon` console.
//!
//! Wires the session engine to a gateway link, an interactive line editor
//! and a periodic dashboard, and provides offline commands that work from
//! the transcripts alone.

pub mod cli;
pub mod console;
pub mod error;
pub mod history;
pub mod render;
pub mod run;

pub use cli::{Cli, Command};
pub use error::{RunnerError, RunnerResult};
