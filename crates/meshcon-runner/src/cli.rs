//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use meshcon_session::{SessionConfig, TranscriptConfig, TransportConfig, DEFAULT_BAUD};

use crate::error::RunnerResult;

/// Console for a mesh network gateway.
#[derive(Debug, Parser)]
#[command(name = "meshcon", version, about)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the transcripts (overrides the config).
    #[arg(long, global = true)]
    pub transcripts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay the transcripts, connect to the gateway and open the console
    /// (default when no subcommand is given).
    Run {
        /// Connect to a gateway UART bridged over TCP, e.g. 127.0.0.1:9000.
        #[arg(long, conflicts_with = "serial")]
        tcp: Option<String>,
        /// Open a serial device, e.g. /dev/ttyACM0.
        #[arg(long)]
        serial: Option<String>,
        /// Serial baud rate.
        #[arg(long, default_value_t = DEFAULT_BAUD)]
        baud: u32,
        /// Do not print the dashboard.
        #[arg(long)]
        no_dashboard: bool,
        /// Serve Prometheus metrics on this address.
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Rebuild the node table from the transcripts, print it and exit.
    Replay {
        /// Print the table as JSON instead of the dashboard.
        #[arg(long)]
        json: bool,
    },
    /// Export battery and friendless history of one node as CSV.
    History {
        /// Node address in hex, e.g. 000D.
        address: String,
        /// Only keep samples this many hours before the last battery report.
        #[arg(long, default_value_t = 48.0)]
        window_hours: f64,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Load the config file (or defaults) and apply global overrides.
    pub fn load_config(&self) -> RunnerResult<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if let Some(dir) = &self.transcripts {
            config.transcript = TranscriptConfig {
                dir: dir.clone(),
                ..config.transcript
            };
        }
        Ok(config)
    }
}

/// Transport chosen on the command line, if any.
pub fn transport_override(tcp: Option<&str>, serial: Option<&str>, baud: u32) -> Option<TransportConfig> {
    match (tcp, serial) {
        (Some(address), _) => Some(TransportConfig::Tcp {
            address: address.to_string(),
        }),
        (None, Some(path)) => Some(TransportConfig::Serial {
            path: path.to_string(),
            baud,
        }),
        (None, None) => None,
    }
}
