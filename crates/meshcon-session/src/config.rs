//! Session configuration, loaded from YAML.
//!
//! Every field has a default, so an empty document is a valid config.
//!
//! # Example
//!
//! ```rust
//! use meshcon_session::{SessionConfig, TransportConfig};
//!
//! let config = SessionConfig::from_yaml_str(
//!     "transport:\n  kind: serial\n  path: /dev/ttyACM0\n",
//! )
//! .unwrap();
//! assert!(matches!(config.transport, TransportConfig::Serial { baud: 115200, .. }));
//! assert_eq!(config.session.prune_timeout_secs, 30.0);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use meshcon_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Default TCP endpoint of the gateway's UART bridge.
pub const DEFAULT_TCP_ADDRESS: &str = "127.0.0.1:9000";

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

// ============================================================================
// Sections
// ============================================================================

/// How to reach the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// A TCP socket carrying the gateway's serial stream.
    Tcp {
        #[serde(default = "default_tcp_address")]
        address: String,
    },
    /// A local serial device.
    Serial {
        path: String,
        #[serde(default = "default_baud")]
        baud: u32,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Tcp {
            address: default_tcp_address(),
        }
    }
}

fn default_tcp_address() -> String {
    DEFAULT_TCP_ADDRESS.to_string()
}

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

/// Where transcripts are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Directory holding both transcripts.
    pub dir: PathBuf,
    /// File name of the gateway transcript.
    pub transport_file: String,
    /// File name of the operator transcript.
    pub operator_file: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        TranscriptConfig {
            dir: PathBuf::from("./transcripts"),
            transport_file: "protocol_transcript".to_string(),
            operator_file: "console_transcript".to_string(),
        }
    }
}

impl TranscriptConfig {
    /// Transcripts under `dir` with the default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        TranscriptConfig {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Full path of the gateway transcript.
    pub fn transport_path(&self) -> PathBuf {
        self.dir.join(&self.transport_file)
    }

    /// Full path of the operator transcript.
    pub fn operator_path(&self) -> PathBuf {
        self.dir.join(&self.operator_file)
    }
}

/// Engine timing and queue sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Nodes silent for this long are removed by `prune`.
    pub prune_timeout_secs: f64,
    /// How long a request waits for its reply.
    pub reply_timeout_secs: f64,
    /// Dashboard refresh interval.
    pub render_interval_ms: u64,
    /// Capacity of the engine and transport queues.
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            prune_timeout_secs: 30.0,
            reply_timeout_secs: 10.0,
            render_interval_ms: 1000,
            queue_capacity: 256,
        }
    }
}

impl SessionSettings {
    /// Reply timeout as a [`Duration`].
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.reply_timeout_secs)
    }

    /// Render interval as a [`Duration`].
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

/// An open/close watch on one node's on/off state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Display name of the node to watch.
    pub node: String,
    /// What the node is attached to, used in the message text.
    pub thing: String,
    /// Notification recipient id.
    pub recipient: String,
}

/// Outbound notification delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Webhook URL. Notifications are only logged when unset.
    pub endpoint: Option<String>,
    /// Environment variable holding the access token.
    pub access_token_env: String,
    /// Notifications buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig {
            endpoint: None,
            access_token_env: "FB_ACCESS_TOKEN".to_string(),
            queue_capacity: 32,
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Complete console configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub transcript: TranscriptConfig,
    pub telemetry: TelemetryConfig,
    pub session: SessionSettings,
    pub checks: Vec<CheckConfig>,
    pub notifier: NotifierConfig,
}

impl SessionConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> SessionResult<Self> {
        let config: SessionConfig = if yaml.trim().is_empty() {
            SessionConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SessionError::io(format!("reading {}", path.display()), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> SessionResult<()> {
        self.telemetry.validate()?;

        let session = &self.session;
        if !(session.prune_timeout_secs >= 0.0) {
            return Err(SessionError::Config(format!(
                "prune_timeout_secs must be non-negative, got {}",
                session.prune_timeout_secs
            )));
        }
        if !(session.reply_timeout_secs > 0.0) || !session.reply_timeout_secs.is_finite() {
            return Err(SessionError::Config(format!(
                "reply_timeout_secs must be positive, got {}",
                session.reply_timeout_secs
            )));
        }
        if session.queue_capacity == 0 || self.notifier.queue_capacity == 0 {
            return Err(SessionError::Config("queue capacities must be non-zero".into()));
        }
        if let Some(check) = self.checks.iter().find(|c| c.node.is_empty()) {
            return Err(SessionError::Config(format!(
                "check for {:?} names no node",
                check.thing
            )));
        }
        Ok(())
    }
}
