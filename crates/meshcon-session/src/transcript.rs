//! Append-only transcripts of gateway and operator traffic.
//!
//! Each line is `<unix-timestamp> <text>`. The timestamp is written with the
//! shortest representation that parses back to the same `f64`, so a replayed
//! transcript reproduces the original timestamps exactly.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use meshcon_protocol::Timestamp;
use tracing::warn;

use crate::error::{SessionError, SessionResult};

/// Which transcript an entry came from.
///
/// Ordered so that gateway traffic sorts before operator input when
/// timestamps tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    /// Line received from the gateway.
    Transport,
    /// Line typed by the operator.
    Operator,
}

impl Origin {
    /// Lowercase label, used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Transport => "transport",
            Origin::Operator => "operator",
        }
    }
}

/// One transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub timestamp: Timestamp,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(timestamp: Timestamp, text: impl Into<String>) -> Self {
        TranscriptEntry {
            timestamp,
            text: text.into(),
        }
    }

    /// Parse one stored line. The text is everything after the first space.
    pub fn parse(line: &str) -> Result<Self, String> {
        let (timestamp, text) = line
            .split_once(' ')
            .ok_or_else(|| format!("missing text after timestamp in {line:?}"))?;
        let timestamp = timestamp.parse::<Timestamp>().map_err(|e| e.to_string())?;
        Ok(TranscriptEntry::new(timestamp, text))
    }

    /// Render as a stored line, without the terminator.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.timestamp, self.text)
    }
}

/// Appends entries to one transcript file.
///
/// Every append is flushed before returning.
#[derive(Debug)]
pub struct TranscriptWriter {
    path: PathBuf,
    file: File,
}

impl TranscriptWriter {
    /// Open `path` for appending, creating it and its directory if needed.
    pub fn open(path: impl Into<PathBuf>) -> SessionResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::io(format!("creating {}", parent.display()), e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SessionError::io(format!("opening {}", path.display()), e))?;
        Ok(TranscriptWriter { path, file })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stored_line(timestamp: Timestamp, text: &str) -> String {
        let mut line = TranscriptEntry::new(timestamp, text).to_line();
        line.push('\n');
        line
    }

    fn append_error(&self, source: std::io::Error) -> SessionError {
        SessionError::io(format!("appending to {}", self.path.display()), source)
    }

    /// Append one line.
    pub fn append(&mut self, timestamp: Timestamp, text: &str) -> SessionResult<()> {
        let line = Self::stored_line(timestamp, text);
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| self.append_error(e))
    }

    /// Append one line from async code.
    ///
    /// The write runs on the blocking pool so a slow disk does not stall the
    /// runtime. The line is on disk when the future completes.
    pub async fn append_async(&mut self, timestamp: Timestamp, text: &str) -> SessionResult<()> {
        let line = Self::stored_line(timestamp, text);
        let mut file = self.file.try_clone().map_err(|e| self.append_error(e))?;
        tokio::task::spawn_blocking(move || file.write_all(line.as_bytes()).and_then(|()| file.flush()))
            .await
            .map_err(|e| self.append_error(std::io::Error::other(e)))?
            .map_err(|e| self.append_error(e))
    }
}

/// Read every entry of a transcript.
///
/// A missing file is an empty transcript. Lines that cannot be parsed are
/// reported and skipped so one damaged line does not block a restart.
pub fn read_transcript(path: impl AsRef<Path>) -> SessionResult<Vec<TranscriptEntry>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SessionError::io(format!("opening {}", path.display()), e)),
    };

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SessionError::io(format!("reading {}", path.display()), e))?;
        if line.trim().is_empty() {
            continue;
        }
        match TranscriptEntry::parse(&line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                let error = SessionError::Transcript {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason,
                };
                warn!(%error, "skipping transcript line");
            }
        }
    }
    Ok(entries)
}
