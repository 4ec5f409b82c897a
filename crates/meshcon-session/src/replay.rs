//! Merging transcripts into one replay order.

use std::cmp::Ordering;

use crate::config::TranscriptConfig;
use crate::error::SessionResult;
use crate::transcript::{read_transcript, Origin, TranscriptEntry};

/// A transcript entry tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    pub origin: Origin,
    /// One-based position within its own transcript.
    pub line_number: usize,
    pub entry: TranscriptEntry,
}

impl ReplayEntry {
    fn replay_order(&self, other: &ReplayEntry) -> Ordering {
        self.entry
            .timestamp
            .total_cmp(&other.entry.timestamp)
            .then(self.origin.cmp(&other.origin))
            .then(self.line_number.cmp(&other.line_number))
    }
}

/// Merge both transcripts by timestamp.
///
/// Ties go to gateway traffic first, then to the earlier line.
pub fn merge_transcripts(
    transport: Vec<TranscriptEntry>,
    operator: Vec<TranscriptEntry>,
) -> Vec<ReplayEntry> {
    let tag = |origin: Origin| {
        move |(index, entry): (usize, TranscriptEntry)| ReplayEntry {
            origin,
            line_number: index + 1,
            entry,
        }
    };

    let mut merged: Vec<ReplayEntry> = transport
        .into_iter()
        .enumerate()
        .map(tag(Origin::Transport))
        .chain(operator.into_iter().enumerate().map(tag(Origin::Operator)))
        .collect();
    merged.sort_by(ReplayEntry::replay_order);
    merged
}

/// Read and merge the transcripts named by `config`.
pub fn load_replay(config: &TranscriptConfig) -> SessionResult<Vec<ReplayEntry>> {
    let transport = read_transcript(config.transport_path())?;
    let operator = read_transcript(config.operator_path())?;
    Ok(merge_transcripts(transport, operator))
}
