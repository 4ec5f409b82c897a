//! Wall-clock timestamps as recorded in transcripts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch, as a float.
///
/// `Display` prints the shortest representation that parses back to the
/// identical value, so a timestamp written to a transcript and read back
/// during replay compares equal to the original.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Create a timestamp from seconds since the epoch.
    pub const fn from_secs(secs: f64) -> Self {
        Timestamp(secs)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Timestamp::from(Utc::now())
    }

    /// Seconds since the epoch.
    pub const fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `earlier` is later).
    pub fn secs_since(self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }

    /// Timestamp shifted back by `secs`.
    pub fn minus_secs(self, secs: f64) -> Timestamp {
        Timestamp(self.0 - secs)
    }

    /// Total order, usable for sorting merged transcripts.
    pub fn total_cmp(&self, other: &Timestamp) -> Ordering {
        self.0.total_cmp(&other.0)
    }

    /// Convert to a chrono date-time, if representable.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let secs = self.0.floor();
        let nanos = ((self.0 - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp(value.timestamp_micros() as f64 / 1_000_000.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a timestamp token is not a finite float.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTimestamp(pub String);

impl fmt::Display for InvalidTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timestamp {:?}", self.0)
    }
}

impl std::error::Error for InvalidTimestamp {}

impl FromStr for Timestamp {
    type Err = InvalidTimestamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<f64>() {
            Ok(secs) if secs.is_finite() => Ok(Timestamp(secs)),
            _ => Err(InvalidTimestamp(s.to_string())),
        }
    }
}
