//! Battery and friendless history of one node, read from the gateway
//! transcript.

use std::io::Write;

use meshcon_protocol::{InboundMessage, NodeAddress, StatusMessage, Timestamp, FAULT_FRIENDLESS};
use meshcon_session::TranscriptEntry;
use meshcon_telemetry::adc_to_voltage;

use crate::error::{RunnerError, RunnerResult};

/// Which history series a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    /// Battery voltage, in volts.
    Battery,
    /// 1 when the node reported the friendless fault, else 0.
    Friendless,
}

impl Series {
    fn as_str(self) -> &'static str {
        match self {
            Series::Battery => "battery",
            Series::Friendless => "friendless",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub series: Series,
    pub value: f64,
}

/// Extract the samples for `address`.
///
/// With a window, only samples within `window_secs` before the last battery
/// report are kept. Lines that are not health or battery statuses for the
/// node are ignored.
pub fn extract_history(entries: &[TranscriptEntry], address: NodeAddress, window_secs: Option<f64>) -> Vec<Sample> {
    let mut samples: Vec<Sample> = entries
        .iter()
        .filter_map(|entry| {
            let InboundMessage::Status(status) = InboundMessage::parse(&entry.text).ok()? else {
                return None;
            };
            if status.address() != Some(address) {
                return None;
            }
            let (series, value) = match status {
                StatusMessage::Battery { raw_adc, .. } => (Series::Battery, adc_to_voltage(raw_adc)),
                StatusMessage::Health { faults, .. } => {
                    (Series::Friendless, f64::from(u8::from(faults.contains(&FAULT_FRIENDLESS))))
                }
                _ => return None,
            };
            Some(Sample {
                timestamp: entry.timestamp,
                series,
                value,
            })
        })
        .collect();

    let last_battery = samples
        .iter()
        .filter(|s| s.series == Series::Battery)
        .map(|s| s.timestamp)
        .max_by(|a, b| a.total_cmp(b));
    if let (Some(window), Some(last)) = (window_secs, last_battery) {
        let cutoff = last.minus_secs(window);
        samples.retain(|s| s.timestamp > cutoff);
    }
    samples
}

/// Write samples as `timestamp,series,value` CSV with RFC 3339 timestamps.
pub fn write_csv(samples: &[Sample], mut out: impl Write) -> RunnerResult<()> {
    let io = |e| RunnerError::Io {
        context: "writing history".into(),
        source: e,
    };
    writeln!(out, "timestamp,series,value").map_err(io)?;
    for sample in samples {
        let time = sample
            .timestamp
            .to_datetime()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| sample.timestamp.to_string());
        writeln!(out, "{time},{},{}", sample.series.as_str(), sample.value).map_err(io)?;
    }
    out.flush().map_err(io)
}
