//! Exponential moving averages.

use serde::{Deserialize, Serialize};

/// Smoothing factor used for every telemetry average.
pub const DEFAULT_EMA_ALPHA: f64 = 0.95;

/// An exponential moving average that is unset until its first sample.
///
/// `avg = alpha * avg + (1 - alpha) * sample`; the first sample is taken
/// as-is. Once set, the average never becomes unset again.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ema(Option<f64>);

impl Ema {
    /// An average with no samples yet.
    pub const fn new() -> Self {
        Ema(None)
    }

    /// Current value, `None` until the first sample.
    pub fn value(&self) -> Option<f64> {
        self.0
    }

    /// Fold in one sample and return the new average.
    pub fn update(&mut self, sample: f64, alpha: f64) -> f64 {
        let next = match self.0 {
            None => sample,
            Some(avg) => alpha * avg + (1.0 - alpha) * sample,
        };
        self.0 = Some(next);
        next
    }
}
