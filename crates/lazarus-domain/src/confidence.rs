//! Confidence score of a candidate match

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Match confidence in [0.0, 1.0]
///
/// Each source decides what its scores mean. The orchestrator only compares
/// them and checks them against thresholds, so the type is totally ordered:
/// out-of-range inputs are clamped and NaN becomes 0.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// No confidence at all
    pub const ZERO: Confidence = Confidence(0.0);

    /// Certain match
    pub const CERTAIN: Confidence = Confidence(1.0);

    /// Create a confidence score, clamping into [0, 1]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Get the raw score
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Check whether the score reaches a threshold (inclusive)
    pub fn meets(&self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl PartialEq for Confidence {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Confidence {}

impl PartialOrd for Confidence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Confidence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
