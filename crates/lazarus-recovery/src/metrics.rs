//! Batch run counters

use lazarus_domain::{PackStatus, ProvenancePack};
use serde::Serialize;
use std::time::Duration;

/// Outcome counts for one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Packs with a chosen result
    pub found: usize,

    /// Packs where every tier came up short
    pub missing: usize,

    /// Packs for sessions that failed unexpectedly
    pub error: usize,

    /// Sources consulted across all packs
    pub sources_consulted: usize,

    /// Wall-clock time of the run
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Create new empty counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one pack
    pub fn record(&mut self, pack: &ProvenancePack) {
        match pack.status {
            PackStatus::Found => self.found += 1,
            PackStatus::Missing => self.missing += 1,
            PackStatus::Error => self.error += 1,
        }
        self.sources_consulted += pack.provenance_chain.len();
    }

    /// Total packs counted
    pub fn total(&self) -> usize {
        self.found + self.missing + self.error
    }

    /// Fraction of packs with a chosen result
    pub fn found_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.found as f64 / total as f64,
        }
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        let lines = [
            "Batch Summary".to_string(),
            "=============".to_string(),
            format!("Datasets: {}", self.total()),
            format!("Found: {} ({:.0}%)", self.found, self.found_rate() * 100.0),
            format!("Missing: {}", self.missing),
            format!("Errors: {}", self.error),
            format!("Sources consulted: {}", self.sources_consulted),
            format!("Elapsed: {:.1}s", self.elapsed.as_secs_f64()),
        ];
        lines.join("\n")
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
