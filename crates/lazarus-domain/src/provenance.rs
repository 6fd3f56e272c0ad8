//! Provenance packs and the assembler that builds them
//!
//! A recovery session hands the assembler every source attempt it made, in
//! whatever order the concurrent calls finished. The assembler restores the
//! configured (tier, declared order) sequence, derives the provenance chain,
//! and selects the best result. It is a pure function: identical inputs
//! always produce identical packs.

use crate::{Confidence, DatasetMetadata, RecoveryResult, RecoveryStatus, Tier};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Overall outcome of one dataset's search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackStatus {
    /// A candidate met the minimum confidence threshold
    Found,
    /// Every tier was searched and nothing met the threshold
    Missing,
    /// The search itself failed unexpectedly
    Error,
}

impl PackStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PackStatus::Found => "FOUND",
            PackStatus::Missing => "MISSING",
            PackStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for PackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a chained source ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Returned a candidate
    Found,
    /// Answered without a candidate
    NotFound,
    /// Failed (timeout, unreachable, malformed payload)
    Error,
    /// Invoked, then cancelled by an early stop
    Cancelled,
}

impl From<RecoveryStatus> for LinkOutcome {
    fn from(status: RecoveryStatus) -> Self {
        match status {
            RecoveryStatus::Found => LinkOutcome::Found,
            RecoveryStatus::NotFound => LinkOutcome::NotFound,
            RecoveryStatus::Error => LinkOutcome::Error,
        }
    }
}

/// One entry of the provenance chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Source id
    pub source_id: String,
    /// Source display name
    pub source_name: String,
    /// Tier the source was searched in
    pub tier: Tier,
    /// How the invocation ended
    pub outcome: LinkOutcome,
}

/// A source invocation as recorded by a session
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttempt {
    /// Source id
    pub source_id: String,
    /// Source display name
    pub source_name: String,
    /// Source tier
    pub tier: Tier,
    /// Declaration order of the source within the configuration
    pub order: usize,
    /// The result, or `None` when the call was cancelled before finishing
    pub result: Option<RecoveryResult>,
}

/// Thresholds the assembler applies when choosing a result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    /// Results below this confidence are kept but never surfaced as found
    pub min_confidence: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self { min_confidence: 0.5 }
    }
}

/// The complete, exportable result of one dataset's recovery search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenancePack {
    /// The dataset that was searched for
    pub dataset: DatasetMetadata,

    /// Results actually obtained, in (tier, declared order)
    pub results: Vec<RecoveryResult>,

    /// Every source actually invoked, in (tier, declared order)
    pub provenance_chain: Vec<ChainLink>,

    /// Best result meeting the minimum confidence, if any
    pub chosen: Option<RecoveryResult>,

    /// Overall outcome
    pub status: PackStatus,

    /// Diagnostic for ERROR packs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ProvenancePack {
    /// Assemble a pack from the attempts of a finished session
    ///
    /// Attempt order does not matter; the chain is rebuilt from tier and
    /// declaration order. Selection prefers the highest confidence, then the
    /// lower tier, then the earliest capture date (undated results last).
    pub fn assemble(
        dataset: DatasetMetadata,
        mut attempts: Vec<SourceAttempt>,
        policy: &SelectionPolicy,
    ) -> Self {
        attempts.sort_by(|a, b| (a.tier, a.order).cmp(&(b.tier, b.order)));

        let provenance_chain = attempts
            .iter()
            .map(|attempt| ChainLink {
                source_id: attempt.source_id.clone(),
                source_name: attempt.source_name.clone(),
                tier: attempt.tier,
                outcome: attempt
                    .result
                    .as_ref()
                    .map(|r| LinkOutcome::from(r.status))
                    .unwrap_or(LinkOutcome::Cancelled),
            })
            .collect();

        let best = attempts
            .iter()
            .filter_map(|attempt| attempt.result.as_ref().map(|r| (attempt.tier, r)))
            .filter(|(_, result)| result.is_found())
            .fold(None::<(Tier, &RecoveryResult)>, |best, candidate| match best {
                Some(current) if compare_candidates(&current, &candidate) != Ordering::Less => {
                    Some(current)
                }
                _ => Some(candidate),
            })
            .map(|(_, result)| result.clone());

        let chosen = best.filter(|result| result.confidence.meets(policy.min_confidence));
        let status = if chosen.is_some() {
            PackStatus::Found
        } else {
            PackStatus::Missing
        };

        let results = attempts.into_iter().filter_map(|a| a.result).collect();

        Self {
            dataset,
            results,
            provenance_chain,
            chosen,
            status,
            diagnostic: None,
        }
    }

    /// Build the pack for a search that failed unexpectedly
    pub fn failed(dataset: DatasetMetadata, diagnostic: impl Into<String>) -> Self {
        Self {
            dataset,
            results: Vec::new(),
            provenance_chain: Vec::new(),
            chosen: None,
            status: PackStatus::Error,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// Source names in chain order
    pub fn chain_names(&self) -> Vec<&str> {
        self.provenance_chain
            .iter()
            .map(|link| link.source_name.as_str())
            .collect()
    }

    /// Source ids in chain order
    pub fn chain_ids(&self) -> Vec<&str> {
        self.provenance_chain
            .iter()
            .map(|link| link.source_id.as_str())
            .collect()
    }

    /// Confidence of the chosen result, if any
    pub fn chosen_confidence(&self) -> Option<Confidence> {
        self.chosen.as_ref().map(|r| r.confidence)
    }

    /// Whether every invoked source failed
    pub fn all_sources_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(RecoveryResult::is_error)
    }
}

/// `Greater` when `a` is the better candidate
fn compare_candidates(a: &(Tier, &RecoveryResult), b: &(Tier, &RecoveryResult)) -> Ordering {
    a.1.confidence
        .cmp(&b.1.confidence)
        .then_with(|| b.0.cmp(&a.0))
        .then_with(|| match (a.1.capture_date, b.1.capture_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        })
}
