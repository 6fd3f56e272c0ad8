//! Recovery results - the outcome of one adapter invocation

use crate::Confidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status of a single adapter invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStatus {
    /// The source holds a candidate copy
    Found,
    /// The source answered and holds nothing matching
    NotFound,
    /// The source could not be queried
    Error,
}

impl RecoveryStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStatus::Found => "FOUND",
            RecoveryStatus::NotFound => "NOT_FOUND",
            RecoveryStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an invocation ended in ERROR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call exceeded its timeout
    Timeout,
    /// Network, DNS or non-success HTTP response
    Unreachable,
    /// The payload could not be parsed
    MalformedResponse,
    /// The dataset metadata could not be turned into a query
    InvalidRequest,
    /// The adapter itself failed unexpectedly
    Internal,
}

impl FailureKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Unreachable => "unreachable",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Internal => "internal",
        }
    }
}

/// Diagnostic attached to an ERROR result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human readable detail
    pub message: String,
}

/// Result of querying one recovery source for one dataset
///
/// Errors are data here: an adapter never propagates a failure, it returns a
/// result with status [`RecoveryStatus::Error`] so sessions can reason about
/// partial failure uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    /// Outcome
    pub status: RecoveryStatus,

    /// Id of the source that produced this result
    pub source_id: String,

    /// URL of the surviving copy, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_url: Option<String>,

    /// Source-defined match confidence
    pub confidence: Confidence,

    /// When the copy was captured / published by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<DateTime<Utc>>,

    /// Free-form source metadata (sorted for reproducible exports)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Failure detail for ERROR results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SourceFailure>,
}

impl RecoveryResult {
    /// A candidate copy was located
    pub fn found(
        source_id: impl Into<String>,
        candidate_url: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            status: RecoveryStatus::Found,
            source_id: source_id.into(),
            candidate_url: Some(candidate_url.into()),
            confidence,
            capture_date: None,
            metadata: BTreeMap::new(),
            failure: None,
        }
    }

    /// The source answered without a match
    pub fn not_found(source_id: impl Into<String>) -> Self {
        Self {
            status: RecoveryStatus::NotFound,
            source_id: source_id.into(),
            candidate_url: None,
            confidence: Confidence::ZERO,
            capture_date: None,
            metadata: BTreeMap::new(),
            failure: None,
        }
    }

    /// The source could not be queried
    pub fn error(source_id: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: RecoveryStatus::Error,
            source_id: source_id.into(),
            candidate_url: None,
            confidence: Confidence::ZERO,
            capture_date: None,
            metadata: BTreeMap::new(),
            failure: Some(SourceFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Attach a capture date
    pub fn with_capture_date(mut self, date: DateTime<Utc>) -> Self {
        self.capture_date = Some(date);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether a candidate was located
    pub fn is_found(&self) -> bool {
        self.status == RecoveryStatus::Found
    }

    /// Whether the invocation failed
    pub fn is_error(&self) -> bool {
        self.status == RecoveryStatus::Error
    }
}
