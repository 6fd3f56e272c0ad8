//! Deterministic in-process source
//!
//! Plays back a fixed script instead of calling an archive. Lets tests
//! exercise tiers, early stop, timeouts and panic isolation without a network.

use crate::SourceAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazarus_domain::{Confidence, DatasetMetadata, FailureKind, RecoveryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted source does when searched
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Report a candidate at `url`
    Found {
        /// Candidate location
        url: String,
        /// Reported confidence
        confidence: f64,
    },
    /// Report no match
    NotFound,
    /// Report an error of the given kind
    Error(FailureKind),
    /// Never answer
    Hang,
    /// Panic inside the adapter
    Panic,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Marks a call cancelled if its future is dropped before completion
struct CallGuard<'a> {
    counters: &'a Counters,
    done: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            self.counters.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A source that plays back a script
///
/// Clones share their call counters, so a test can keep one handle while the
/// registry owns another.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    source_id: String,
    script: Script,
    overrides: HashMap<String, Script>,
    delay: Duration,
    capture_date: Option<DateTime<Utc>>,
    counters: Arc<Counters>,
}

impl ScriptedSource {
    /// Create a source that always plays `script`
    pub fn new(source_id: impl Into<String>, script: Script) -> Self {
        Self {
            source_id: source_id.into(),
            script,
            overrides: HashMap::new(),
            delay: Duration::ZERO,
            capture_date: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// A source that always finds a candidate with the given confidence
    pub fn found(source_id: impl Into<String>, confidence: f64) -> Self {
        let source_id = source_id.into();
        let url = format!("https://{}.example.org/datasets/recovered", source_id);
        Self::new(source_id, Script::Found { url, confidence })
    }

    /// A source that never finds anything
    pub fn not_found(source_id: impl Into<String>) -> Self {
        Self::new(source_id, Script::NotFound)
    }

    /// A source that always fails
    pub fn failing(source_id: impl Into<String>, kind: FailureKind) -> Self {
        Self::new(source_id, Script::Error(kind))
    }

    /// A source that never answers
    pub fn hanging(source_id: impl Into<String>) -> Self {
        Self::new(source_id, Script::Hang)
    }

    /// A source that panics when searched
    pub fn panicking(source_id: impl Into<String>) -> Self {
        Self::new(source_id, Script::Panic)
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Play `script` for datasets with this origin id instead of the default
    pub fn with_override(mut self, origin_id: impl Into<String>, script: Script) -> Self {
        self.overrides.insert(origin_id.into(), script);
        self
    }

    /// Attach a capture date to found results
    pub fn with_capture_date(mut self, date: DateTime<Utc>) -> Self {
        self.capture_date = Some(date);
        self
    }

    /// Number of searches started
    pub fn call_count(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Number of searches that ran to completion
    pub fn completed_count(&self) -> usize {
        self.counters.completed.load(Ordering::SeqCst)
    }

    /// Number of searches dropped before answering
    pub fn cancelled_count(&self) -> usize {
        self.counters.cancelled.load(Ordering::SeqCst)
    }

    /// Reset all counters to zero
    pub fn reset_call_count(&self) {
        self.counters.calls.store(0, Ordering::SeqCst);
        self.counters.completed.store(0, Ordering::SeqCst);
        self.counters.cancelled.store(0, Ordering::SeqCst);
    }

    fn script_for(&self, dataset: &DatasetMetadata) -> &Script {
        self.overrides.get(&dataset.origin_id).unwrap_or(&self.script)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, dataset: &DatasetMetadata, _timeout: Duration) -> RecoveryResult {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = CallGuard {
            counters: &self.counters,
            done: false,
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match self.script_for(dataset) {
            Script::Found { url, confidence } => {
                let mut result =
                    RecoveryResult::found(&self.source_id, url, Confidence::new(*confidence));
                if let Some(date) = self.capture_date {
                    result = result.with_capture_date(date);
                }
                result
            }
            Script::NotFound => RecoveryResult::not_found(&self.source_id),
            Script::Error(kind) => RecoveryResult::error(
                &self.source_id,
                *kind,
                format!("scripted {} failure", kind.as_str()),
            ),
            Script::Hang => std::future::pending::<RecoveryResult>().await,
            Script::Panic => panic!("scripted source '{}' panicked", self.source_id),
        };
        guard.done = true;
        result
    }
}
