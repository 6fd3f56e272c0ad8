//! Recovery session: one dataset's tiered search
//!
//! Tiers run in ascending order. Within a tier every admitted source is
//! called concurrently on a `JoinSet`, each call bounded by the source's
//! timeout and by the session's cancellation token. The first FOUND result
//! at or above the early-stop confidence cancels the token, aborts the rest
//! of the tier and skips every later tier.
//!
//! A panicking adapter is caught at its call and recorded as an ERROR result
//! of kind `internal`; the rest of the search carries on.

use crate::registry::{ActiveSource, SourceRegistry};
use crate::{RecoveryConfig, RecoveryError};
use futures::FutureExt;
use lazarus_domain::{
    DatasetMetadata, FailureKind, ProvenancePack, RecoveryResult, SourceAttempt, Tier,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How one source call ended
#[derive(Debug)]
enum CallOutcome {
    Finished(RecoveryResult),
    Cancelled,
}

/// What a tier produced
struct TierOutcome {
    attempts: Vec<SourceAttempt>,
    early_stop: bool,
}

/// Runs tiered searches against a shared registry
///
/// A session value holds no per-search state, so one instance serves any
/// number of concurrent `run` calls.
#[derive(Debug, Clone)]
pub struct RecoverySession {
    registry: Arc<SourceRegistry>,
    config: Arc<RecoveryConfig>,
}

impl RecoverySession {
    /// Create a session runner
    pub fn new(registry: Arc<SourceRegistry>, config: Arc<RecoveryConfig>) -> Self {
        Self { registry, config }
    }

    /// Search for one dataset
    pub async fn run(&self, dataset: &DatasetMetadata) -> Result<ProvenancePack, RecoveryError> {
        self.run_with_cancel(dataset, CancellationToken::new()).await
    }

    /// Search for one dataset, stopping early if `cancel` fires
    ///
    /// A cancelled search still returns a pack built from the results
    /// obtained so far; calls in flight show up as cancelled chain links.
    pub async fn run_with_cancel(
        &self,
        dataset: &DatasetMetadata,
        cancel: CancellationToken,
    ) -> Result<ProvenancePack, RecoveryError> {
        let token = cancel.child_token();
        let dataset = Arc::new(dataset.clone());
        let tiers = self.registry.tiers();

        info!(
            "Searching for {} across {} tiers",
            dataset.label(),
            tiers.len()
        );
        if tiers.is_empty() {
            warn!("Every source circuit is open; nothing to search");
        }

        let mut attempts = Vec::new();
        for group in tiers {
            if token.is_cancelled() {
                debug!("Search cancelled before {}", group.tier);
                break;
            }

            // Another session may have opened a circuit since the snapshot
            let sources: Vec<ActiveSource> = group
                .sources
                .into_iter()
                .filter(|s| self.registry.admits(&s.descriptor.id))
                .collect();
            if sources.is_empty() {
                debug!("No admitted sources left in {}", group.tier);
                continue;
            }

            let outcome = self
                .run_tier(&dataset, group.tier, sources, &token)
                .await?;
            attempts.extend(outcome.attempts);

            if outcome.early_stop {
                info!("Early stop in {} for {}", group.tier, dataset.label());
                break;
            }
        }

        let pack = ProvenancePack::assemble(
            dataset.as_ref().clone(),
            attempts,
            &self.config.selection_policy(),
        );
        info!(
            "Search for {} finished: {} ({} sources consulted)",
            dataset.label(),
            pack.status,
            pack.provenance_chain.len()
        );
        Ok(pack)
    }

    async fn run_tier(
        &self,
        dataset: &Arc<DatasetMetadata>,
        tier: Tier,
        sources: Vec<ActiveSource>,
        token: &CancellationToken,
    ) -> Result<TierOutcome, RecoveryError> {
        debug!("Starting {} with {} sources", tier, sources.len());

        let mut calls = JoinSet::new();
        for (slot, source) in sources.iter().enumerate() {
            let adapter = source.adapter.clone();
            let dataset = dataset.clone();
            let token = token.clone();
            let timeout = source.descriptor.timeout;
            let source_id = source.descriptor.id.clone();

            calls.spawn(async move {
                let call = AssertUnwindSafe(tokio::time::timeout(
                    timeout,
                    adapter.search(&dataset, timeout),
                ))
                .catch_unwind();

                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => CallOutcome::Cancelled,
                    caught = call => match caught {
                        Ok(Ok(result)) => CallOutcome::Finished(result),
                        Ok(Err(_)) => CallOutcome::Finished(RecoveryResult::error(
                            &source_id,
                            FailureKind::Timeout,
                            format!("no answer within {:?}", timeout),
                        )),
                        Err(panic) => CallOutcome::Finished(RecoveryResult::error(
                            &source_id,
                            FailureKind::Internal,
                            format!("adapter panicked: {}", panic_message(panic.as_ref())),
                        )),
                    },
                };
                (slot, outcome)
            });
        }

        let mut results: Vec<Option<RecoveryResult>> = vec![None; sources.len()];
        let mut early_stop = false;

        while let Some(joined) = calls.join_next().await {
            let (slot, outcome) = match joined {
                Ok(done) => done,
                // Aborted after an early stop
                Err(e) if e.is_cancelled() => continue,
                Err(e) => return Err(RecoveryError::Internal(e.to_string())),
            };
            let source_id = &sources[slot].descriptor.id;

            match outcome {
                CallOutcome::Finished(result) => {
                    debug!(
                        "Source '{}' answered {} ({})",
                        source_id, result.status, result.confidence
                    );
                    match &result.failure {
                        // The dataset cannot be expressed as a query; not the archive's fault
                        Some(failure) if failure.kind == FailureKind::InvalidRequest => {
                            debug!("Source '{}' cannot query {}: {}", source_id, dataset.label(), failure.message);
                        }
                        Some(failure) => {
                            warn!("Source '{}' failed: {}", source_id, failure.message);
                            self.registry.record_failure(source_id)?;
                        }
                        None if result.is_error() => self.registry.record_failure(source_id)?,
                        None => self.registry.record_success(source_id)?,
                    }

                    let stops = !early_stop
                        && result.is_found()
                        && result.confidence.meets(self.config.early_stop_confidence);
                    results[slot] = Some(result);
                    if stops {
                        early_stop = true;
                        token.cancel();
                        calls.abort_all();
                    }
                }
                CallOutcome::Cancelled => debug!("Call to '{}' cancelled", source_id),
            }
        }

        let attempts = sources
            .into_iter()
            .zip(results)
            .map(|(source, result)| SourceAttempt {
                source_id: source.descriptor.id,
                source_name: source.descriptor.name,
                tier,
                order: source.order,
                result,
            })
            .collect();

        Ok(TierOutcome {
            attempts,
            early_stop,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use lazarus_domain::{LinkOutcome, PackStatus, SourceDescriptor};
    use lazarus_sources::{ScriptedSource, SourceAdapter};
    use std::time::Duration;

    fn session(sources: Vec<(u32, ScriptedSource)>) -> RecoverySession {
        let entries = sources
            .into_iter()
            .map(|(tier, source)| {
                let id = source.source_id().to_string();
                (
                    SourceDescriptor::new(&id, format!("{} archive", id), Tier::new(tier))
                        .with_timeout(Duration::from_secs(5)),
                    Arc::new(source) as Arc<dyn SourceAdapter>,
                )
            })
            .collect();
        let registry = SourceRegistry::new(entries, CircuitBreakerConfig::default()).unwrap();
        RecoverySession::new(Arc::new(registry), Arc::new(RecoveryConfig::default()))
    }

    fn dataset() -> DatasetMetadata {
        DatasetMetadata::new("Toxics Release Inventory", "EPA", "tri-2023")
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_stop_cancels_slower_peers() {
        let fast = ScriptedSource::found("fast", 0.9).with_delay(Duration::from_millis(10));
        let slow = ScriptedSource::found("slow", 0.99).with_delay(Duration::from_secs(3));
        let later = ScriptedSource::found("later", 0.99);
        let session = session(vec![(1, slow.clone()), (1, fast.clone()), (2, later.clone())]);

        let pack = session.run(&dataset()).await.unwrap();

        assert_eq!(pack.status, PackStatus::Found);
        assert_eq!(pack.chain_ids(), vec!["slow", "fast"]);
        assert_eq!(pack.provenance_chain[0].outcome, LinkOutcome::Cancelled);
        assert_eq!(pack.chosen.unwrap().source_id, "fast");
        assert_eq!(slow.cancelled_count(), 1);
        assert_eq!(later.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let stuck = ScriptedSource::hanging("stuck");
        let session = session(vec![(1, stuck.clone())]);

        let pack = session.run(&dataset()).await.unwrap();

        assert_eq!(pack.status, PackStatus::Missing);
        let result = &pack.results[0];
        assert_eq!(result.failure.as_ref().unwrap().kind, FailureKind::Timeout);
        assert_eq!(stuck.cancelled_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_source_becomes_internal_result() {
        let session = session(vec![
            (1, ScriptedSource::panicking("broken")),
            (1, ScriptedSource::found("fine", 0.9).with_delay(Duration::from_millis(20))),
        ]);

        let pack = session.run(&dataset()).await.unwrap();

        assert_eq!(pack.status, PackStatus::Found);
        assert_eq!(pack.chosen.as_ref().unwrap().source_id, "fine");
        assert_eq!(pack.provenance_chain[0].outcome, LinkOutcome::Error);
        let failure = pack.results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Internal);
        assert!(failure.message.contains("panicked"));

        let info = session.registry.list_sources();
        assert_eq!(info[0].health.consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_leaves_circuit_closed() {
        let picky = ScriptedSource::failing("picky", FailureKind::InvalidRequest);
        let session = session(vec![(1, picky.clone())]);

        for _ in 0..5 {
            let pack = session.run(&dataset()).await.unwrap();
            assert_eq!(pack.provenance_chain[0].outcome, LinkOutcome::Error);
        }

        assert_eq!(picky.call_count(), 5);
        let info = session.registry.list_sources();
        assert_eq!(info[0].health.state, crate::CircuitState::Closed);
        assert_eq!(info[0].health.consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_returns_partial_pack() {
        let quick = ScriptedSource::not_found("quick");
        let slow = ScriptedSource::found("slow", 0.9).with_delay(Duration::from_secs(4));
        let session = session(vec![(1, quick), (1, slow.clone())]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let pack = session.run_with_cancel(&dataset(), cancel).await.unwrap();
        assert_eq!(pack.status, PackStatus::Missing);
        assert_eq!(pack.results.len(), 1);
        assert_eq!(pack.provenance_chain[1].outcome, LinkOutcome::Cancelled);
        assert_eq!(slow.completed_count(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
