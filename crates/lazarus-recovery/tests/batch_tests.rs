//! Integration tests for batch recovery

use async_trait::async_trait;
use lazarus_domain::{
    DatasetMetadata, FailureKind, PackStatus, ProvenancePack, SourceDescriptor, Tier,
};
use lazarus_recovery::{
    BatchCoordinator, BatchSummary, DatasetSearch, RecoveryConfig, RecoveryError, RecoveryService,
    RecoverySession, SourceRegistry,
};
use lazarus_sources::{Script, ScriptedSource, SourceAdapter};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

fn registry(sources: Vec<(u32, ScriptedSource)>, config: &RecoveryConfig) -> SourceRegistry {
    let entries = sources
        .into_iter()
        .map(|(tier, source)| {
            let descriptor =
                SourceDescriptor::new(source.source_id(), source.source_id(), Tier::new(tier));
            (descriptor, Arc::new(source) as Arc<dyn SourceAdapter>)
        })
        .collect();
    SourceRegistry::new(entries, config.circuit_breaker.clone()).unwrap()
}

fn service(sources: Vec<(u32, ScriptedSource)>) -> RecoveryService {
    let config = RecoveryConfig::default();
    RecoveryService::new(registry(sources, &config), config).unwrap()
}

/// Runs the real session, but blows up outside any adapter call for one dataset
struct FaultySession {
    inner: RecoverySession,
    fault_on: &'static str,
}

#[async_trait]
impl DatasetSearch for FaultySession {
    async fn search(&self, dataset: &DatasetMetadata) -> Result<ProvenancePack, RecoveryError> {
        let pack = self.inner.run(dataset).await?;
        if dataset.origin_id == self.fault_on {
            panic!("pack assembly failed for {}", dataset.origin_id);
        }
        Ok(pack)
    }
}

fn datasets(n: usize) -> Vec<DatasetMetadata> {
    (0..n)
        .map(|i| {
            DatasetMetadata::new(
                format!("County Health Rankings {}", i),
                "Centers for Disease Control and Prevention",
                format!("d-{}", i),
            )
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_one_panic_does_not_stop_batch() {
    let config = RecoveryConfig::default();
    let mirror = ScriptedSource::found("mirror", 0.9);
    let session = RecoverySession::new(
        Arc::new(registry(vec![(1, mirror)], &config)),
        Arc::new(config),
    );
    let faulty = FaultySession {
        inner: session,
        fault_on: "d-17",
    };

    let packs: Vec<_> = BatchCoordinator::new(faulty)
        .run(datasets(50), 5)
        .collect()
        .await;

    assert_eq!(packs.len(), 50);
    let errors: Vec<_> = packs
        .iter()
        .filter(|p| p.status == PackStatus::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].dataset.origin_id, "d-17");
    assert!(errors[0].diagnostic.as_deref().unwrap().contains("panicked"));

    let ids: BTreeSet<_> = packs.iter().map(|p| p.dataset.origin_id.clone()).collect();
    assert_eq!(ids.len(), 50);
    assert_eq!(
        packs.iter().filter(|p| p.status == PackStatus::Found).count(),
        49
    );
}

#[tokio::test(start_paused = true)]
async fn test_adapter_panic_is_one_failed_result() {
    let mirror = ScriptedSource::found("mirror", 0.9).with_override("d-2", Script::Panic);
    let backup = ScriptedSource::found("backup", 0.8);
    let service = service(vec![(1, mirror), (2, backup)]);

    let packs: Vec<_> = service
        .batch_search(datasets(4), 2)
        .unwrap()
        .collect()
        .await;

    assert_eq!(packs.len(), 4);
    assert!(packs.iter().all(|p| p.status == PackStatus::Found));

    let hit = packs.iter().find(|p| p.dataset.origin_id == "d-2").unwrap();
    assert_eq!(hit.chosen.as_ref().unwrap().source_id, "backup");
    let broken = hit.results.iter().find(|r| r.source_id == "mirror").unwrap();
    assert_eq!(broken.failure.as_ref().unwrap().kind, FailureKind::Internal);
}

#[tokio::test(start_paused = true)]
async fn test_pool_is_bounded_by_concurrency() {
    let slow = ScriptedSource::found("slow", 0.9).with_delay(Duration::from_secs(1));
    let service = service(vec![(1, slow)]);

    let started = tokio::time::Instant::now();
    let packs: Vec<_> = service
        .batch_search(datasets(20), 4)
        .unwrap()
        .collect()
        .await;
    let elapsed = started.elapsed();

    assert_eq!(packs.len(), 20);
    // 20 one-second searches through 4 workers
    assert!(elapsed >= Duration::from_secs(5), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "took {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_summary_over_mixed_batch() {
    let mirror = ScriptedSource::not_found("mirror")
        .with_override(
            "d-0",
            Script::Found {
                url: "https://mirror.example.org/d-0".into(),
                confidence: 0.9,
            },
        )
        .with_override("d-1", Script::Panic);
    let service = service(vec![(1, mirror)]);

    let mut summary = BatchSummary::new();
    let mut stream = service.batch_search(datasets(4), 2).unwrap();
    while let Some(pack) = stream.next().await {
        summary.record(&pack);
    }

    // The panicking adapter leaves d-1 with nothing found, not a failed search
    assert_eq!(summary.found, 1);
    assert_eq!(summary.error, 0);
    assert_eq!(summary.missing, 3);
    assert_eq!(summary.total(), 4);
}
