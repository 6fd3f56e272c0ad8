//! Integration tests for tiered recovery sessions

use chrono::{TimeZone, Utc};
use lazarus_domain::{
    DatasetMetadata, FailureKind, LinkOutcome, PackStatus, RecoveryStatus, SourceDescriptor, Tier,
};
use lazarus_recovery::{CircuitState, RecoveryConfig, RecoveryService, SourceRegistry};
use lazarus_sources::{AdapterFactory, DomainGate, ScriptedSource, SourceAdapter, SourceKind};
use std::sync::Arc;
use std::time::Duration;

const SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a service from (tier, source) pairs in declaration order
fn service(sources: &[(u32, &ScriptedSource)]) -> RecoveryService {
    let config = RecoveryConfig::default();
    let entries = sources
        .iter()
        .map(|(tier, source)| {
            let id = source.source_id().to_string();
            let descriptor = SourceDescriptor::new(&id, format!("{} archive", id), Tier::new(*tier))
                .with_kind("scripted")
                .with_timeout(SOURCE_TIMEOUT);
            (descriptor, Arc::new((*source).clone()) as Arc<dyn SourceAdapter>)
        })
        .collect();
    let registry = SourceRegistry::new(entries, config.circuit_breaker.clone()).unwrap();
    RecoveryService::new(registry, config).unwrap()
}

fn dataset() -> DatasetMetadata {
    DatasetMetadata::new(
        "EJScreen: Environmental Justice Screening and Mapping Tool",
        "Environmental Protection Agency",
        "ejscreen-2024",
    )
    .with_landing_url("https://www.epa.gov/ejscreen")
}

#[tokio::test(start_paused = true)]
async fn test_scenario_a_tier_one_hit_stops_search() {
    let mirror = ScriptedSource::found("mirror", 0.95);
    let wayback = ScriptedSource::found("wayback", 0.99);
    let zenodo = ScriptedSource::found("zenodo", 0.99);
    let service = service(&[(1, &mirror), (2, &wayback), (3, &zenodo)]);

    let pack = service.search(&dataset()).await.unwrap();

    assert_eq!(pack.status, PackStatus::Found);
    assert_eq!(pack.chain_ids(), vec!["mirror"]);
    assert_eq!(pack.chosen.as_ref().unwrap().source_id, "mirror");
    assert_eq!(wayback.call_count(), 0);
    assert_eq!(zenodo.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_b_timeout_then_fallback() {
    let stuck = ScriptedSource::hanging("stuck");
    let partial = ScriptedSource::found("partial", 0.7);
    let academic = ScriptedSource::found("academic", 0.9);
    let service = service(&[(1, &stuck), (2, &partial), (3, &academic)]);

    let pack = service.search(&dataset()).await.unwrap();

    assert_eq!(pack.chain_ids(), vec!["stuck", "partial", "academic"]);
    assert_eq!(pack.provenance_chain[0].outcome, LinkOutcome::Error);
    assert_eq!(
        pack.results[0].failure.as_ref().unwrap().kind,
        FailureKind::Timeout
    );
    assert_eq!(pack.status, PackStatus::Found);
    assert_eq!(pack.chosen.as_ref().unwrap().source_id, "academic");
    assert_eq!(pack.results.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_all_below_threshold_is_missing() {
    let sources: Vec<ScriptedSource> = (0..8)
        .map(|i| {
            if i % 2 == 0 {
                ScriptedSource::found(format!("s{}", i), 0.3)
            } else {
                ScriptedSource::not_found(format!("s{}", i))
            }
        })
        .collect();
    let tiers = [1, 1, 2, 2, 3, 3, 4, 5];
    let pairs: Vec<(u32, &ScriptedSource)> = tiers.iter().copied().zip(sources.iter()).collect();
    let service = service(&pairs);

    let pack = service.search(&dataset()).await.unwrap();

    assert_eq!(pack.status, PackStatus::Missing);
    assert_eq!(
        pack.chain_ids(),
        vec!["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"]
    );
    assert!(pack.chosen.is_none());
    // Low-confidence candidates are kept, just not surfaced
    let found = pack
        .results
        .iter()
        .filter(|r| r.status == RecoveryStatus::Found)
        .count();
    assert_eq!(found, 4);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_e_open_circuit_is_skipped_across_sessions() {
    let flaky = ScriptedSource::failing("flaky", FailureKind::Unreachable);
    let steady = ScriptedSource::not_found("steady");
    let service = service(&[(1, &flaky), (1, &steady)]);

    for _ in 0..3 {
        let pack = service.search(&dataset()).await.unwrap();
        assert_eq!(pack.chain_ids(), vec!["flaky", "steady"]);
    }
    assert_eq!(flaky.call_count(), 3);
    assert_eq!(
        service.registry().circuit_state("flaky").unwrap(),
        CircuitState::Open
    );

    // Fourth call from a new session never reaches the source
    let pack = service.search(&dataset()).await.unwrap();
    assert_eq!(pack.chain_ids(), vec!["steady"]);
    assert_eq!(flaky.call_count(), 3);

    // After the cool-down the source is tried again
    tokio::time::advance(Duration::from_secs(300)).await;
    let pack = service.search(&dataset()).await.unwrap();
    assert_eq!(pack.chain_ids(), vec!["flaky", "steady"]);
    assert_eq!(flaky.call_count(), 4);
    assert_eq!(
        service.registry().circuit_state("flaky").unwrap(),
        CircuitState::Open
    );
}

#[tokio::test(start_paused = true)]
async fn test_half_open_success_closes_circuit() {
    let flaky = ScriptedSource::failing("flaky", FailureKind::Timeout)
        .with_override("recovered", lazarus_sources::Script::NotFound);
    let service = service(&[(1, &flaky)]);

    for _ in 0..3 {
        service.search(&dataset()).await.unwrap();
    }
    tokio::time::advance(Duration::from_secs(301)).await;

    let recovered = DatasetMetadata::new("Anything", "Any agency", "recovered");
    service.search(&recovered).await.unwrap();

    assert_eq!(
        service.registry().circuit_state("flaky").unwrap(),
        CircuitState::Closed
    );
    let info = &service.list_sources()[0];
    assert_eq!(info.health.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_early_stop_never_invokes_later_tiers() {
    for stop_tier in 1..=3u32 {
        let sources: Vec<ScriptedSource> = (1..=4u32)
            .map(|tier| {
                if tier == stop_tier {
                    ScriptedSource::found(format!("t{}", tier), 0.85)
                } else {
                    ScriptedSource::found(format!("t{}", tier), 0.4)
                }
            })
            .collect();
        let pairs: Vec<(u32, &ScriptedSource)> =
            (1..=4u32).zip(sources.iter()).collect();
        let service = service(&pairs);

        let pack = service.search(&dataset()).await.unwrap();

        assert_eq!(pack.provenance_chain.len(), stop_tier as usize);
        for source in &sources[stop_tier as usize..] {
            assert_eq!(source.call_count(), 0, "tier after {} was invoked", stop_tier);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_chain_order_ignores_completion_order() {
    let delays = [[40u64, 30, 20, 10], [10, 20, 30, 40], [25, 5, 40, 15]];

    for jitter in delays {
        let sources: Vec<ScriptedSource> = jitter
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                ScriptedSource::not_found(format!("src-{}", i))
                    .with_delay(Duration::from_millis(*ms))
            })
            .collect();
        let pairs: Vec<(u32, &ScriptedSource)> = vec![
            (2, &sources[0]),
            (1, &sources[1]),
            (1, &sources[2]),
            (2, &sources[3]),
        ];
        let service = service(&pairs);

        let pack = service.search(&dataset()).await.unwrap();
        assert_eq!(pack.chain_ids(), vec!["src-1", "src-2", "src-0", "src-3"]);
        let result_ids: Vec<&str> = pack.results.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(result_ids, vec!["src-1", "src-2", "src-0", "src-3"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_identical_searches_are_idempotent() {
    let captured = Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap();
    let a = ScriptedSource::found("a", 0.6)
        .with_delay(Duration::from_millis(30))
        .with_capture_date(captured);
    let b = ScriptedSource::found("b", 0.6).with_delay(Duration::from_millis(10));
    let c = ScriptedSource::failing("c", FailureKind::MalformedResponse);
    let service = service(&[(1, &a), (1, &b), (2, &c)]);

    let first = service.search(&dataset()).await.unwrap();
    let second = service.search(&dataset()).await.unwrap();

    assert_eq!(first, second);
    // Equal confidence and tier: the dated capture wins
    assert_eq!(first.chosen.as_ref().unwrap().source_id, "a");
}

#[tokio::test(start_paused = true)]
async fn test_lower_tier_wins_confidence_tie() {
    let late = ScriptedSource::found("late", 0.7);
    let early = ScriptedSource::found("early", 0.7);
    let service = service(&[(2, &late), (1, &early)]);

    let pack = service.search(&dataset()).await.unwrap();
    assert_eq!(pack.chosen.unwrap().source_id, "early");
}

#[tokio::test(start_paused = true)]
async fn test_all_sources_failing_is_missing_not_error() {
    let a = ScriptedSource::failing("a", FailureKind::Unreachable);
    let b = ScriptedSource::hanging("b");
    let service = service(&[(1, &a), (2, &b)]);

    let pack = service.search(&dataset()).await.unwrap();
    assert_eq!(pack.status, PackStatus::Missing);
    assert!(pack.all_sources_failed());
}

#[tokio::test(start_paused = true)]
async fn test_every_circuit_open_yields_empty_missing_pack() {
    let only = ScriptedSource::failing("only", FailureKind::Unreachable);
    let service = service(&[(1, &only)]);
    for _ in 0..3 {
        service.search(&dataset()).await.unwrap();
    }

    let pack = service.search(&dataset()).await.unwrap();
    assert_eq!(pack.status, PackStatus::Missing);
    assert!(pack.provenance_chain.is_empty());
    assert_eq!(only.call_count(), 3);
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let a = ScriptedSource::not_found("a");
    let service = service(&[(1, &a)]);
    assert!(service.batch_search(vec![dataset()], 0).is_err());
}

#[tokio::test]
async fn test_untitled_datasets_leave_archive_circuits_closed() {
    let factory = AdapterFactory::new(Arc::new(DomainGate::unlimited())).unwrap();
    let kinds = [
        (
            "zenodo",
            SourceKind::Zenodo {
                endpoint: "https://zenodo.org/api/records".into(),
            },
        ),
        (
            "harvard-dataverse",
            SourceKind::Dataverse {
                base_url: "https://dataverse.harvard.edu".into(),
            },
        ),
    ];
    let entries = kinds
        .iter()
        .map(|(id, kind)| {
            let descriptor = SourceDescriptor::new(*id, *id, Tier::new(1)).with_timeout(SOURCE_TIMEOUT);
            (descriptor, factory.build(id, kind).unwrap())
        })
        .collect();
    let config = RecoveryConfig::default();
    let registry = SourceRegistry::new(entries, config.circuit_breaker.clone()).unwrap();
    let service = RecoveryService::new(registry, config).unwrap();

    // Both archives refuse an untitled dataset before any request goes out
    for i in 0..3 {
        let untitled = DatasetMetadata::new("", "EPA", format!("id-{}", i));
        let pack = service.search(&untitled).await.unwrap();
        assert_eq!(pack.status, PackStatus::Missing);
        assert!(pack
            .results
            .iter()
            .all(|r| r.failure.as_ref().unwrap().kind == FailureKind::InvalidRequest));
    }

    for (id, _) in &kinds {
        assert_eq!(
            service.registry().circuit_state(id).unwrap(),
            CircuitState::Closed
        );
    }
    assert!(service
        .list_sources()
        .iter()
        .all(|info| info.health.consecutive_failures == 0));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_source_does_not_sink_the_search() {
    let broken = ScriptedSource::panicking("broken");
    let backup = ScriptedSource::found("backup", 0.9);
    let service = service(&[(1, &broken), (2, &backup)]);

    let pack = service.search(&dataset()).await.unwrap();
    assert_eq!(pack.status, PackStatus::Found);
    assert_eq!(pack.chain_ids(), vec!["broken", "backup"]);
    assert_eq!(pack.provenance_chain[0].outcome, LinkOutcome::Error);
    assert_eq!(
        pack.results[0].failure.as_ref().unwrap().kind,
        FailureKind::Internal
    );
    assert_eq!(service.list_sources()[0].health.consecutive_failures, 1);
}
