//! Source registry with per-source circuit breakers
//!
//! Sources are registered once at startup. The only state that changes
//! afterwards is each source's health, kept behind its own mutex so updates
//! from concurrent sessions are linearized per source without a global lock.
//!
//! Circuit states:
//!
//! ```text
//! CLOSED --(K consecutive failures)--> OPEN --(cool-down elapses)--> HALF_OPEN
//! HALF_OPEN --(success)--> CLOSED
//! HALF_OPEN --(failure)--> OPEN (fresh cool-down)
//! ```

use crate::config::CircuitBreakerConfig;
use crate::RecoveryError;
use lazarus_domain::{SourceDescriptor, Tier};
use lazarus_sources::SourceAdapter;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Too many failures; the source is skipped
    Open,
    /// Cool-down elapsed; the next outcome decides
    HalfOpen,
}

impl CircuitState {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Mutable health of one source
#[derive(Debug, Default)]
struct SourceHealth {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    open_until: Option<Instant>,
}

impl SourceHealth {
    fn state(&self, now: Instant) -> CircuitState {
        match self.open_until {
            None => CircuitState::Closed,
            Some(until) if now < until => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
        }
    }
}

/// Point-in-time view of a source's health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Circuit state
    pub state: CircuitState,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Seconds since the last failure
    pub last_failure_secs_ago: Option<u64>,
    /// Seconds until an open circuit goes half-open
    pub retry_in_secs: Option<u64>,
}

/// Introspection record for one registered source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    /// Source id
    pub id: String,
    /// Display name
    pub name: String,
    /// Adapter kind
    pub kind: String,
    /// Priority tier
    pub tier: Tier,
    /// Whether the source takes part in searches
    pub enabled: bool,
    /// Current health
    pub health: HealthSnapshot,
}

/// A source a session may invoke
#[derive(Clone)]
pub struct ActiveSource {
    /// Static description
    pub descriptor: SourceDescriptor,
    /// Declaration order across the whole configuration
    pub order: usize,
    /// The adapter
    pub adapter: Arc<dyn SourceAdapter>,
}

impl std::fmt::Debug for ActiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSource")
            .field("id", &self.descriptor.id)
            .field("tier", &self.descriptor.tier)
            .field("order", &self.order)
            .finish()
    }
}

/// Sources of one tier, in declaration order
#[derive(Debug, Clone)]
pub struct TierGroup {
    /// The tier
    pub tier: Tier,
    /// Admitted sources
    pub sources: Vec<ActiveSource>,
}

struct RegisteredSource {
    source: ActiveSource,
    health: Mutex<SourceHealth>,
}

impl RegisteredSource {
    fn health(&self) -> MutexGuard<'_, SourceHealth> {
        // Updates are single assignments, so a poisoned lock still holds consistent counters
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of recovery sources and their health
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
    index: HashMap<String, usize>,
    breaker: CircuitBreakerConfig,
}

impl SourceRegistry {
    /// Create a registry from sources in declaration order
    ///
    /// Fails when ids repeat, when an adapter reports under a different id
    /// than its descriptor, or when no source is enabled.
    pub fn new(
        sources: Vec<(SourceDescriptor, Arc<dyn SourceAdapter>)>,
        breaker: CircuitBreakerConfig,
    ) -> Result<Self, RecoveryError> {
        let mut seen = HashSet::new();
        for (descriptor, adapter) in &sources {
            if !seen.insert(descriptor.id.as_str()) {
                return Err(RecoveryError::Configuration(format!(
                    "duplicate source id '{}'",
                    descriptor.id
                )));
            }
            if adapter.source_id() != descriptor.id {
                return Err(RecoveryError::Configuration(format!(
                    "adapter for '{}' reports as '{}'",
                    descriptor.id,
                    adapter.source_id()
                )));
            }
        }
        if !sources.iter().any(|(descriptor, _)| descriptor.enabled) {
            return Err(RecoveryError::Configuration(
                "no enabled sources".to_string(),
            ));
        }

        let sources: Vec<RegisteredSource> = sources
            .into_iter()
            .enumerate()
            .map(|(order, (descriptor, adapter))| RegisteredSource {
                source: ActiveSource {
                    descriptor,
                    order,
                    adapter,
                },
                health: Mutex::new(SourceHealth::default()),
            })
            .collect();
        let index = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.source.descriptor.id.clone(), i))
            .collect();

        tracing::info!("Registered {} recovery sources", sources.len());
        Ok(Self {
            sources,
            index,
            breaker,
        })
    }

    /// Enabled, admitted sources grouped by ascending tier
    ///
    /// Sources with an open circuit are left out entirely. Half-open sources
    /// are included so their next outcome can close or re-open the circuit.
    pub fn tiers(&self) -> Vec<TierGroup> {
        let now = Instant::now();
        let mut groups: BTreeMap<Tier, Vec<ActiveSource>> = BTreeMap::new();
        for entry in self.sources.iter().filter(|e| e.source.descriptor.enabled) {
            if entry.health().state(now) == CircuitState::Open {
                continue;
            }
            groups
                .entry(entry.source.descriptor.tier)
                .or_default()
                .push(entry.source.clone());
        }
        groups
            .into_iter()
            .map(|(tier, sources)| TierGroup { tier, sources })
            .collect()
    }

    /// Whether a session may invoke the source right now
    pub fn admits(&self, source_id: &str) -> bool {
        match self.entry(source_id) {
            Ok(entry) => {
                entry.source.descriptor.enabled
                    && entry.health().state(Instant::now()) != CircuitState::Open
            }
            Err(_) => false,
        }
    }

    /// Record a completed call (FOUND or NOT_FOUND)
    pub fn record_success(&self, source_id: &str) -> Result<(), RecoveryError> {
        let entry = self.entry(source_id)?;
        let mut health = entry.health();
        if health.state(Instant::now()) != CircuitState::Closed {
            tracing::info!("Circuit for '{}' closed", source_id);
        }
        health.consecutive_failures = 0;
        health.open_until = None;
        Ok(())
    }

    /// Record a failed call (ERROR)
    pub fn record_failure(&self, source_id: &str) -> Result<(), RecoveryError> {
        let entry = self.entry(source_id)?;
        let now = Instant::now();
        let mut health = entry.health();
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure = Some(now);

        match health.state(now) {
            CircuitState::HalfOpen => {
                health.open_until = Some(now + self.breaker.cooldown());
                tracing::warn!(
                    "Circuit for '{}' re-opened after half-open trial call failed",
                    source_id
                );
            }
            CircuitState::Closed
                if health.consecutive_failures >= self.breaker.failure_threshold =>
            {
                health.open_until = Some(now + self.breaker.cooldown());
                tracing::warn!(
                    "Circuit for '{}' opened after {} consecutive failures (cool-down {:?})",
                    source_id,
                    health.consecutive_failures,
                    self.breaker.cooldown()
                );
            }
            // Late results from calls started before the circuit opened
            _ => {}
        }
        Ok(())
    }

    /// Introspection for every registered source, in declaration order
    pub fn list_sources(&self) -> Vec<SourceInfo> {
        let now = Instant::now();
        let mut infos = Vec::with_capacity(self.sources.len());
        for entry in &self.sources {
            let health = entry.health();
            let descriptor = &entry.source.descriptor;
            infos.push(SourceInfo {
                id: descriptor.id.clone(),
                name: descriptor.name.clone(),
                kind: descriptor.kind.clone(),
                tier: descriptor.tier,
                enabled: descriptor.enabled,
                health: HealthSnapshot {
                    state: health.state(now),
                    consecutive_failures: health.consecutive_failures,
                    last_failure_secs_ago: health
                        .last_failure
                        .map(|at| now.saturating_duration_since(at).as_secs()),
                    retry_in_secs: health
                        .open_until
                        .filter(|until| *until > now)
                        .map(|until| ceil_secs(until - now)),
                },
            });
        }
        infos
    }

    /// Current circuit state of one source
    pub fn circuit_state(&self, source_id: &str) -> Result<CircuitState, RecoveryError> {
        let entry = self.entry(source_id)?;
        let state = entry.health().state(Instant::now());
        Ok(state)
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of enabled sources
    pub fn enabled_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|e| e.source.descriptor.enabled)
            .count()
    }

    fn entry(&self, source_id: &str) -> Result<&RegisteredSource, RecoveryError> {
        self.index
            .get(source_id)
            .map(|&i| &self.sources[i])
            .ok_or_else(|| RecoveryError::UnknownSource(source_id.to_string()))
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources.len())
            .field("breaker", &self.breaker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazarus_sources::ScriptedSource;

    fn source(id: &str, tier: u32) -> (SourceDescriptor, Arc<dyn SourceAdapter>) {
        (
            SourceDescriptor::new(id, id.to_uppercase(), Tier::new(tier)),
            Arc::new(ScriptedSource::not_found(id)),
        )
    }

    fn registry(sources: Vec<(SourceDescriptor, Arc<dyn SourceAdapter>)>) -> SourceRegistry {
        SourceRegistry::new(sources, CircuitBreakerConfig::default()).unwrap()
    }

    fn tier_ids(groups: &[TierGroup]) -> Vec<(u32, Vec<String>)> {
        groups
            .iter()
            .map(|g| {
                (
                    g.tier.value(),
                    g.sources.iter().map(|s| s.descriptor.id.clone()).collect(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_tiers_grouped_in_declaration_order() {
        let registry = registry(vec![
            source("wayback", 2),
            source("mirror-a", 1),
            source("zenodo", 3),
            source("mirror-b", 1),
        ]);

        let groups = registry.tiers();
        assert_eq!(
            tier_ids(&groups),
            vec![
                (1, vec!["mirror-a".to_string(), "mirror-b".to_string()]),
                (2, vec!["wayback".to_string()]),
                (3, vec!["zenodo".to_string()]),
            ]
        );
        assert_eq!(groups[0].sources[1].order, 3);
    }

    #[tokio::test]
    async fn test_disabled_sources_are_skipped() {
        let (descriptor, adapter) = source("off", 1);
        let registry = registry(vec![
            (descriptor.with_enabled(false), adapter),
            source("on", 2),
        ]);

        let groups = registry.tiers();
        assert_eq!(tier_ids(&groups), vec![(2, vec!["on".to_string()])]);
        assert!(!registry.admits("off"));
        assert_eq!(registry.enabled_count(), 1);
        assert_eq!(registry.source_count(), 2);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let duplicate = SourceRegistry::new(
            vec![source("a", 1), source("a", 2)],
            CircuitBreakerConfig::default(),
        );
        assert!(matches!(duplicate, Err(RecoveryError::Configuration(msg)) if msg.contains("duplicate")));

        let (descriptor, adapter) = source("a", 1);
        let none_enabled = SourceRegistry::new(
            vec![(descriptor.with_enabled(false), adapter)],
            CircuitBreakerConfig::default(),
        );
        assert!(none_enabled.is_err());

        let empty = SourceRegistry::new(Vec::new(), CircuitBreakerConfig::default());
        assert!(empty.is_err());

        let mismatched = SourceRegistry::new(
            vec![(
                SourceDescriptor::new("a", "A", Tier::new(1)),
                Arc::new(ScriptedSource::not_found("b")) as Arc<dyn SourceAdapter>,
            )],
            CircuitBreakerConfig::default(),
        );
        assert!(mismatched.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_after_threshold() {
        let registry = registry(vec![source("flaky", 1), source("steady", 1)]);

        registry.record_failure("flaky").unwrap();
        registry.record_failure("flaky").unwrap();
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Closed);

        registry.record_failure("flaky").unwrap();
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Open);
        assert!(!registry.admits("flaky"));
        assert_eq!(
            tier_ids(&registry.tiers()),
            vec![(1, vec!["steady".to_string()])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter() {
        let registry = registry(vec![source("flaky", 1)]);

        registry.record_failure("flaky").unwrap();
        registry.record_failure("flaky").unwrap();
        registry.record_success("flaky").unwrap();
        registry.record_failure("flaky").unwrap();
        registry.record_failure("flaky").unwrap();

        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Closed);
        let info = &registry.list_sources()[0];
        assert_eq!(info.health.consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_call() {
        let registry = registry(vec![source("flaky", 1)]);
        for _ in 0..3 {
            registry.record_failure("flaky").unwrap();
        }

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::HalfOpen);
        assert!(registry.admits("flaky"));

        // Failed trial call: a fresh full window
        registry.record_failure("flaky").unwrap();
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(1)).await;

        // Successful trial call closes the circuit
        registry.record_success("flaky").unwrap();
        assert_eq!(registry.circuit_state("flaky").unwrap(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_sources_snapshot() {
        let registry = registry(vec![source("a", 1), source("b", 2)]);
        for _ in 0..3 {
            registry.record_failure("b").unwrap();
        }
        tokio::time::advance(Duration::from_secs(100)).await;

        let infos = registry.list_sources();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].id, "a");
        assert_eq!(infos[0].name, "A");
        assert_eq!(infos[0].health.state, CircuitState::Closed);
        assert_eq!(infos[0].health.retry_in_secs, None);

        assert_eq!(infos[1].health.state, CircuitState::Open);
        assert_eq!(infos[1].health.retry_in_secs, Some(200));
        assert_eq!(infos[1].health.last_failure_secs_ago, Some(100));
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let registry = registry(vec![source("a", 1)]);
        assert!(matches!(
            registry.record_success("nope"),
            Err(RecoveryError::UnknownSource(id)) if id == "nope"
        ));
        assert!(!registry.admits("nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_are_not_lost() {
        let registry = Arc::new(SourceRegistry::new(
            vec![source("flaky", 1)],
            CircuitBreakerConfig {
                failure_threshold: 100,
                cooldown_secs: 60,
            },
        )
        .unwrap());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.record_failure("flaky").unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let info = &registry.list_sources()[0];
        assert_eq!(info.health.consecutive_failures, 50);
    }
}
