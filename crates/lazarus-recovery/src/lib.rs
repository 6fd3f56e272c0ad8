//! Lazarus Recovery
//!
//! Orchestrates the search for vanished datasets across prioritized archival
//! sources.
//!
//! # Architecture
//!
//! - [`SourceRegistry`]: registered sources, tiers and circuit breakers
//! - [`RecoverySession`]: one dataset's tiered search with early stop
//! - [`BatchCoordinator`]: bounded worker pool over many sessions
//! - [`RecoveryService`]: the operations collaborators call
//!
//! Configuration is an immutable [`RecoveryConfig`] passed to constructors;
//! the only shared mutable state is source health inside the registry.
//!
//! # Examples
//!
//! ```
//! use lazarus_domain::{DatasetMetadata, PackStatus, SourceDescriptor, Tier};
//! use lazarus_recovery::{RecoveryConfig, RecoveryService, SourceRegistry};
//! use lazarus_sources::{ScriptedSource, SourceAdapter};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), lazarus_recovery::RecoveryError> {
//! let config = RecoveryConfig::default();
//! let mirror: Arc<dyn SourceAdapter> = Arc::new(ScriptedSource::found("mirror", 0.95));
//! let registry = SourceRegistry::new(
//!     vec![(SourceDescriptor::new("mirror", "Community Mirror", Tier::new(1)), mirror)],
//!     config.circuit_breaker.clone(),
//! )?;
//!
//! let service = RecoveryService::new(registry, config)?;
//! let pack = service
//!     .search(&DatasetMetadata::new("Toxics Release Inventory", "EPA", "tri"))
//!     .await?;
//! assert_eq!(pack.status, PackStatus::Found);
//! assert_eq!(pack.chain_names(), vec!["Community Mirror"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod session;

pub use batch::{BatchCoordinator, DatasetSearch};
pub use config::{CircuitBreakerConfig, RateLimitConfig, RecoveryConfig};
pub use error::RecoveryError;
pub use metrics::BatchSummary;
pub use registry::{CircuitState, HealthSnapshot, SourceInfo, SourceRegistry, TierGroup};
pub use session::RecoverySession;

use lazarus_domain::{DatasetMetadata, ProvenancePack};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Library surface used by the CLI and other collaborators
#[derive(Debug, Clone)]
pub struct RecoveryService {
    registry: Arc<SourceRegistry>,
    session: RecoverySession,
}

impl RecoveryService {
    /// Create a service over a registry
    ///
    /// Fails with [`RecoveryError::Configuration`] when the config is invalid.
    pub fn new(registry: SourceRegistry, config: RecoveryConfig) -> Result<Self, RecoveryError> {
        config.validate()?;
        let registry = Arc::new(registry);
        let session = RecoverySession::new(registry.clone(), Arc::new(config));
        Ok(Self { registry, session })
    }

    /// Search for one dataset
    ///
    /// MISSING is a normal outcome; errors are reserved for failures of the
    /// search itself.
    pub async fn search(&self, dataset: &DatasetMetadata) -> Result<ProvenancePack, RecoveryError> {
        self.session.run(dataset).await
    }

    /// Search for one dataset until `cancel` fires
    pub async fn search_with_cancel(
        &self,
        dataset: &DatasetMetadata,
        cancel: CancellationToken,
    ) -> Result<ProvenancePack, RecoveryError> {
        self.session.run_with_cancel(dataset, cancel).await
    }

    /// Search for many datasets with at most `concurrency` sessions at once
    pub fn batch_search(
        &self,
        datasets: Vec<DatasetMetadata>,
        concurrency: usize,
    ) -> Result<ReceiverStream<ProvenancePack>, RecoveryError> {
        if concurrency == 0 {
            return Err(RecoveryError::Configuration(
                "batch concurrency must be positive".to_string(),
            ));
        }
        Ok(BatchCoordinator::new(self.session.clone()).run(datasets, concurrency))
    }

    /// Introspection of every registered source and its circuit
    pub fn list_sources(&self) -> Vec<SourceInfo> {
        self.registry.list_sources()
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }
}
