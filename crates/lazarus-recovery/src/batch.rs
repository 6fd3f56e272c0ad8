//! Batch coordinator: a bounded worker pool over recovery sessions
//!
//! Workers pull datasets from a shared queue and run each session in its own
//! task, so a panic or error in one session becomes an ERROR pack for that
//! dataset instead of ending the batch. Packs go out through one channel
//! whose receiver is the single owner of the output. Dropping the receiver
//! aborts the sessions in flight.

use crate::metrics::BatchSummary;
use crate::session::RecoverySession;
use crate::RecoveryError;
use async_trait::async_trait;
use lazarus_domain::{DatasetMetadata, ProvenancePack};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// One dataset's search, as run by a batch worker
#[async_trait]
pub trait DatasetSearch: Send + Sync {
    /// Search for one dataset
    async fn search(&self, dataset: &DatasetMetadata) -> Result<ProvenancePack, RecoveryError>;
}

#[async_trait]
impl DatasetSearch for RecoverySession {
    async fn search(&self, dataset: &DatasetMetadata) -> Result<ProvenancePack, RecoveryError> {
        self.run(dataset).await
    }
}

/// Drives many recovery sessions concurrently
///
/// # Examples
///
/// ```
/// use lazarus_domain::{DatasetMetadata, SourceDescriptor, Tier};
/// use lazarus_recovery::{BatchCoordinator, RecoveryConfig, RecoverySession, SourceRegistry};
/// use lazarus_sources::{ScriptedSource, SourceAdapter};
/// use std::sync::Arc;
/// use tokio_stream::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = RecoveryConfig::default();
/// let source: Arc<dyn SourceAdapter> = Arc::new(ScriptedSource::found("mirror", 0.9));
/// let registry = SourceRegistry::new(
///     vec![(SourceDescriptor::new("mirror", "Mirror", Tier::new(1)), source)],
///     config.circuit_breaker.clone(),
/// )
/// .unwrap();
/// let session = RecoverySession::new(Arc::new(registry), Arc::new(config));
///
/// let datasets = vec![
///     DatasetMetadata::new("Air Quality System", "EPA", "aqs"),
///     DatasetMetadata::new("National Water Information System", "USGS", "nwis"),
/// ];
/// let packs: Vec<_> = BatchCoordinator::new(session)
///     .run(datasets, 2)
///     .collect()
///     .await;
/// assert_eq!(packs.len(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct BatchCoordinator {
    search: Arc<dyn DatasetSearch>,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator").finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    /// Create a coordinator running each dataset through `search`
    pub fn new(search: impl DatasetSearch + 'static) -> Self {
        Self {
            search: Arc::new(search),
        }
    }

    /// Start a batch and stream its packs in completion order
    ///
    /// Yields exactly one pack per input. `concurrency` is clamped to at
    /// least one worker. Must be called inside a Tokio runtime.
    pub fn run(&self, datasets: Vec<DatasetMetadata>, concurrency: usize) -> ReceiverStream<ProvenancePack> {
        let job_id = Uuid::now_v7();
        let total = datasets.len();
        let workers = concurrency.max(1).min(total.max(1));
        let (tx, rx) = mpsc::channel(workers * 2);
        let queue = Arc::new(Mutex::new(VecDeque::from(datasets)));
        let summary = Arc::new(Mutex::new(BatchSummary::new()));

        tracing::info!(
            "Batch {} started: {} datasets, {} workers",
            job_id,
            total,
            workers
        );

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(run_worker(
                worker,
                self.search.clone(),
                queue.clone(),
                tx.clone(),
                summary.clone(),
            ));
        }
        drop(tx);

        let started = tokio::time::Instant::now();
        tokio::spawn(async move {
            while let Some(joined) = pool.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Batch {} worker failed: {}", job_id, e);
                }
            }
            let mut summary = summary.lock().await;
            summary.elapsed = started.elapsed();
            tracing::info!("Batch {} finished.\n{}", job_id, summary.summary());
        });

        ReceiverStream::new(rx)
    }
}

async fn run_worker(
    worker: usize,
    search: Arc<dyn DatasetSearch>,
    queue: Arc<Mutex<VecDeque<DatasetMetadata>>>,
    tx: mpsc::Sender<ProvenancePack>,
    summary: Arc<Mutex<BatchSummary>>,
) {
    while !tx.is_closed() {
        let Some(dataset) = queue.lock().await.pop_front() else {
            break;
        };
        tracing::debug!("Worker {} picked up {}", worker, dataset.label());

        let search = search.clone();
        let input = dataset.clone();
        let mut handle = tokio::spawn(async move { search.search(&input).await });

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = tx.closed() => {
                handle.abort();
                tracing::warn!("Batch receiver dropped; worker {} stopping", worker);
                break;
            }
        };

        let pack = match joined {
            Ok(Ok(pack)) => pack,
            Ok(Err(e)) => {
                tracing::warn!("Search for {} failed: {}", dataset.label(), e);
                ProvenancePack::failed(dataset, e.to_string())
            }
            Err(e) => {
                tracing::error!("Search for {} panicked: {}", dataset.label(), e);
                ProvenancePack::failed(dataset, format!("session panicked: {}", e))
            }
        };

        summary.lock().await.record(&pack);
        if tx.send(pack).await.is_err() {
            tracing::warn!("Batch receiver dropped; worker {} stopping", worker);
            break;
        }
    }
}
