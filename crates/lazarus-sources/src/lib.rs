//! Lazarus Source Adapters
//!
//! Pluggable integrations with external archival repositories.
//!
//! # Architecture
//!
//! Every archive is an implementation of one capability, [`SourceAdapter`],
//! registered by id rather than through a type hierarchy. An adapter turns
//! dataset metadata into a query, scores whatever the archive returns, and
//! hands back a [`RecoveryResult`]. Failures are data: timeouts, transport
//! errors and unparseable payloads come back as results with status ERROR.
//!
//! # Adapters
//!
//! - `CkanAdapter`: CKAN catalogs (data.gov mirrors, civic rescue catalogs)
//! - `WaybackAdapter`: Internet Archive captures of the last landing page
//! - `ZenodoAdapter`: Zenodo academic repository
//! - `DataverseAdapter`: Dataverse academic repositories
//! - `ScriptedSource`: Deterministic in-process source for testing
//!
//! # Examples
//!
//! ```
//! use lazarus_domain::{DatasetMetadata, RecoveryStatus};
//! use lazarus_sources::{ScriptedSource, SourceAdapter};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = ScriptedSource::found("mirror", 0.9);
//! let dataset = DatasetMetadata::new("Toxics Release Inventory", "EPA", "tri-2023");
//!
//! let result = source.search(&dataset, Duration::from_secs(5)).await;
//! assert_eq!(result.status, RecoveryStatus::Found);
//! assert_eq!(source.call_count(), 1);
//! # }
//! ```

#![warn(missing_docs)]

pub mod ckan;
pub mod dataverse;
pub mod error;
pub mod factory;
pub mod gate;
pub mod http;
pub mod scoring;
pub mod scripted;
pub mod wayback;
pub mod zenodo;

use async_trait::async_trait;
use lazarus_domain::{Confidence, DatasetMetadata, RecoveryResult};
use std::future::Future;
use std::time::Duration;

pub use ckan::CkanAdapter;
pub use dataverse::DataverseAdapter;
pub use error::SourceError;
pub use factory::{AdapterFactory, SourceKind};
pub use gate::DomainGate;
pub use http::ArchiveClient;
pub use scoring::MatchEvidence;
pub use scripted::{Script, ScriptedSource};
pub use wayback::WaybackAdapter;
pub use zenodo::ZenodoAdapter;

/// Capability shared by every recovery source
///
/// Implementations must return within `timeout` and must not panic or
/// propagate errors; anything that goes wrong becomes an ERROR result.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Id the adapter reports its results under
    fn source_id(&self) -> &str;

    /// Adapter kind (e.g., "ckan")
    fn kind(&self) -> &'static str;

    /// Search the archive for a surviving copy of the dataset
    async fn search(&self, dataset: &DatasetMetadata, timeout: Duration) -> RecoveryResult;

    /// Map match evidence to a confidence score
    ///
    /// The default uses the shared heuristic bands in [`scoring`]; adapters
    /// with their own notion of a match override it.
    fn score(&self, evidence: &MatchEvidence) -> Confidence {
        scoring::score(evidence)
    }
}

/// Run an adapter lookup under a hard deadline, folding errors into results
pub async fn bounded_lookup<F>(source_id: &str, timeout: Duration, lookup: F) -> RecoveryResult
where
    F: Future<Output = Result<RecoveryResult, SourceError>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::debug!("Source '{}' failed: {}", source_id, e);
            e.into_result(source_id)
        }
        Err(_) => SourceError::Timeout(format!("no answer within {:?}", timeout))
            .into_result(source_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazarus_domain::{FailureKind, RecoveryStatus};

    #[tokio::test(start_paused = true)]
    async fn test_bounded_lookup_times_out() {
        let result = bounded_lookup("slow", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(RecoveryResult::not_found("slow"))
        })
        .await;

        assert_eq!(result.status, RecoveryStatus::Error);
        assert_eq!(result.failure.unwrap().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_bounded_lookup_folds_errors() {
        let result = bounded_lookup("broken", Duration::from_secs(2), async {
            Err(SourceError::MalformedResponse("expected object".to_string()))
        })
        .await;

        assert_eq!(result.source_id, "broken");
        assert_eq!(result.failure.unwrap().kind, FailureKind::MalformedResponse);
    }
}
