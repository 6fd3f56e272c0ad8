//! Adapter construction from configuration

use crate::{
    ckan, wayback, zenodo, ArchiveClient, CkanAdapter, DataverseAdapter, DomainGate,
    SourceAdapter, SourceError, WaybackAdapter, ZenodoAdapter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Adapter kind and its connection settings, as written in config files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// CKAN catalog
    Ckan {
        /// Catalog root, e.g. `https://catalog.data.gov`
        base_url: String,
        /// Packages requested per search
        #[serde(default = "default_rows")]
        rows: u32,
    },
    /// Wayback Machine availability API
    Wayback {
        /// API endpoint
        #[serde(default = "default_wayback_endpoint")]
        endpoint: String,
    },
    /// Zenodo records API
    Zenodo {
        /// API endpoint
        #[serde(default = "default_zenodo_endpoint")]
        endpoint: String,
    },
    /// Dataverse installation
    Dataverse {
        /// Installation root, e.g. `https://dataverse.harvard.edu`
        base_url: String,
    },
}

fn default_rows() -> u32 {
    ckan::DEFAULT_ROWS
}

fn default_wayback_endpoint() -> String {
    wayback::DEFAULT_ENDPOINT.to_string()
}

fn default_zenodo_endpoint() -> String {
    zenodo::DEFAULT_ENDPOINT.to_string()
}

impl SourceKind {
    /// Kind name as written in config
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Ckan { .. } => "ckan",
            SourceKind::Wayback { .. } => "wayback",
            SourceKind::Zenodo { .. } => "zenodo",
            SourceKind::Dataverse { .. } => "dataverse",
        }
    }
}

/// Builds adapters that share one HTTP client and one domain gate
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    client: ArchiveClient,
}

impl AdapterFactory {
    /// Create a factory whose adapters are spaced by `gate`
    pub fn new(gate: Arc<DomainGate>) -> Result<Self, SourceError> {
        Ok(Self {
            client: ArchiveClient::new(gate)?,
        })
    }

    /// Build the adapter for one configured source
    pub fn build(
        &self,
        source_id: &str,
        kind: &SourceKind,
    ) -> Result<Arc<dyn SourceAdapter>, SourceError> {
        let client = self.client.clone();
        let adapter: Arc<dyn SourceAdapter> = match kind {
            SourceKind::Ckan { base_url, rows } => {
                Arc::new(CkanAdapter::new(source_id, base_url, client)?.with_rows(*rows))
            }
            SourceKind::Wayback { endpoint } => {
                Arc::new(WaybackAdapter::new(source_id, endpoint, client)?)
            }
            SourceKind::Zenodo { endpoint } => {
                Arc::new(ZenodoAdapter::new(source_id, endpoint, client)?)
            }
            SourceKind::Dataverse { base_url } => {
                Arc::new(DataverseAdapter::new(source_id, base_url, client)?)
            }
        };
        tracing::debug!("Built {} adapter for source '{}'", kind.name(), source_id);
        Ok(adapter)
    }
}
