//! Shared HTTP plumbing for archive adapters

use crate::{DomainGate, SourceError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// User agent sent to every archive
pub const USER_AGENT: &str = concat!("lazarus/", env!("CARGO_PKG_VERSION"), " (dataset recovery)");

/// HTTP client shared by the adapters of one factory
#[derive(Clone)]
pub struct ArchiveClient {
    client: reqwest::Client,
    gate: Arc<DomainGate>,
}

impl ArchiveClient {
    /// Create a client that spaces calls through `gate`
    pub fn new(gate: Arc<DomainGate>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::InvalidRequest(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client, gate })
    }

    /// GET a JSON document
    ///
    /// Waits on the domain gate first; the wait counts against `timeout`
    /// because callers wrap this in [`crate::bounded_lookup`]. Returns
    /// `Ok(None)` on 404.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<Option<T>, SourceError> {
        let host = url
            .host_str()
            .ok_or_else(|| SourceError::InvalidRequest(format!("no host in {}", url)))?;
        self.gate.wait(host).await;

        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).timeout(timeout).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Unreachable(format!("HTTP {} from {}", status, host)));
        }

        let body = response.bytes().await?;
        let document = serde_json::from_slice(&body)?;
        Ok(Some(document))
    }
}

impl std::fmt::Debug for ArchiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveClient").field("gate", &self.gate).finish()
    }
}
