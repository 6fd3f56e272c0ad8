//! Internet Archive Wayback Machine adapter
//!
//! Looks up the capture of the last-known landing page closest to the date
//! the dataset was last seen.

use crate::http::ArchiveClient;
use crate::scoring::MatchEvidence;
use crate::{bounded_lookup, SourceAdapter, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use lazarus_domain::{Confidence, DatasetMetadata, RecoveryResult};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Default availability API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://archive.org/wayback/available";

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    #[serde(default)]
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    url: String,
    timestamp: String,
    #[serde(default)]
    status: Option<String>,
}

/// Wayback availability adapter
pub struct WaybackAdapter {
    source_id: String,
    endpoint: String,
    client: ArchiveClient,
}

impl WaybackAdapter {
    /// Create an adapter against `endpoint`
    pub fn new(
        source_id: impl Into<String>,
        endpoint: &str,
        client: ArchiveClient,
    ) -> Result<Self, SourceError> {
        Url::parse(endpoint)?;
        Ok(Self {
            source_id: source_id.into(),
            endpoint: endpoint.to_string(),
            client,
        })
    }

    fn lookup_url(&self, landing_url: &str, dataset: &DatasetMetadata) -> Result<Url, SourceError> {
        let mut params = vec![("url", landing_url.to_string())];
        if let Some(seen) = dataset.last_seen {
            params.push(("timestamp", seen.format("%Y%m%d").to_string()));
        }
        Ok(Url::parse_with_params(&self.endpoint, &params)?)
    }

    async fn lookup(
        &self,
        dataset: &DatasetMetadata,
        timeout: Duration,
    ) -> Result<RecoveryResult, SourceError> {
        // Nothing to look up without a landing page
        let Some(landing_url) = dataset.landing_url.as_deref() else {
            return Ok(RecoveryResult::not_found(&self.source_id)
                .with_metadata("reason", "no landing url"));
        };
        let url = self.lookup_url(landing_url, dataset)?;
        match self.client.get_json::<AvailabilityResponse>(&url, timeout).await? {
            Some(response) => self.evaluate(response),
            None => Ok(RecoveryResult::not_found(&self.source_id)),
        }
    }

    fn evaluate(&self, response: AvailabilityResponse) -> Result<RecoveryResult, SourceError> {
        let Some(snapshot) = response.archived_snapshots.closest.filter(|s| s.available) else {
            return Ok(RecoveryResult::not_found(&self.source_id));
        };

        let captured = parse_wayback_timestamp(&snapshot.timestamp).ok_or_else(|| {
            SourceError::MalformedResponse(format!("bad timestamp '{}'", snapshot.timestamp))
        })?;
        let http_ok = snapshot
            .status
            .as_deref()
            .is_some_and(|status| status.starts_with('2'));

        let evidence = if http_ok {
            MatchEvidence::identifier()
        } else {
            MatchEvidence::default()
        };

        let mut result = RecoveryResult::found(&self.source_id, &snapshot.url, self.score(&evidence))
            .with_capture_date(captured)
            .with_metadata("wayback_timestamp", &snapshot.timestamp);
        if let Some(status) = &snapshot.status {
            result = result.with_metadata("http_status", status);
        }
        Ok(result)
    }
}

/// Wayback timestamps are `YYYYMMDDhhmmss` in UTC
fn parse_wayback_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl SourceAdapter for WaybackAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> &'static str {
        "wayback"
    }

    async fn search(&self, dataset: &DatasetMetadata, timeout: Duration) -> RecoveryResult {
        bounded_lookup(&self.source_id, timeout, self.lookup(dataset, timeout)).await
    }

    /// A 2xx capture of the exact landing page is as good as an identifier
    /// match. Redirect or error captures only prove the page once existed.
    fn score(&self, evidence: &MatchEvidence) -> Confidence {
        if evidence.identifier_match {
            Confidence::new(0.96)
        } else {
            Confidence::new(0.45)
        }
    }
}
