//! Dataverse adapter (Harvard Dataverse and other installations)

use crate::http::ArchiveClient;
use crate::scoring::{self, MatchEvidence};
use crate::{bounded_lookup, SourceAdapter, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazarus_domain::{DatasetMetadata, RecoveryResult};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    #[serde(default)]
    global_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Dataverse search API adapter
pub struct DataverseAdapter {
    source_id: String,
    base_url: String,
    client: ArchiveClient,
}

impl DataverseAdapter {
    /// Create an adapter for the installation at `base_url`
    pub fn new(
        source_id: impl Into<String>,
        base_url: &str,
        client: ArchiveClient,
    ) -> Result<Self, SourceError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            source_id: source_id.into(),
            base_url,
            client,
        })
    }

    fn search_url(&self, dataset: &DatasetMetadata) -> Result<Url, SourceError> {
        if dataset.title.trim().is_empty() {
            return Err(SourceError::InvalidRequest("dataset has no title".into()));
        }
        Ok(Url::parse_with_params(
            &format!("{}/api/search", self.base_url),
            &[
                ("q", dataset.title.clone()),
                ("type", "dataset".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ],
        )?)
    }

    async fn lookup(
        &self,
        dataset: &DatasetMetadata,
        timeout: Duration,
    ) -> Result<RecoveryResult, SourceError> {
        let url = self.search_url(dataset)?;
        match self.client.get_json::<SearchResponse>(&url, timeout).await? {
            Some(response) => self.evaluate(dataset, response),
            None => Ok(RecoveryResult::not_found(&self.source_id)),
        }
    }

    fn evaluate(
        &self,
        dataset: &DatasetMetadata,
        response: SearchResponse,
    ) -> Result<RecoveryResult, SourceError> {
        if response.status != "OK" {
            return Err(SourceError::Unreachable(format!(
                "Dataverse status {}: {}",
                response.status,
                response.message.unwrap_or_default()
            )));
        }
        let items = response
            .data
            .ok_or_else(|| SourceError::MalformedResponse("missing data".into()))?
            .items;

        let best = items
            .iter()
            .map(|item| (item, self.score(&self.evidence(dataset, item))))
            .filter(|(_, confidence)| scoring::is_reportable(*confidence))
            .max_by(|a, b| a.1.cmp(&b.1));

        let Some((item, confidence)) = best else {
            return Ok(RecoveryResult::not_found(&self.source_id));
        };

        let landing = match (&item.url, &item.global_id) {
            (Some(url), _) => url.clone(),
            (None, Some(id)) => format!(
                "{}/dataset.xhtml?persistentId={}",
                self.base_url, id
            ),
            (None, None) => {
                return Err(SourceError::MalformedResponse(format!(
                    "item '{}' has neither url nor global_id",
                    item.name
                )))
            }
        };

        let mut result = RecoveryResult::found(&self.source_id, landing, confidence);
        if let Some(id) = &item.global_id {
            result = result.with_metadata("global_id", id);
        }
        if let Some(publisher) = &item.publisher {
            result = result.with_metadata("publisher", publisher);
        }
        if let Some(published) = item
            .published_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        {
            result = result.with_capture_date(published.with_timezone(&Utc));
        }
        Ok(result)
    }

    fn evidence(&self, dataset: &DatasetMetadata, item: &SearchItem) -> MatchEvidence {
        let agencies = item
            .publisher
            .as_deref()
            .into_iter()
            .chain(item.authors.iter().map(String::as_str));
        let identifier_match = item
            .global_id
            .as_deref()
            .is_some_and(|id| scoring::same_identifier(id, &dataset.origin_id));

        MatchEvidence::compare(dataset, &item.name, agencies, &item.keywords)
            .with_identifier_match(identifier_match)
    }
}

#[async_trait]
impl SourceAdapter for DataverseAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> &'static str {
        "dataverse"
    }

    async fn search(&self, dataset: &DatasetMetadata, timeout: Duration) -> RecoveryResult {
        bounded_lookup(&self.source_id, timeout, self.lookup(dataset, timeout)).await
    }
}
