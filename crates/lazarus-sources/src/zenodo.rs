//! Zenodo adapter
//!
//! Researchers often re-deposit copies of government datasets on Zenodo,
//! citing the original identifier as a related identifier.

use crate::http::ArchiveClient;
use crate::scoring::{self, MatchEvidence};
use crate::{bounded_lookup, SourceAdapter, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lazarus_domain::{DatasetMetadata, RecoveryResult};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Default records API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://zenodo.org/api/records";

const PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: serde_json::Value,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    links: RecordLinks,
    metadata: RecordMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RecordLinks {
    #[serde(default)]
    self_html: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordMetadata {
    title: String,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    creators: Vec<Creator>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    related_identifiers: Vec<RelatedIdentifier>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    affiliation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelatedIdentifier {
    identifier: String,
}

/// Zenodo records search adapter
pub struct ZenodoAdapter {
    source_id: String,
    endpoint: String,
    client: ArchiveClient,
}

impl ZenodoAdapter {
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

    fn search_url(&self, dataset: &DatasetMetadata) -> Result<Url, SourceError> {
        let title = dataset.title.trim();
        if title.is_empty() {
            return Err(SourceError::InvalidRequest("dataset has no title".into()));
        }
        let query = format!("\"{}\"", title.replace('"', ""));
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[("q", query), ("size", PAGE_SIZE.to_string())],
        )?)
    }

    async fn lookup(
        &self,
        dataset: &DatasetMetadata,
        timeout: Duration,
    ) -> Result<RecoveryResult, SourceError> {
        let url = self.search_url(dataset)?;
        match self.client.get_json::<RecordsResponse>(&url, timeout).await? {
            Some(response) => Ok(self.evaluate(dataset, response)),
            None => Ok(RecoveryResult::not_found(&self.source_id)),
        }
    }

    fn evaluate(&self, dataset: &DatasetMetadata, response: RecordsResponse) -> RecoveryResult {
        let best = response
            .hits
            .hits
            .iter()
            .map(|record| (record, self.score(&self.evidence(dataset, record))))
            .filter(|(_, confidence)| scoring::is_reportable(*confidence))
            .max_by(|a, b| a.1.cmp(&b.1));

        let Some((record, confidence)) = best else {
            return RecoveryResult::not_found(&self.source_id);
        };

        let record_id = match &record.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let landing = record
            .links
            .self_html
            .clone()
            .or_else(|| record.links.html.clone())
            .unwrap_or_else(|| format!("https://zenodo.org/records/{}", record_id));

        let mut result = RecoveryResult::found(&self.source_id, landing, confidence)
            .with_metadata("record_id", record_id);
        if let Some(doi) = &record.doi {
            result = result.with_metadata("doi", doi);
        }
        if let Some(published) = record
            .metadata
            .publication_date
            .as_deref()
            .and_then(parse_publication_date)
        {
            result = result.with_capture_date(published);
        }
        result
    }

    fn evidence(&self, dataset: &DatasetMetadata, record: &Record) -> MatchEvidence {
        let meta = &record.metadata;
        let agencies = meta
            .creators
            .iter()
            .flat_map(|c| [c.name.as_deref(), c.affiliation.as_deref()])
            .flatten();

        let identifier_match = meta
            .related_identifiers
            .iter()
            .map(|r| r.identifier.as_str())
            .chain(record.doi.as_deref())
            .any(|id| {
                scoring::same_identifier(id, &dataset.origin_id)
                    || dataset
                        .landing_url
                        .as_deref()
                        .is_some_and(|landing| scoring::same_identifier(id, landing))
            });

        MatchEvidence::compare(dataset, &meta.title, agencies, &meta.keywords)
            .with_identifier_match(identifier_match)
    }
}

fn parse_publication_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl SourceAdapter for ZenodoAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> &'static str {
        "zenodo"
    }

    async fn search(&self, dataset: &DatasetMetadata, timeout: Duration) -> RecoveryResult {
        bounded_lookup(&self.source_id, timeout, self.lookup(dataset, timeout)).await
    }
}
