//! CKAN catalog adapter
//!
//! data.gov and most civic data-rescue catalogs run CKAN, so one adapter
//! covers catalog mirrors and rescue catalogs alike; each configured source
//! points it at a different base URL.

use crate::http::ArchiveClient;
use crate::scoring::{self, MatchEvidence};
use crate::{bounded_lookup, SourceAdapter, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use lazarus_domain::{DatasetMetadata, RecoveryResult};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Default number of packages requested per search
pub const DEFAULT_ROWS: u32 = 10;

#[derive(Debug, Deserialize)]
struct CkanResponse {
    success: bool,
    #[serde(default)]
    result: Option<CkanSearchResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CkanSearchResult {
    #[serde(default)]
    results: Vec<CkanPackage>,
}

#[derive(Debug, Deserialize)]
struct CkanPackage {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    organization: Option<CkanOrganization>,
    #[serde(default)]
    extras: Vec<CkanExtra>,
    #[serde(default)]
    tags: Vec<CkanTag>,
    #[serde(default)]
    resources: Vec<CkanResource>,
    #[serde(default)]
    metadata_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CkanOrganization {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CkanExtra {
    key: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CkanTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CkanResource {
    #[serde(default)]
    url: Option<String>,
}

/// CKAN `package_search` adapter
pub struct CkanAdapter {
    source_id: String,
    base_url: String,
    rows: u32,
    client: ArchiveClient,
}

impl CkanAdapter {
    /// Create an adapter for the catalog at `base_url`
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
            rows: DEFAULT_ROWS,
            client,
        })
    }

    /// Set the number of packages requested per search
    pub fn with_rows(mut self, rows: u32) -> Self {
        self.rows = rows.max(1);
        self
    }

    fn search_url(&self, dataset: &DatasetMetadata) -> Result<Url, SourceError> {
        if dataset.title.trim().is_empty() && dataset.origin_id.trim().is_empty() {
            return Err(SourceError::InvalidRequest("dataset has neither title nor id".into()));
        }
        let title = escape_solr(dataset.title.trim());
        let id = dataset.origin_id.trim();
        let query = match (title.is_empty(), id.is_empty()) {
            (_, true) => title,
            (true, false) => format!("name:{}", quote_solr(id)),
            (false, false) => format!("{} OR name:{}", title, quote_solr(id)),
        };
        let endpoint = format!("{}/api/3/action/package_search", self.base_url);
        Ok(Url::parse_with_params(
            &endpoint,
            &[("q", query), ("rows", self.rows.to_string())],
        )?)
    }

    async fn lookup(
        &self,
        dataset: &DatasetMetadata,
        timeout: Duration,
    ) -> Result<RecoveryResult, SourceError> {
        let url = self.search_url(dataset)?;
        match self.client.get_json::<CkanResponse>(&url, timeout).await? {
            Some(response) => self.evaluate(dataset, response),
            None => Ok(RecoveryResult::not_found(&self.source_id)),
        }
    }

    fn evaluate(
        &self,
        dataset: &DatasetMetadata,
        response: CkanResponse,
    ) -> Result<RecoveryResult, SourceError> {
        if !response.success {
            let detail = response
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "success=false".to_string());
            return Err(SourceError::Unreachable(format!("CKAN error: {}", detail)));
        }
        let packages = response
            .result
            .ok_or_else(|| SourceError::MalformedResponse("missing result".into()))?
            .results;

        let best = packages
            .iter()
            .map(|package| (package, self.score(&self.evidence(dataset, package))))
            .filter(|(_, confidence)| scoring::is_reportable(*confidence))
            .max_by(|a, b| a.1.cmp(&b.1));

        let Some((package, confidence)) = best else {
            return Ok(RecoveryResult::not_found(&self.source_id));
        };

        let mut result = RecoveryResult::found(
            &self.source_id,
            format!("{}/dataset/{}", self.base_url, package.name),
            confidence,
        )
        .with_metadata("package", &package.name)
        .with_metadata("resources", package.resources.len().to_string());

        if let Some(org) = package.organization.as_ref().and_then(|o| o.title.as_deref()) {
            result = result.with_metadata("organization", org);
        }
        if let Some(first) = package.resources.iter().find_map(|r| r.url.as_deref()) {
            result = result.with_metadata("first_resource", first);
        }
        if let Some(modified) = package.metadata_modified.as_deref().and_then(parse_ckan_timestamp) {
            result = result.with_capture_date(modified);
        }
        Ok(result)
    }

    fn evidence(&self, dataset: &DatasetMetadata, package: &CkanPackage) -> MatchEvidence {
        let title = package.title.as_deref().unwrap_or(&package.name);
        let tags: Vec<String> = package.tags.iter().map(|t| t.name.clone()).collect();
        let agency = package.organization.as_ref().and_then(|o| o.title.as_deref());

        let identifier_match = scoring::same_identifier(&package.name, &dataset.origin_id)
            || package.extras.iter().any(|extra| {
                extra.key == "identifier"
                    && extra
                        .value
                        .as_str()
                        .is_some_and(|v| scoring::same_identifier(v, &dataset.origin_id))
            });

        MatchEvidence::compare(dataset, title, agency, &tags).with_identifier_match(identifier_match)
    }
}

/// CKAN writes naive UTC timestamps with optional fractional seconds
fn parse_ckan_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.with_timezone(&Utc)))
}

#[async_trait]
impl SourceAdapter for CkanAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> &'static str {
        "ckan"
    }

    async fn search(&self, dataset: &DatasetMetadata, timeout: Duration) -> RecoveryResult {
        bounded_lookup(&self.source_id, timeout, self.lookup(dataset, timeout)).await
    }
}

/// Backslash-escape Solr query syntax so free text is searched as words.
fn escape_solr(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
                | '*' | '?' | ':' | '\\' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Quote a value as a single Solr phrase.
fn quote_solr(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
