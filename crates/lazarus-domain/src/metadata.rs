//! Dataset metadata - the immutable input of a recovery search

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Metadata for a dataset that has disappeared from its origin
///
/// Created by the caller (monitoring, CSV import, CLI) and never mutated by
/// the orchestrator. Adapters read it to build their queries and to score
/// candidates.
///
/// # Examples
///
/// ```
/// use lazarus_domain::DatasetMetadata;
///
/// let dataset = DatasetMetadata::new(
///     "Fatality Analysis Reporting System",
///     "National Highway Traffic Safety Administration",
///     "fars-2022",
/// )
/// .with_landing_url("https://www.nhtsa.gov/fars")
/// .with_keywords(["traffic", "safety"]);
///
/// assert_eq!(dataset.keywords.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Dataset title as published by the agency
    pub title: String,

    /// Publishing agency
    pub agency: String,

    /// Identifier at the origin (catalog id, DOI, package name)
    pub origin_id: String,

    /// Last known landing page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_url: Option<String>,

    /// Last date the dataset was seen at its origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDate>,

    /// Keywords / tags
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

impl DatasetMetadata {
    /// Create metadata with the three required fields
    pub fn new(
        title: impl Into<String>,
        agency: impl Into<String>,
        origin_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            agency: agency.into(),
            origin_id: origin_id.into(),
            landing_url: None,
            last_seen: None,
            keywords: BTreeSet::new(),
        }
    }

    /// Set the last known landing URL
    pub fn with_landing_url(mut self, url: impl Into<String>) -> Self {
        self.landing_url = Some(url.into());
        self
    }

    /// Set the last-seen date
    pub fn with_last_seen(mut self, date: NaiveDate) -> Self {
        self.last_seen = Some(date);
        self
    }

    /// Add keywords (lowercased, blanks dropped)
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.extend(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    /// Short label for logs and tables
    pub fn label(&self) -> String {
        if self.origin_id.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, self.origin_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_normalized() {
        let dataset = DatasetMetadata::new("t", "a", "id").with_keywords(["  Climate ", "climate", ""]);
        assert_eq!(dataset.keywords.len(), 1);
        assert!(dataset.keywords.contains("climate"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{"title": "Census Tracts", "agency": "Census Bureau", "origin_id": "tracts-2020"}"#;
        let dataset: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.origin_id, "tracts-2020");
        assert!(dataset.landing_url.is_none());
        assert!(dataset.keywords.is_empty());
    }

    #[test]
    fn test_deserialize_last_seen() {
        let json = r#"{"title": "t", "agency": "a", "origin_id": "x", "last_seen": "2025-01-20"}"#;
        let dataset: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.last_seen, NaiveDate::from_ymd_opt(2025, 1, 20));
    }

    #[test]
    fn test_label() {
        assert_eq!(DatasetMetadata::new("Title", "A", "").label(), "Title");
        assert_eq!(DatasetMetadata::new("Title", "A", "x1").label(), "Title (x1)");
    }
}
