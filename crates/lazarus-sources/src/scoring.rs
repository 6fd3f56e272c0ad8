//! Confidence heuristics shared by the archive adapters
//!
//! | evidence | band |
//! |---|---|
//! | exact identifier match | 0.95 - 1.00 |
//! | fuzzy title + agency match | 0.60 - 0.85 |
//! | fuzzy title only | 0.40 - 0.60 |
//! | weaker title resemblance | below 0.30 |
//!
//! Keyword overlap moves a score up inside its band, never across bands.

use lazarus_domain::{Confidence, DatasetMetadata};

/// Title similarity at which a candidate counts as a fuzzy match
pub const TITLE_MATCH_FLOOR: f64 = 0.75;

/// Agency similarity at which the publisher counts as the same agency
pub const AGENCY_MATCH_FLOOR: f64 = 0.7;

/// Scores below this are not reported as candidates at all
pub const REPORTABLE_FLOOR: f64 = 0.2;

/// What an adapter learned when comparing one candidate to the dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchEvidence {
    /// The archive's identifier equals the origin identifier or landing URL
    pub identifier_match: bool,
    /// Similarity of the titles in [0, 1]
    pub title_similarity: f64,
    /// Similarity of the publishing agency, when the archive records one
    pub agency_similarity: Option<f64>,
    /// Fraction of the dataset's keywords found on the candidate
    pub keyword_overlap: f64,
}

impl MatchEvidence {
    /// Evidence of an exact identifier match
    pub fn identifier() -> Self {
        Self {
            identifier_match: true,
            title_similarity: 1.0,
            ..Default::default()
        }
    }

    /// Compare a candidate record against the dataset
    pub fn compare<'a, I>(
        dataset: &DatasetMetadata,
        candidate_title: &str,
        candidate_agencies: I,
        candidate_keywords: &[String],
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let agency_similarity = candidate_agencies
            .into_iter()
            .map(|agency| similarity(&dataset.agency, agency))
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))));

        Self {
            identifier_match: false,
            title_similarity: similarity(&dataset.title, candidate_title),
            agency_similarity,
            keyword_overlap: keyword_overlap(dataset, candidate_keywords),
        }
    }

    /// Mark the evidence as an identifier match
    pub fn with_identifier_match(mut self, matched: bool) -> Self {
        self.identifier_match = self.identifier_match || matched;
        self
    }
}

/// Default scoring bands
pub fn score(evidence: &MatchEvidence) -> Confidence {
    if evidence.identifier_match {
        return Confidence::new(0.95 + 0.05 * evidence.title_similarity);
    }

    let title = evidence.title_similarity;
    if title < TITLE_MATCH_FLOOR {
        return Confidence::new(title * 0.3);
    }

    // Position inside the band, 0 at the floor and 1 for identical titles
    let t = (title - TITLE_MATCH_FLOOR) / (1.0 - TITLE_MATCH_FLOOR);
    let agency_matches = evidence
        .agency_similarity
        .is_some_and(|s| s >= AGENCY_MATCH_FLOOR);

    let (low, high) = if agency_matches { (0.6, 0.85) } else { (0.4, 0.6) };
    let span = high - low;
    let base = low + span * 0.8 * t;
    let bonus = span * 0.2 * evidence.keyword_overlap.clamp(0.0, 1.0);
    Confidence::new((base + bonus).min(high))
}

/// Whether a score is worth reporting as a candidate
pub fn is_reportable(confidence: Confidence) -> bool {
    confidence.meets(REPORTABLE_FLOOR)
}

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two free-text strings in [0, 1]
///
/// Takes the better of bigram overlap (robust to word reordering) and
/// normalized edit distance (robust to small typos).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::sorensen_dice(&a, &b).max(strsim::normalized_levenshtein(&a, &b))
}

/// Fraction of the dataset's keywords present on the candidate
pub fn keyword_overlap(dataset: &DatasetMetadata, candidate_keywords: &[String]) -> f64 {
    if dataset.keywords.is_empty() {
        return 0.0;
    }
    let candidate: Vec<String> = candidate_keywords.iter().map(|k| normalize(k)).collect();
    let shared = dataset
        .keywords
        .iter()
        .filter(|k| candidate.contains(&normalize(k)))
        .count();
    shared as f64 / dataset.keywords.len() as f64
}

/// Compare identifiers loosely (case, surrounding whitespace, `doi:` prefix)
pub fn same_identifier(a: &str, b: &str) -> bool {
    fn clean(s: &str) -> String {
        let s = s.trim().to_lowercase();
        let s = s.strip_prefix("doi:").unwrap_or(&s);
        let s = s.strip_prefix("https://doi.org/").unwrap_or(s);
        s.trim_end_matches('/').to_string()
    }
    let (a, b) = (clean(a), clean(b));
    !a.is_empty() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetMetadata {
        DatasetMetadata::new(
            "National Flood Hazard Layer",
            "Federal Emergency Management Agency",
            "nfhl",
        )
        .with_keywords(["flood", "hazard"])
    }

    #[test]
    fn test_identifier_band() {
        let c = score(&MatchEvidence::identifier());
        assert!(c.meets(0.95));
    }

    #[test]
    fn test_title_and_agency_band() {
        let evidence = MatchEvidence::compare(
            &dataset(),
            "National Flood Hazard Layer (NFHL)",
            ["Federal Emergency Management Agency"],
            &[],
        );
        let c = score(&evidence).value();
        assert!((0.6..=0.85).contains(&c), "got {}", c);
    }

    #[test]
    fn test_title_only_band() {
        let evidence = MatchEvidence::compare(
            &dataset(),
            "National Flood Hazard Layer",
            ["Some University Library"],
            &[],
        );
        let c = score(&evidence).value();
        assert!((0.4..=0.6).contains(&c), "got {}", c);
    }

    #[test]
    fn test_unrelated_title_is_low() {
        let evidence = MatchEvidence::compare(&dataset(), "Bird migration counts", None, &[]);
        assert!(score(&evidence).value() < 0.3);
    }

    #[test]
    fn test_keywords_stay_inside_band() {
        let with_keywords = MatchEvidence::compare(
            &dataset(),
            "National Flood Hazard Layer",
            None,
            &["Flood".to_string(), "hazard".to_string()],
        );
        let without = MatchEvidence::compare(&dataset(), "National Flood Hazard Layer", None, &[]);
        assert!(score(&with_keywords) > score(&without));
        assert!(score(&with_keywords).value() <= 0.6);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("Census  Tracts!", "census tracts"), 1.0);
        assert_eq!(similarity("", "anything"), 0.0);
        assert!(similarity("Hazard Layer Flood", "Flood Hazard Layer") > 0.75);
    }

    #[test]
    fn test_same_identifier() {
        assert!(same_identifier("doi:10.5281/ZENODO.1", "10.5281/zenodo.1"));
        assert!(same_identifier("https://doi.org/10.7910/DVN/ABC", "doi:10.7910/dvn/abc"));
        assert!(!same_identifier("", ""));
        assert!(!same_identifier("a", "b"));
    }
}
