//! Error types for source adapters
//!
//! These never cross the adapter boundary: [`SourceError::into_result`] turns
//! each one into an ERROR [`RecoveryResult`].

use lazarus_domain::{FailureKind, RecoveryResult};
use thiserror::Error;

/// Errors that can occur while querying an archive
#[derive(Error, Debug)]
pub enum SourceError {
    /// The call did not finish in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Network, DNS or non-success HTTP response
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// The archive answered with something we cannot parse
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The dataset metadata cannot be turned into a query for this archive
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// Failure category recorded in the result
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Timeout(_) => FailureKind::Timeout,
            SourceError::Unreachable(_) => FailureKind::Unreachable,
            SourceError::MalformedResponse(_) => FailureKind::MalformedResponse,
            SourceError::InvalidRequest(_) => FailureKind::InvalidRequest,
        }
    }

    /// Convert into an ERROR result for the given source
    pub fn into_result(self, source_id: &str) -> RecoveryResult {
        RecoveryResult::error(source_id, self.kind(), self.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout(e.to_string())
        } else if e.is_decode() {
            SourceError::MalformedResponse(e.to_string())
        } else if e.is_status() {
            match e.status() {
                Some(status) => SourceError::Unreachable(format!("HTTP {}", status)),
                None => SourceError::Unreachable(e.to_string()),
            }
        } else if e.is_builder() {
            SourceError::InvalidRequest(e.to_string())
        } else {
            SourceError::Unreachable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::MalformedResponse(e.to_string())
    }
}

impl From<url::ParseError> for SourceError {
    fn from(e: url::ParseError) -> Self {
        SourceError::InvalidRequest(format!("bad URL: {}", e))
    }
}
