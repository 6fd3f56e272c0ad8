//! Error types for the recovery orchestrator
//!
//! Per-source failures are not errors here: they arrive as ERROR results and
//! feed the circuit breaker. These variants cover what the caller must see.

use thiserror::Error;

/// Errors that can occur while configuring or running a recovery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    /// Invalid configuration (no enabled sources, duplicate ids, bad thresholds)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A health update named a source the registry does not know
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Unexpected failure inside a session
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<lazarus_sources::SourceError> for RecoveryError {
    fn from(e: lazarus_sources::SourceError) -> Self {
        RecoveryError::Configuration(e.to_string())
    }
}
