//! Lazarus Domain Layer
//!
//! This crate contains the data model for dataset recovery. It performs no I/O
//! and owns no mutable shared state; the adapters, registry and sessions that
//! drive a search live in other crates.
//!
//! ## Key Concepts
//!
//! - **DatasetMetadata**: What we know about a dataset that vanished from its origin
//! - **Tier**: Priority group of recovery sources (lower is searched first)
//! - **Confidence**: Source-defined match score in [0, 1], opaque to the orchestrator
//! - **RecoveryResult**: The outcome of one adapter invocation
//! - **ProvenancePack**: The assembled, exportable record of one dataset's search
//!
//! ## Architecture
//!
//! - Only `serde` and `chrono` as external dependencies
//! - Pure business logic only
//! - The provenance assembler is a pure function and testable without a network

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod confidence;
pub mod metadata;
pub mod provenance;
pub mod result;
pub mod source;
pub mod tier;

// Re-exports for convenience
pub use confidence::Confidence;
pub use metadata::DatasetMetadata;
pub use provenance::{
    ChainLink, LinkOutcome, PackStatus, ProvenancePack, SelectionPolicy, SourceAttempt,
};
pub use result::{FailureKind, RecoveryResult, RecoveryStatus, SourceFailure};
pub use source::SourceDescriptor;
pub use tier::Tier;
