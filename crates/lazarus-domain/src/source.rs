//! Static description of a registered recovery source

use crate::Tier;
use std::time::Duration;

/// Default per-call timeout for a source
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration-derived description of a recovery source
///
/// Registered once at startup and immutable afterwards; only the source's
/// health changes at runtime, and that lives in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Unique source id (e.g., "wayback", "datagov-catalog")
    pub id: String,

    /// Display name used in provenance chains
    pub name: String,

    /// Adapter kind (e.g., "ckan", "wayback")
    pub kind: String,

    /// Priority tier
    pub tier: Tier,

    /// Whether the source takes part in searches
    pub enabled: bool,

    /// Upper bound for one call
    pub timeout: Duration,
}

impl SourceDescriptor {
    /// Create an enabled source with the default timeout
    pub fn new(id: impl Into<String>, name: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: "custom".to_string(),
            tier,
            enabled: true,
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Set the adapter kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
