//! Per-domain call spacing
//!
//! Archival APIs are shared, volunteer-run or rate limited. During batch runs
//! many sessions hit the same hosts at once, so every adapter built by one
//! [`crate::AdapterFactory`] shares a single gate keyed by host name.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::time::Duration;

/// Default minimum spacing between calls to one domain
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Minimum inter-call spacing per external domain
pub struct DomainGate {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    min_interval: Duration,
}

impl DomainGate {
    /// Create a gate allowing one call per `min_interval` per domain
    ///
    /// A zero interval disables gating.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(RateLimiter::keyed);
        Self {
            limiter,
            min_interval,
        }
    }

    /// Create a gate that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured spacing
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call to `domain` is allowed
    pub async fn wait(&self, domain: &str) {
        if let Some(limiter) = &self.limiter {
            limiter.until_key_ready(&domain.to_lowercase()).await;
        }
    }

    /// Take a slot for `domain` if one is free right now
    pub fn try_pass(&self, domain: &str) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check_key(&domain.to_lowercase()).is_ok(),
            None => true,
        }
    }
}

impl Default for DomainGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl std::fmt::Debug for DomainGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainGate")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_is_per_domain() {
        let gate = DomainGate::new(Duration::from_secs(60));
        assert!(gate.try_pass("archive.org"));
        assert!(!gate.try_pass("archive.org"));
        assert!(!gate.try_pass("ARCHIVE.org"));
        assert!(gate.try_pass("zenodo.org"));
    }

    #[test]
    fn test_unlimited_gate() {
        let gate = DomainGate::unlimited();
        for _ in 0..10 {
            assert!(gate.try_pass("archive.org"));
        }
    }

    #[tokio::test]
    async fn test_wait_returns_for_fresh_domain() {
        let gate = DomainGate::new(Duration::from_secs(60));
        gate.wait("catalog.data.gov").await;
        assert!(!gate.try_pass("catalog.data.gov"));
    }
}
