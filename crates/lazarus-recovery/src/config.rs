//! Configuration for recovery sessions
//!
//! Thresholds, timeouts, circuit-breaker and rate-limit settings. A config
//! value is built once and passed by `Arc` to the registry and sessions; it
//! is never mutated afterwards.

use crate::RecoveryError;
use lazarus_domain::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the recovery orchestrator
///
/// # Examples
///
/// ```
/// use lazarus_recovery::RecoveryConfig;
///
/// let config = RecoveryConfig::default();
/// assert_eq!(config.early_stop_confidence, 0.8);
///
/// // Stop sooner, trip circuits faster
/// let config = RecoveryConfig::aggressive();
/// assert_eq!(config.circuit_breaker.failure_threshold, 2);
///
/// // Search longer, tolerate flaky archives
/// let config = RecoveryConfig::lenient();
/// assert_eq!(config.circuit_breaker.failure_threshold, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// A found result at or above this confidence ends the search
    pub early_stop_confidence: f64,

    /// Results below this confidence are kept but never chosen
    pub min_confidence_threshold: f64,

    /// Per-call timeout for sources that do not set their own (seconds)
    pub default_timeout_secs: u64,

    /// Circuit breaker policy
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-domain call spacing
    pub rate_limit: RateLimitConfig,
}

/// Circuit breaker policy shared by every source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a source's circuit
    pub failure_threshold: u32,

    /// How long an open circuit stays open (seconds)
    pub cooldown_secs: u64,
}

/// Minimum spacing between calls to one external domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Milliseconds between calls to the same host; 0 disables spacing
    pub min_interval_ms: u64,
}

impl Default for RecoveryConfig {
    /// Balanced defaults
    ///
    /// - Early stop at 0.8
    /// - Minimum confidence 0.5
    /// - 30 second calls
    fn default() -> Self {
        Self {
            early_stop_confidence: 0.8,
            min_confidence_threshold: 0.5,
            default_timeout_secs: 30,
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 300,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
        }
    }
}

impl RecoveryConfig {
    /// Fast configuration for interactive use
    ///
    /// Stops on the first good-enough candidate and gives up on flaky
    /// archives quickly.
    pub fn aggressive() -> Self {
        Self {
            early_stop_confidence: 0.7,
            min_confidence_threshold: 0.5,
            default_timeout_secs: 10,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 2,
                cooldown_secs: 600,
            },
            rate_limit: RateLimitConfig {
                min_interval_ms: 500,
            },
        }
    }

    /// Thorough configuration for overnight batch runs
    ///
    /// Only a near-certain match stops the search early; slow archives get
    /// more time and more chances.
    pub fn lenient() -> Self {
        Self {
            early_stop_confidence: 0.95,
            min_confidence_threshold: 0.4,
            default_timeout_secs: 60,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                cooldown_secs: 120,
            },
            rate_limit: RateLimitConfig {
                min_interval_ms: 2000,
            },
        }
    }

    /// Check thresholds and limits
    pub fn validate(&self) -> Result<(), RecoveryError> {
        for (name, value) in [
            ("early_stop_confidence", self.early_stop_confidence),
            ("min_confidence_threshold", self.min_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RecoveryError::Configuration(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.default_timeout_secs == 0 {
            return Err(RecoveryError::Configuration(
                "default_timeout_secs must be positive".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(RecoveryError::Configuration(
                "circuit_breaker.failure_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default per-call timeout as Duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Selection thresholds for the provenance assembler
    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            min_confidence: self.min_confidence_threshold,
        }
    }
}

impl CircuitBreakerConfig {
    /// Get the cool-down window as Duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl RateLimitConfig {
    /// Get the per-domain spacing as Duration
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}
