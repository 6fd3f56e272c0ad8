//! Tier module - priority groups of recovery sources

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority tier of a recovery source
///
/// All sources of one tier are searched together before the search falls
/// back to the next tier. Lower numbers are searched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(u32);

impl Tier {
    /// Create a tier from its priority number
    pub const fn new(priority: u32) -> Self {
        Self(priority)
    }

    /// Get the priority number
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Get the tier searched after this one
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Parse a tier from "3" or "tier-3" (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let digits = s.strip_prefix("tier-").unwrap_or(&s);
        digits.parse::<u32>().ok().map(Self)
    }
}

impl From<u32> for Tier {
    fn from(priority: u32) -> Self {
        Self(priority)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier-{}", self.0)
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid tier: {}", s))
    }
}
