//! Configuration management for the CLI.
//!
//! The configuration file is TOML:
//!
//! ```toml
//! [workflow]
//! early_stop_confidence = 0.8
//! min_confidence_threshold = 0.5
//! output_dir = "recovered"
//! export_formats = ["json"]
//! concurrency = 4
//!
//! [circuit_breaker]
//! failure_threshold = 3
//! cooldown_secs = 300
//!
//! [rate_limit]
//! min_interval_ms = 1000
//!
//! [[sources]]
//! id = "datagov"
//! name = "Data.gov Catalog"
//! priority = 1
//! kind = "ckan"
//! base_url = "https://catalog.data.gov"
//! ```
//!
//! When no file exists the built-in source lineup is used.

use crate::error::{CliError, Result};
use lazarus_domain::{SourceDescriptor, Tier};
use lazarus_recovery::{
    CircuitBreakerConfig, RateLimitConfig, RecoveryConfig, RecoveryService, SourceRegistry,
};
use lazarus_sources::{wayback, zenodo, AdapterFactory, DomainGate, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search thresholds and output
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Circuit breaker policy
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-domain call spacing
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Recovery sources in declaration order
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// The `[workflow]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// A found result at or above this confidence ends the search
    pub early_stop_confidence: f64,

    /// Results below this confidence are never chosen
    pub min_confidence_threshold: f64,

    /// Timeout for sources without their own (seconds)
    pub default_timeout_secs: u64,

    /// Where provenance packs are written
    pub output_dir: PathBuf,

    /// Requested export formats
    pub export_formats: Vec<String>,

    /// Concurrent searches in a batch
    pub concurrency: usize,
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source id
    pub id: String,

    /// Display name
    pub name: String,

    /// Whether the source takes part in searches
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tier number; lower is searched first
    pub priority: u32,

    /// Per-call timeout override (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Adapter kind and its settings
    #[serde(flatten)]
    pub kind: SourceKind,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".lazarus").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default path is read if
    /// present and the built-in configuration is used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "Config file {} does not exist",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => {
                let path = Self::default_path()?;
                if !path.exists() {
                    tracing::debug!("No config at {}, using built-in sources", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        tracing::debug!("Loading config from {}", path.display());
        Self::from_toml(&fs::read_to_string(&path)?)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parts the recovery library does not check itself.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(CliError::Config("No sources configured".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(CliError::Config(format!("Duplicate source id '{}'", source.id)));
            }
            if source.priority == 0 {
                return Err(CliError::Config(format!(
                    "Source '{}' has priority 0; tiers start at 1",
                    source.id
                )));
            }
            if source.timeout_secs == Some(0) {
                return Err(CliError::Config(format!(
                    "Source '{}' has a zero timeout",
                    source.id
                )));
            }
        }

        if self.workflow.concurrency == 0 {
            return Err(CliError::Config("workflow.concurrency must be positive".into()));
        }

        self.recovery_config().validate()?;
        Ok(())
    }

    /// Settings handed to the recovery library.
    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            early_stop_confidence: self.workflow.early_stop_confidence,
            min_confidence_threshold: self.workflow.min_confidence_threshold,
            default_timeout_secs: self.workflow.default_timeout_secs,
            circuit_breaker: self.circuit_breaker.clone(),
            rate_limit: self.rate_limit.clone(),
        }
    }

    /// Source descriptors in declaration order.
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources
            .iter()
            .map(|source| {
                let timeout = source
                    .timeout_secs
                    .unwrap_or(self.workflow.default_timeout_secs);
                SourceDescriptor::new(&source.id, &source.name, Tier::new(source.priority))
                    .with_kind(source.kind.name())
                    .with_timeout(Duration::from_secs(timeout))
                    .with_enabled(source.enabled)
            })
            .collect()
    }

    /// Build adapters, the registry and the service.
    pub fn build_service(&self) -> Result<RecoveryService> {
        let recovery = self.recovery_config();
        let gate = Arc::new(DomainGate::new(recovery.rate_limit.min_interval()));
        let factory = AdapterFactory::new(gate).map_err(|e| CliError::Config(e.to_string()))?;

        let mut entries = Vec::with_capacity(self.sources.len());
        for (source, descriptor) in self.sources.iter().zip(self.descriptors()) {
            let adapter = factory
                .build(&source.id, &source.kind)
                .map_err(|e| CliError::Config(format!("Source '{}': {}", source.id, e)))?;
            entries.push((descriptor, adapter));
        }

        let registry = SourceRegistry::new(entries, recovery.circuit_breaker.clone())?;
        tracing::info!(
            "Registered {} sources ({} enabled)",
            registry.source_count(),
            registry.enabled_count()
        );
        Ok(RecoveryService::new(registry, recovery)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            sources: default_sources(),
            settings: Settings::default(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let recovery = RecoveryConfig::default();
        Self {
            early_stop_confidence: recovery.early_stop_confidence,
            min_confidence_threshold: recovery.min_confidence_threshold,
            default_timeout_secs: recovery.default_timeout_secs,
            output_dir: PathBuf::from("recovered"),
            export_formats: vec!["json".to_string()],
            concurrency: 4,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

/// The built-in lineup: government catalog first, then web archives,
/// research repositories and community catalogs.
pub fn default_sources() -> Vec<SourceConfig> {
    fn source(id: &str, name: &str, priority: u32, kind: SourceKind) -> SourceConfig {
        SourceConfig {
            id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            priority,
            timeout_secs: None,
            kind,
        }
    }
    fn ckan(base_url: &str) -> SourceKind {
        SourceKind::Ckan {
            base_url: base_url.to_string(),
            rows: lazarus_sources::ckan::DEFAULT_ROWS,
        }
    }
    fn dataverse(base_url: &str) -> SourceKind {
        SourceKind::Dataverse {
            base_url: base_url.to_string(),
        }
    }

    vec![
        source("datagov", "Data.gov Catalog", 1, ckan("https://catalog.data.gov")),
        source(
            "wayback",
            "Internet Archive Wayback Machine",
            2,
            SourceKind::Wayback {
                endpoint: wayback::DEFAULT_ENDPOINT.to_string(),
            },
        ),
        source(
            "zenodo",
            "Zenodo",
            3,
            SourceKind::Zenodo {
                endpoint: zenodo::DEFAULT_ENDPOINT.to_string(),
            },
        ),
        source("harvard-dataverse", "Harvard Dataverse", 3, dataverse("https://dataverse.harvard.edu")),
        source("borealis", "Borealis Dataverse", 4, dataverse("https://borealisdata.ca")),
        source("unc-dataverse", "UNC Dataverse", 4, dataverse("https://dataverse.unc.edu")),
        source("hdx", "Humanitarian Data Exchange", 5, ckan("https://data.humdata.org")),
        source("open-canada", "Open Government Canada", 5, ckan("https://open.canada.ca/data")),
    ]
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
