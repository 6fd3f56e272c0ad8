//! Reading batch input and writing provenance packs to disk.

use crate::error::{CliError, Result};
use lazarus_domain::{DatasetMetadata, ProvenancePack};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Writes provenance packs into one directory.
///
/// Only JSON is produced. Other requested formats are reported once and
/// skipped. Two datasets whose names reduce to the same stem get `-2`, `-3`
/// and so on instead of overwriting each other.
#[derive(Debug)]
pub struct PackWriter {
    dir: PathBuf,
    used: Mutex<HashSet<String>>,
}

impl PackWriter {
    /// Create a writer for `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, formats: &[String]) -> Result<Self> {
        let dir = dir.into();
        let mut json = false;
        for format in formats {
            match format.trim().to_lowercase().as_str() {
                "json" => json = true,
                other => tracing::warn!("Export format '{}' is not supported; skipping", other),
            }
        }
        if !json {
            return Err(CliError::Config(
                "workflow.export_formats must include \"json\"".into(),
            ));
        }

        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            used: Mutex::new(HashSet::new()),
        })
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one pack; returns the file written.
    pub fn write(&self, pack: &ProvenancePack) -> Result<PathBuf> {
        let stem = self.claim_stem(file_stem(&pack.dataset));
        let path = self.dir.join(format!("{}.json", stem));
        fs::write(&path, serde_json::to_string_pretty(pack)?)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Reserve `stem`, or the first free `stem-N` when it is taken.
    fn claim_stem(&self, stem: String) -> String {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        if used.insert(stem.clone()) {
            return stem;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", stem, n);
            if used.insert(candidate.clone()) {
                tracing::debug!("Pack name {} already written; using {}", stem, candidate);
                return candidate;
            }
            n += 1;
        }
    }

    /// Write an arbitrary serializable value next to the packs.
    pub fn write_value<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        Ok(path)
    }
}

/// File name for a dataset's pack: its origin id, or title when the id is
/// blank, reduced to filesystem-safe characters.
pub fn file_stem(dataset: &DatasetMetadata) -> String {
    let source = if dataset.origin_id.trim().is_empty() {
        &dataset.title
    } else {
        &dataset.origin_id
    };

    let mut stem = String::with_capacity(source.len());
    for c in source.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            stem.push(c);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches(|c| c == '_' || c == '.').to_string();
    if stem.is_empty() {
        "dataset".to_string()
    } else {
        stem
    }
}

/// Parse batch input: a JSON array, or one JSON object per line.
pub fn parse_datasets(contents: &str) -> Result<Vec<DatasetMetadata>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut datasets = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let dataset = serde_json::from_str(line)
            .map_err(|e| CliError::InvalidInput(format!("line {}: {}", index + 1, e)))?;
        datasets.push(dataset);
    }
    Ok(datasets)
}

/// Read batch input from a file.
pub fn read_datasets(path: &Path) -> Result<Vec<DatasetMetadata>> {
    let contents = fs::read_to_string(path)?;
    let datasets = parse_datasets(&contents)?;
    if datasets.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "{} contains no datasets",
            path.display()
        )));
    }
    Ok(datasets)
}
