//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use lazarus_domain::{LinkOutcome, PackStatus, ProvenancePack, RecoveryResult};
use lazarus_recovery::{BatchSummary, CircuitState, SourceInfo};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format one provenance pack.
    pub fn format_pack(&self, pack: &ProvenancePack) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(pack)?),
            OutputFormat::Table => Ok(self.format_pack_table(pack)),
            OutputFormat::Quiet => Ok(format_pack_quiet(pack)),
        }
    }

    /// Format a pack as a status line and a chain table.
    fn format_pack_table(&self, pack: &ProvenancePack) -> String {
        let mut lines = vec![format!(
            "{}  {}",
            self.status_badge(pack.status),
            pack.dataset.label()
        )];

        match (&pack.chosen, &pack.diagnostic) {
            (Some(chosen), _) => lines.push(format!(
                "   {} {} (confidence {}, via {})",
                self.colorize("→", "green"),
                chosen.candidate_url.as_deref().unwrap_or("-"),
                chosen.confidence,
                chosen.source_id
            )),
            (None, Some(diagnostic)) => lines.push(format!("   {}", self.colorize(diagnostic, "red"))),
            (None, None) => {}
        }

        if pack.provenance_chain.is_empty() {
            lines.push(self.colorize("No sources were consulted.", "yellow"));
            return lines.join("\n");
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Tier", "Source", "Outcome", "Confidence", "Candidate / Detail"]);

        for (i, link) in pack.provenance_chain.iter().enumerate() {
            let result = pack.results.iter().find(|r| r.source_id == link.source_id);
            let (confidence, detail) = match result {
                Some(result) => (result.confidence.to_string(), result_detail(result)),
                None => ("-".to_string(), String::new()),
            };
            builder.push_record([
                (i + 1).to_string(),
                link.tier.to_string(),
                link.source_name.clone(),
                outcome_label(link.outcome).to_string(),
                confidence,
                detail,
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        lines.push(table.to_string());
        lines.join("\n")
    }

    /// Format the source list.
    pub fn format_sources(&self, sources: &[SourceInfo]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(sources)?),
            OutputFormat::Quiet => Ok(sources
                .iter()
                .map(|s| s.id.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => Ok(self.format_sources_table(sources)),
        }
    }

    fn format_sources_table(&self, sources: &[SourceInfo]) -> String {
        if sources.is_empty() {
            return self.colorize("No sources configured.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Name", "Kind", "Tier", "Enabled", "Circuit", "Failures", "Retry In"]);

        for source in sources {
            let retry = source
                .health
                .retry_in_secs
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "-".to_string());
            builder.push_record([
                source.id.clone(),
                source.name.clone(),
                source.kind.clone(),
                source.tier.to_string(),
                if source.enabled { "yes" } else { "no" }.to_string(),
                self.circuit_label(source.health.state),
                source.health.consecutive_failures.to_string(),
                retry,
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// Format the end-of-batch summary.
    pub fn format_summary(&self, summary: &BatchSummary) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
            OutputFormat::Quiet => Ok(format!(
                "{} found, {} missing, {} error",
                summary.found, summary.missing, summary.error
            )),
            OutputFormat::Table => Ok(summary.summary()),
        }
    }

    /// One progress line per pack during a batch.
    pub fn pack_progress(&self, done: usize, total: usize, pack: &ProvenancePack) -> String {
        format!(
            "[{}/{}] {} {}",
            done,
            total,
            self.status_badge(pack.status),
            pack.dataset.label()
        )
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status_badge(&self, status: PackStatus) -> String {
        let color = match status {
            PackStatus::Found => "green",
            PackStatus::Missing => "yellow",
            PackStatus::Error => "red",
        };
        self.colorize(status.as_str(), color)
    }

    fn circuit_label(&self, state: CircuitState) -> String {
        let color = match state {
            CircuitState::Closed => "green",
            CircuitState::HalfOpen => "yellow",
            CircuitState::Open => "red",
        };
        self.colorize(state.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn format_pack_quiet(pack: &ProvenancePack) -> String {
    let url = pack
        .chosen
        .as_ref()
        .and_then(|c| c.candidate_url.as_deref())
        .unwrap_or("-");
    format!("{}\t{}", pack.status, url)
}

fn outcome_label(outcome: LinkOutcome) -> &'static str {
    match outcome {
        LinkOutcome::Found => "found",
        LinkOutcome::NotFound => "not found",
        LinkOutcome::Error => "error",
        LinkOutcome::Cancelled => "cancelled",
    }
}

fn result_detail(result: &RecoveryResult) -> String {
    if let Some(failure) = &result.failure {
        return format!("{}: {}", failure.kind.as_str(), failure.message);
    }
    result.candidate_url.clone().unwrap_or_default()
}
