//! CLI command definitions and argument parsing.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lazarus - Locate surviving copies of datasets that vanished from their origin.
#[derive(Debug, Parser)]
#[command(name = "lazarus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LAZARUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (status and URL only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search every configured source for one dataset
    Search(SearchArgs),

    /// Search for many datasets read from a JSON or JSON Lines file
    Batch(BatchArgs),

    /// List configured sources and their circuit state
    Sources,
}

/// Arguments for the search command.
#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Dataset title as published by the agency
    pub title: String,

    /// Publishing agency
    #[arg(short, long, default_value = "")]
    pub agency: String,

    /// Identifier at the origin (catalog id, DOI, package name)
    #[arg(long = "id", default_value = "")]
    pub origin_id: String,

    /// Last known landing page
    #[arg(short, long)]
    pub url: Option<String>,

    /// Last date the dataset was seen (YYYY-MM-DD)
    #[arg(long)]
    pub last_seen: Option<NaiveDate>,

    /// Keyword (repeatable)
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// Write the provenance pack to the configured output directory
    #[arg(long)]
    pub save: bool,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the batch command.
#[derive(Debug, Parser)]
pub struct BatchArgs {
    /// JSON array or JSON Lines file of dataset metadata
    pub input: PathBuf,

    /// Maximum concurrent searches
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}
