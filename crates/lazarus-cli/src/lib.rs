//! Lazarus CLI library.
//!
//! Configuration loading, command execution and output formatting for the
//! `lazarus` binary. Recovery itself lives in `lazarus-recovery`; this crate
//! only turns files and arguments into calls on a [`lazarus_recovery::RecoveryService`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod output;

pub use cli::{Cli, CliFormat, Command};
pub use config::{Config, OutputFormat};
pub use error::{CliError, Result};
pub use output::Formatter;

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Quiet => OutputFormat::Quiet,
        }
    }
}
