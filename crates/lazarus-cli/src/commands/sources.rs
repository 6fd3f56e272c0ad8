//! Sources command implementation.

use crate::error::Result;
use crate::output::Formatter;
use lazarus_recovery::RecoveryService;

/// Execute the sources command.
pub fn execute_sources(service: &RecoveryService, formatter: &Formatter) -> Result<()> {
    let sources = service.list_sources();
    println!("{}", formatter.format_sources(&sources)?);
    Ok(())
}
