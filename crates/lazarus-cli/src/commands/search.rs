//! Search command implementation.

use super::interrupt_token;
use crate::cli::SearchArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::export::PackWriter;
use crate::output::Formatter;
use lazarus_domain::DatasetMetadata;
use lazarus_recovery::RecoveryService;

/// Execute the search command.
pub async fn execute_search(
    args: SearchArgs,
    config: &Config,
    service: &RecoveryService,
    formatter: &Formatter,
) -> Result<()> {
    let dataset = dataset_from_args(&args)?;
    let pack = service
        .search_with_cancel(&dataset, interrupt_token())
        .await?;

    println!("{}", formatter.format_pack(&pack)?);

    if args.save || args.output_dir.is_some() {
        let dir = args
            .output_dir
            .clone()
            .unwrap_or_else(|| config.workflow.output_dir.clone());
        let writer = PackWriter::new(dir, &config.workflow.export_formats)?;
        let path = writer.write(&pack)?;
        eprintln!(
            "{}",
            formatter.success(&format!("Provenance pack written to {}", path.display()))
        );
    }

    Ok(())
}

/// Build the dataset to search for from command-line arguments.
pub fn dataset_from_args(args: &SearchArgs) -> Result<DatasetMetadata> {
    let title = args.title.trim();
    if title.is_empty() {
        return Err(CliError::InvalidInput("Title must not be empty".to_string()));
    }

    let mut dataset = DatasetMetadata::new(title, args.agency.trim(), args.origin_id.trim())
        .with_keywords(&args.keywords);
    if let Some(url) = &args.url {
        dataset = dataset.with_landing_url(url.trim());
    }
    if let Some(date) = args.last_seen {
        dataset = dataset.with_last_seen(date);
    }
    Ok(dataset)
}
