//! Batch command implementation.
//!
//! The stream returned by the recovery service is consumed here and nowhere
//! else, so every pack file is written by a single owner.

use super::interrupt_token;
use crate::cli::BatchArgs;
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::export::{read_datasets, PackWriter};
use crate::output::Formatter;
use lazarus_domain::{DatasetMetadata, ProvenancePack};
use lazarus_recovery::{BatchSummary, RecoveryService};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Execute the batch command.
pub async fn execute_batch(
    args: BatchArgs,
    config: &Config,
    service: &RecoveryService,
    formatter: &Formatter,
) -> Result<()> {
    let datasets = read_datasets(&args.input)?;
    let concurrency = args.concurrency.unwrap_or(config.workflow.concurrency);
    if concurrency == 0 {
        return Err(CliError::InvalidInput("Concurrency must be positive".to_string()));
    }

    let dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.workflow.output_dir.clone());
    let writer = PackWriter::new(dir, &config.workflow.export_formats)?;

    let total = datasets.len();
    eprintln!(
        "{}",
        formatter.info(&format!(
            "Searching for {} datasets with {} workers",
            total, concurrency
        ))
    );

    let show_progress = formatter.format() == OutputFormat::Table;
    let mut done = 0;
    let summary = run_batch(
        service,
        datasets,
        concurrency,
        &writer,
        interrupt_token(),
        |pack| {
            done += 1;
            if show_progress {
                eprintln!("{}", formatter.pack_progress(done, total, pack));
            }
        },
    )
    .await?;

    writer.write_value("summary.json", &summary)?;
    println!("{}", formatter.format_summary(&summary)?);

    if summary.total() < total {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "Batch interrupted after {} of {} datasets",
                summary.total(),
                total
            ))
        );
    } else {
        eprintln!(
            "{}",
            formatter.success(&format!(
                "Provenance packs written to {}",
                writer.dir().display()
            ))
        );
    }
    Ok(())
}

/// Drive a batch to completion, writing each pack as it arrives.
///
/// Stops consuming when `cancel` fires; dropping the stream aborts the
/// searches still in flight.
pub async fn run_batch<F>(
    service: &RecoveryService,
    datasets: Vec<DatasetMetadata>,
    concurrency: usize,
    writer: &PackWriter,
    cancel: CancellationToken,
    mut on_pack: F,
) -> Result<BatchSummary>
where
    F: FnMut(&ProvenancePack),
{
    let started = tokio::time::Instant::now();
    let mut stream = service.batch_search(datasets, concurrency)?;
    let mut summary = BatchSummary::new();

    loop {
        let pack = tokio::select! {
            next = stream.next() => match next {
                Some(pack) => pack,
                None => break,
            },
            _ = cancel.cancelled() => {
                tracing::warn!("Batch cancelled with {} packs written", summary.total());
                break;
            }
        };

        writer.write(&pack)?;
        summary.record(&pack);
        on_pack(&pack);
    }

    summary.elapsed = started.elapsed();
    Ok(summary)
}
