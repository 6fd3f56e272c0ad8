//! Lazarus CLI - locate surviving copies of vanished datasets.

use clap::Parser;
use lazarus_cli::commands;
use lazarus_cli::{Cli, Command, Config, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for JSON output.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> lazarus_cli::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    let service = config.build_service()?;

    match cli.command {
        Command::Search(args) => {
            commands::execute_search(args, &config, &service, &formatter).await?;
        }
        Command::Batch(args) => {
            commands::execute_batch(args, &config, &service, &formatter).await?;
        }
        Command::Sources => {
            commands::execute_sources(&service, &formatter)?;
        }
    }

    Ok(())
}
