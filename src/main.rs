//! Main entry point for the himawari-downloader CLI

use clap::Parser;
use himawari_downloader::cli::{Cli, Commands};
use himawari_downloader::metrics;
use himawari_downloader::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("himawari_downloader=info"));

    // Logs go to stderr so `--output-format json` keeps stdout parseable
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr).await?;
    }

    let shutdown = ShutdownCoordinator::shared();
    shutdown.listen_for_ctrl_c();

    match &cli.command {
        Commands::Download(args) => args.execute(cli, shutdown).await?,
        Commands::List(args) => args.execute(cli).await?,
        Commands::Check(args) => args.execute(cli).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
