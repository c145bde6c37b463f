//! Top-level CLI definition and the `download` command

use crate::downloader::config::{Credentials, MirrorConfig, Product, DEFAULT_HOST, DEFAULT_REMOTE_ROOT};
use crate::downloader::{BatchResult, Mirror, RetryPolicy, RunReport};
use crate::fetcher::{CurlListingProvider, CurlTransferClient};
use crate::lock::RunLock;
use crate::shutdown::SharedShutdown;
use crate::time::TimeUnit;
use crate::validity::NetCdfValidator;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::CliError;

/// Maximum allowed worker count, to stay polite with the FTP server
const MAX_WORKERS: usize = 32;

/// Parse and validate the worker count
fn parse_workers(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("workers must be at least 1".to_string());
    }
    if value > MAX_WORKERS {
        return Err(format!("workers {value} exceeds maximum of {MAX_WORKERS}"));
    }
    Ok(value)
}

/// Himawari archive mirror CLI
#[derive(Parser, Debug)]
#[command(name = "himawari-downloader")]
#[command(about = "Mirror hourly Himawari products from the JAXA P-Tree FTP service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// P-Tree account (registered email address)
    #[arg(long, global = true, env = "HIMAWARI_USER")]
    pub user: Option<String>,

    /// P-Tree account password
    #[arg(long, global = true, env = "HIMAWARI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Product level (e.g. L2, L3)
    #[arg(long, global = true, env = "HIMAWARI_LEVEL")]
    pub level: Option<String>,

    /// Product short name (e.g. PAR, ARP, CLP)
    #[arg(long, global = true, env = "HIMAWARI_PRODUCT")]
    pub product: Option<String>,

    /// Product version (e.g. 010)
    #[arg(long = "product-version", global = true, env = "HIMAWARI_VERSION")]
    pub product_version: Option<String>,

    /// Local directory the remote tree is mirrored into
    #[arg(long, global = true, env = "HIMAWARI_LOCAL_ROOT", default_value = "himawari")]
    pub local_root: PathBuf,

    /// FTP host
    #[arg(long, global = true, env = "HIMAWARI_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Remote root directory holding the product trees
    #[arg(long, global = true, env = "HIMAWARI_REMOTE_ROOT", default_value = DEFAULT_REMOTE_ROOT)]
    pub remote_root: String,

    /// Outbound proxy passed to curl (e.g. socks5h://127.0.0.1:10808)
    #[arg(long, global = true, env = "HIMAWARI_PROXY")]
    pub proxy: Option<String>,

    /// Concurrent transfers per hour (default: 6, max: 32)
    #[arg(long, global = true, env = "HIMAWARI_WORKERS", default_value = "6", value_parser = parse_workers)]
    pub workers: usize,

    /// Transfer attempts per file before giving up (default: 5, range: 1-100)
    #[arg(long, global = true, env = "HIMAWARI_MAX_ATTEMPTS", default_value = "5", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub max_attempts: u32,

    /// Retry each file until it validates, with no attempt limit
    ///
    /// A file that can never be fetched then blocks its worker indefinitely.
    #[arg(long, global = true, env = "HIMAWARI_RETRY_FOREVER", default_value_t = false, conflicts_with = "max_attempts")]
    pub retry_forever: bool,

    /// Output format (json or human)
    #[arg(long, global = true, env = "HIMAWARI_OUTPUT_FORMAT", default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true, env = "HIMAWARI_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror every hour in [start, end)
    Download(DownloadArgs),

    /// Print the selected remote filenames for one hour
    List(super::ListArgs),

    /// Check local files for validity
    Check(super::CheckArgs),
}

/// Download command arguments
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// First hour to mirror (RFC3339, YYYY-MM-DDTHH, YYYY-MM-DD HH:MM or YYYY-MM-DD; UTC)
    #[arg(long)]
    pub start: TimeUnit,

    /// Hour to stop before (exclusive)
    #[arg(long)]
    pub end: TimeUnit,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// Retry policy selected by the flags
    pub fn retry_policy(&self) -> RetryPolicy {
        if self.retry_forever {
            RetryPolicy::forever()
        } else {
            RetryPolicy::bounded(self.max_attempts)
        }
    }

    /// Build the mirror configuration, failing on missing required values
    pub fn mirror_config(&self) -> Result<MirrorConfig, CliError> {
        let required = |value: &Option<String>, flag: &str| {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| CliError::ConfigurationError(format!("missing --{flag}")))
        };

        let credentials = Credentials::new(
            required(&self.user, "user")?,
            required(&self.password, "password")?,
        );
        let product = Product {
            level: required(&self.level, "level")?,
            name: required(&self.product, "product")?,
            version: required(&self.product_version, "product-version")?,
        };

        let mut config = MirrorConfig::new(credentials, product, self.local_root.clone())
            .with_proxy(self.proxy.clone())
            .with_workers(self.workers)
            .with_retry(self.retry_policy());
        config.endpoint.host = self.host.clone();
        config.remote_root = self.remote_root.clone();
        Ok(config)
    }
}

impl DownloadArgs {
    /// Execute the download command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        if self.end <= self.start {
            return Err(CliError::InvalidArgument(format!(
                "end {} must be after start {}",
                self.end, self.start
            )));
        }

        let config = cli.mirror_config()?;
        config.validate()?;

        let mut lock = RunLock::open(&config.local_root)?;
        let _guard = lock.try_hold()?;

        let requested = TimeUnit::count_between(self.start, self.end);
        info!(
            start = %self.start,
            end = %self.end,
            hours = requested,
            workers = config.workers,
            retry = ?config.retry,
            local_root = %config.local_root.display(),
            "Starting download"
        );

        let progress = create_progress_bar(cli.output_format, &config.product.name);
        let mirror = Mirror::with_components(
            &config,
            Arc::new(CurlListingProvider::new(&config)),
            Arc::new(NetCdfValidator::new()),
            Arc::new(CurlTransferClient::new(config.endpoint.clone())),
            Some(shutdown),
            Some(progress.clone()),
        );

        let report = mirror.run(self.start, self.end).await;
        progress.finish_and_clear();

        match cli.output_format {
            OutputFormat::Json => output_json(self, &report),
            OutputFormat::Human => output_human(self, &report),
        }

        if report.interrupted {
            return Err(CliError::Interrupted {
                completed: report.units.len(),
                requested,
            });
        }
        Ok(())
    }
}

/// Output the run report as JSON
fn output_json(args: &DownloadArgs, report: &RunReport) {
    let output = serde_json::json!({
        "success": !report.interrupted,
        "start": args.start,
        "end": args.end,
        "units_completed": report.units_completed(),
        "units_failed": report.units_failed(),
        "files_skipped": report.files_skipped(),
        "files_fetched": report.files_fetched(),
        "interrupted": report.interrupted,
        "units": report.units,
    });
    println!("{output}");
}

/// Output the run report in human-readable format
fn output_human(args: &DownloadArgs, report: &RunReport) {
    if report.interrupted {
        println!("\nDownload interrupted.");
    } else {
        println!("\nDownload finished.");
    }
    println!("Range: {} .. {}", args.start, args.end);
    println!(
        "Hours completed: {}, failed: {}",
        report.units_completed(),
        report.units_failed()
    );
    println!(
        "Files fetched: {}, already valid: {}",
        report.files_fetched(),
        report.files_skipped()
    );

    for unit in &report.units {
        if let BatchResult::Failed { error, .. } = &unit.result {
            eprintln!("  {} failed: {error}", unit.unit);
        }
    }
}

/// Create the per-hour progress bar (hidden for JSON output)
fn create_progress_bar(format: OutputFormat, product: &str) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {product}"));
    pb
}
