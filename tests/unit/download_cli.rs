//! Unit tests for CLI argument parsing

use clap::Parser;
use himawari_downloader::cli::download::Cli;
use himawari_downloader::cli::{Commands, OutputFormat};
use himawari_downloader::downloader::config::{Backoff, DEFAULT_HOST};
use himawari_downloader::{RetryPolicy, TimeUnit};

fn download_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec!["himawari-downloader"];
    args.extend_from_slice(extra);
    args.extend_from_slice(&["download", "--start", "2020-01-01", "--end", "2020-01-02"]);
    args
}

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(download_args(&[]));

    assert_eq!(cli.workers, 6, "Default worker count should be 6");
    assert_eq!(cli.max_attempts, 5);
    assert!(!cli.retry_forever);
    assert_eq!(cli.host, DEFAULT_HOST);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert_eq!(
        cli.retry_policy(),
        RetryPolicy::Bounded {
            max_attempts: 5,
            backoff: Backoff::Exponential
        }
    );
}

#[test]
fn test_cli_download_range_parsed_to_hours() {
    let cli = Cli::parse_from(vec![
        "himawari-downloader",
        "download",
        "--start",
        "2020-01-01 06:45",
        "--end",
        "2020-01-01T09",
    ]);

    match cli.command {
        Commands::Download(args) => {
            assert_eq!(args.start, TimeUnit::from_ymdh(2020, 1, 1, 6).unwrap());
            assert_eq!(args.end, TimeUnit::from_ymdh(2020, 1, 1, 9).unwrap());
        }
        other => panic!("expected download command, got {other:?}"),
    }
}

#[test]
fn test_cli_respects_custom_max_attempts() {
    let cli = Cli::parse_from(download_args(&["--max-attempts", "10"]));
    assert_eq!(cli.retry_policy(), RetryPolicy::bounded(10));
}

#[test]
fn test_cli_retry_forever() {
    let cli = Cli::parse_from(download_args(&["--retry-forever"]));
    assert_eq!(cli.retry_policy(), RetryPolicy::forever());
}

#[test]
fn test_cli_retry_forever_conflicts_with_max_attempts() {
    let result = Cli::try_parse_from(download_args(&["--retry-forever", "--max-attempts", "3"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_rejects_zero_max_attempts() {
    let result = Cli::try_parse_from(download_args(&["--max-attempts", "0"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_worker_bounds() {
    assert!(Cli::try_parse_from(download_args(&["--workers", "0"])).is_err());
    assert!(Cli::try_parse_from(download_args(&["--workers", "33"])).is_err());
    let cli = Cli::parse_from(download_args(&["--workers", "32"]));
    assert_eq!(cli.workers, 32);
}

#[test]
fn test_cli_global_flags_after_subcommand() {
    let cli = Cli::parse_from(vec![
        "himawari-downloader",
        "list",
        "--time",
        "2020-01-01T00",
        "--output-format",
        "json",
        "--product",
        "ARP",
    ]);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.product.as_deref(), Some("ARP"));
}

#[test]
fn test_cli_rejects_unparseable_time() {
    let result = Cli::try_parse_from(vec![
        "himawari-downloader",
        "download",
        "--start",
        "yesterday",
        "--end",
        "2020-01-01",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_cli_check_requires_paths() {
    assert!(Cli::try_parse_from(vec!["himawari-downloader", "check"]).is_err());
}
