//! # Himawari Downloader Library
//!
//! Mirrors hourly Himawari product archives from the JAXA P-Tree FTP service
//! into a local directory tree. Files already on disk and valid are skipped,
//! so re-running a range resumes where a previous run stopped.
//!
//! ## Features
//!
//! - **Hourly orchestration**: walks `[start, end)` one hour at a time; a
//!   failed hour is reported and the run continues
//! - **Bounded concurrency**: a fixed number of simultaneous transfers per hour
//! - **Integrity-driven retries**: a file is done only once it parses as
//!   netCDF; retry limits and backoff are configurable
//! - **Pluggable boundaries**: listing, transfer and validation are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use himawari_downloader::downloader::config::{Credentials, MirrorConfig, Product};
//! use himawari_downloader::downloader::{Mirror, RetryPolicy};
//! use himawari_downloader::TimeUnit;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MirrorConfig::new(
//!     Credentials::new("me@example.com", "password"),
//!     Product { level: "L3".into(), name: "PAR".into(), version: "010".into() },
//!     "./himawari",
//! )
//! .with_proxy(Some("socks5h://127.0.0.1:10808".into()))
//! .with_retry(RetryPolicy::bounded(10));
//!
//! let mirror = Mirror::from_config(&config)?;
//! let report = mirror
//!     .run("2020-01-01T00".parse()?, "2020-01-02T00".parse()?)
//!     .await;
//! println!("{} files fetched", report.files_fetched());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`time`] - Hour-aligned time units and range enumeration
//! - [`fetcher`] - Remote listing and transfer (curl-backed)
//! - [`validity`] - Local file integrity checks
//! - [`downloader`] - Fetch task, worker pool and period orchestrator
//! - [`lock`] - Advisory lock on the local tree
//! - [`cli`] - Command-line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Download orchestration
pub mod downloader;

/// Remote listing and transfer
pub mod fetcher;

/// Local tree locking
pub mod lock;

/// Run metrics
pub mod metrics;

/// Graceful shutdown coordination
pub mod shutdown;

/// Hourly time units
pub mod time;

/// Local file validation
pub mod validity;

pub use downloader::{Mirror, MirrorConfig, RetryPolicy, RunReport};
pub use time::TimeUnit;
