//! Download orchestration engine
//!
//! The engine mirrors a range of hourly remote directories into a local
//! tree:
//!
//! 1. **Orchestration**: [`orchestrator::PeriodOrchestrator`] walks the hours
//!    of `[start, end)` in ascending order and isolates failures per hour
//! 2. **Batching**: each hour's listing becomes a batch of [`job::FetchJob`]s
//! 3. **Concurrency**: [`pool::WorkerPool`] runs a bounded number of jobs at
//!    once
//! 4. **Per-file work**: [`executor::FileFetcher`] skips valid files and
//!    otherwise transfers and re-validates under a [`config::RetryPolicy`]
//!
//! # Quick Start
//!
//! ```no_run
//! use himawari_downloader::downloader::config::{Credentials, MirrorConfig, Product};
//! use himawari_downloader::downloader::Mirror;
//! use himawari_downloader::TimeUnit;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MirrorConfig::new(
//!     Credentials::new("me@example.com", "password"),
//!     Product { level: "L2".into(), name: "PAR".into(), version: "010".into() },
//!     "./himawari",
//! );
//! let mirror = Mirror::from_config(&config)?;
//! let start: TimeUnit = "2020-01-01T00".parse()?;
//! let end: TimeUnit = "2020-01-01T02".parse()?;
//! let report = mirror.run(start, end).await;
//! println!("{} hours completed", report.units_completed());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - Listing errors fail their hour only
//! - Transfer errors are retried inside the file task and never surface
//! - Validation problems mean "invalid" and trigger a transfer
//! - Configuration errors are returned before any hour is processed

pub mod config;
pub mod executor;
pub mod job;
pub mod orchestrator;
pub mod pool;

pub use config::{MirrorConfig, RetryPolicy};
pub use executor::FileFetcher;
pub use job::{BatchResult, FetchError, FetchJob, FetchOutcome, RunReport, UnitReport};
pub use orchestrator::PeriodOrchestrator;
pub use pool::WorkerPool;

use crate::fetcher::{
    CurlListingProvider, CurlTransferClient, FetcherError, ListingProvider, TransferClient,
};
use crate::shutdown::SharedShutdown;
use crate::time::TimeUnit;
use crate::validity::{NetCdfValidator, Validator};
use indicatif::ProgressBar;
use std::sync::Arc;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Invalid or unusable configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Remote listing or transfer error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Local filesystem error
    #[error("IO error: {0}")]
    IoError(String),

    /// Some files of a batch could not be made valid
    #[error("{failed} of {total} file(s) failed, first: {first}")]
    BatchIncomplete {
        /// Jobs that returned an error
        failed: usize,
        /// Jobs in the batch
        total: usize,
        /// First error message
        first: String,
    },
}

/// The assembled engine: curl listing and transfer, netCDF validation,
/// bounded pool and orchestrator
pub struct Mirror {
    orchestrator: PeriodOrchestrator,
}

impl Mirror {
    /// Validate `config` and wire the default components
    ///
    /// Fails fast on missing credentials or an unwritable local root.
    pub fn from_config(config: &MirrorConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        Ok(Self::with_components(
            config,
            Arc::new(CurlListingProvider::new(config)),
            Arc::new(NetCdfValidator::new()),
            Arc::new(CurlTransferClient::new(config.endpoint.clone())),
            None,
            None,
        ))
    }

    /// Wire caller-supplied components using `config` for the pool size,
    /// retry policy and local root
    pub fn with_components(
        config: &MirrorConfig,
        listing: Arc<dyn ListingProvider>,
        validator: Arc<dyn Validator>,
        transfer: Arc<dyn TransferClient>,
        shutdown: Option<SharedShutdown>,
        progress: Option<ProgressBar>,
    ) -> Self {
        let mut fetcher = FileFetcher::new(validator, transfer).with_retry(config.retry);
        if let Some(shutdown) = &shutdown {
            fetcher = fetcher.with_shutdown(shutdown.clone());
        }

        let mut pool = WorkerPool::new(fetcher).with_concurrency(config.workers);
        if let Some(progress) = progress {
            pool = pool.with_progress(progress);
        }

        let mut orchestrator = PeriodOrchestrator::new(listing, pool, config.local_root.clone());
        if let Some(shutdown) = shutdown {
            orchestrator = orchestrator.with_shutdown(shutdown);
        }

        Self { orchestrator }
    }

    /// Mirror `[start, end)`
    pub async fn run(&self, start: TimeUnit, end: TimeUnit) -> RunReport {
        self.orchestrator.run(start, end).await
    }

    /// The underlying orchestrator
    pub fn orchestrator(&self) -> &PeriodOrchestrator {
        &self.orchestrator
    }
}
