//! Hour-by-hour orchestration of a mirror run
//!
//! Hours are processed strictly in ascending order, one at a time. A failure
//! inside an hour (listing, local directory, or any file) is recorded in that
//! hour's report and the run moves on; one bad hour never blocks the rest.

use crate::downloader::job::{BatchResult, FetchJob, FetchOutcome, RunReport, UnitReport};
use crate::downloader::pool::WorkerPool;
use crate::downloader::DownloadError;
use crate::fetcher::{ListingProvider, RemoteListing};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::time::TimeUnit;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Walks a time range and mirrors each hour's listing
pub struct PeriodOrchestrator {
    listing: Arc<dyn ListingProvider>,
    pool: WorkerPool,
    local_root: PathBuf,
    shutdown: Option<SharedShutdown>,
}

impl PeriodOrchestrator {
    /// Create an orchestrator writing below `local_root`
    pub fn new(
        listing: Arc<dyn ListingProvider>,
        pool: WorkerPool,
        local_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            listing,
            pool,
            local_root: local_root.into(),
            shutdown: None,
        }
    }

    /// Stop before the next hour once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Local directory mirroring `remote_dir`
    pub fn local_dir_for(&self, remote_dir: &str) -> PathBuf {
        self.local_root.join(remote_dir.trim_matches('/'))
    }

    /// Mirror every hour in `[start, end)`
    pub async fn run(&self, start: TimeUnit, end: TimeUnit) -> RunReport {
        let total = TimeUnit::count_between(start, end);
        info!(start = %start, end = %end, units = total, "Starting mirror run");

        let mut report = RunReport::default();
        for (index, unit) in TimeUnit::range(start, end).enumerate() {
            if self.shutdown_requested() {
                warn!(unit = %unit, "Shutdown requested, stopping before this hour");
                report.interrupted = true;
                break;
            }

            let span = tracing::info_span!("unit", unit = %unit, index = index + 1, total = total);
            let unit_report = self.run_unit(unit).instrument(span).await;
            metrics::record_unit(unit_report.result.is_completed());
            report.units.push(unit_report);
        }

        info!(
            units_completed = report.units_completed(),
            units_failed = report.units_failed(),
            files_skipped = report.files_skipped(),
            files_fetched = report.files_fetched(),
            interrupted = report.interrupted,
            "Mirror run finished"
        );
        report
    }

    /// Process one hour, never failing: errors are folded into the report
    pub async fn run_unit(&self, unit: TimeUnit) -> UnitReport {
        let listing = match self.listing.list(unit).await {
            Ok(listing) => listing,
            Err(e) => {
                error!(error = %e, "Listing failed, skipping hour");
                return UnitReport {
                    unit,
                    remote_dir: None,
                    local_dir: None,
                    filenames: Vec::new(),
                    result: BatchResult::Failed {
                        error: DownloadError::from(e).to_string(),
                        outcomes: Vec::new(),
                    },
                };
            }
        };

        let local_dir = self.local_dir_for(&listing.remote_dir);
        info!(
            remote_dir = %listing.remote_dir,
            local_dir = %local_dir.display(),
            files = listing.filenames.len(),
            "Resolved hour"
        );
        debug!(filenames = ?listing.filenames, "Remote names");

        let result = self.run_batch(&listing, &local_dir).await;

        UnitReport {
            unit,
            remote_dir: Some(listing.remote_dir),
            local_dir: Some(local_dir),
            filenames: listing.filenames,
            result,
        }
    }

    /// Fetch one listing into `local_dir`
    ///
    /// Outcomes of the jobs that finished are kept even when the batch fails.
    async fn run_batch(&self, listing: &RemoteListing, local_dir: &Path) -> BatchResult {
        if let Err(e) = tokio::fs::create_dir_all(local_dir).await {
            let e = DownloadError::IoError(format!("cannot create {}: {e}", local_dir.display()));
            error!(error = %e, "Hour failed");
            return BatchResult::Failed {
                error: e.to_string(),
                outcomes: Vec::new(),
            };
        }

        let jobs = FetchJob::batch(&listing.remote_dir, local_dir, &listing.filenames);
        let results = self.pool.run_all(jobs).await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => failures.push(e.to_string()),
            }
        }

        if failures.is_empty() {
            info!(files = outcomes.len(), "Hour finished");
            return BatchResult::Completed { outcomes };
        }

        let e = DownloadError::BatchIncomplete {
            failed: failures.len(),
            total: outcomes.len() + failures.len(),
            first: failures.swap_remove(0),
        };
        error!(error = %e, finished = outcomes.len(), "Hour failed");
        BatchResult::Failed {
            error: e.to_string(),
            outcomes,
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}
