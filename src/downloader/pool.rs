//! Bounded concurrent execution of one batch of fetch jobs

use crate::downloader::config::DEFAULT_WORKERS;
use crate::downloader::executor::FileFetcher;
use crate::downloader::job::{FetchError, FetchJob, FetchOutcome};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;

/// Runs at most `concurrency` [`FileFetcher::ensure`] calls at a time
#[derive(Clone)]
pub struct WorkerPool {
    fetcher: FileFetcher,
    concurrency: usize,
    progress: Option<ProgressBar>,
}

impl WorkerPool {
    /// Pool of [`DEFAULT_WORKERS`] workers
    pub fn new(fetcher: FileFetcher) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_WORKERS,
            progress: None,
        }
    }

    /// Set the concurrency bound (0 is treated as 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Advance `progress` once per finished job
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Concurrency bound
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job and wait for all of them
    ///
    /// Results arrive in completion order. Nothing is cancelled: a job that
    /// never validates under an unbounded retry policy keeps this call from
    /// returning.
    pub async fn run_all(&self, jobs: Vec<FetchJob>) -> Vec<Result<FetchOutcome, FetchError>> {
        if let Some(progress) = &self.progress {
            progress.set_length(jobs.len() as u64);
            progress.set_position(0);
        }

        stream::iter(jobs)
            .map(|job| {
                let fetcher = self.fetcher.clone();
                let progress = self.progress.clone();
                async move {
                    let result = fetcher.ensure(&job).await;
                    if let Some(progress) = progress {
                        progress.inc(1);
                    }
                    result
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}
