//! Per-file fetch task: check, transfer, re-check
//!
//! The validity check is the only authority on success. A transfer that
//! reports an error may still have produced a good file, and one that
//! reports success may have left a truncated one; either way the file is
//! re-validated before the job is considered done.

use crate::downloader::config::RetryPolicy;
use crate::downloader::job::{FetchError, FetchJob, FetchOutcome};
use crate::fetcher::TransferClient;
use crate::metrics::{self, FetchMetrics};
use crate::shutdown::SharedShutdown;
use crate::validity::Validator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Ensures one local file is present and valid
#[derive(Clone)]
pub struct FileFetcher {
    validator: Arc<dyn Validator>,
    transfer: Arc<dyn TransferClient>,
    retry: RetryPolicy,
    shutdown: Option<SharedShutdown>,
}

impl FileFetcher {
    /// Create a fetcher with the default (bounded) retry policy
    pub fn new(validator: Arc<dyn Validator>, transfer: Arc<dyn TransferClient>) -> Self {
        Self {
            validator,
            transfer,
            retry: RetryPolicy::default(),
            shutdown: None,
        }
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach a shutdown handle; it cuts retry delays short
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Make `job.local()` valid, transferring as often as the policy allows
    ///
    /// Under [`RetryPolicy::Forever`] this only returns once the file
    /// validates (or shutdown interrupts a non-zero delay).
    pub async fn ensure(&self, job: &FetchJob) -> Result<FetchOutcome, FetchError> {
        let fetch_metrics = FetchMetrics::start();

        if self.validator.is_valid(job.local()).await {
            info!(local = %job.local().display(), "File exists and is valid, skipping");
            fetch_metrics.record_skipped();
            return Ok(FetchOutcome::SkippedAlreadyValid);
        }

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            debug!(remote = %job.remote(), attempt = attempts, "Transferring");

            let transfer_result = self.transfer.fetch(job.remote(), job.local()).await;
            metrics::record_transfer_attempt(transfer_result.is_ok());
            if let Err(e) = &transfer_result {
                warn!(remote = %job.remote(), attempt = attempts, error = %e, "Transfer attempt failed");
            }

            if self.validator.is_valid(job.local()).await {
                info!(
                    local = %job.local().display(),
                    attempts = attempts,
                    "File downloaded"
                );
                fetch_metrics.record_fetched(attempts);
                return Ok(FetchOutcome::Fetched { attempts });
            }

            let delay = match self.retry.next_delay(attempts) {
                Some(delay) => delay,
                None => {
                    error!(
                        remote = %job.remote(),
                        attempts = attempts,
                        "Giving up: file still invalid after final attempt"
                    );
                    fetch_metrics.record_exhausted();
                    return Err(FetchError::AttemptsExhausted {
                        remote: job.remote().to_string(),
                        attempts,
                    });
                }
            };

            if !self.wait(delay).await {
                return Err(FetchError::Interrupted {
                    remote: job.remote().to_string(),
                    attempts,
                });
            }
        }
    }

    /// Sleep before the next attempt; `false` if shutdown cut the wait short
    async fn wait(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }
        match &self.shutdown {
            Some(shutdown) => {
                if shutdown.is_shutdown_requested() {
                    return false;
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => true,
                    _ = shutdown.wait_for_shutdown() => false,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
