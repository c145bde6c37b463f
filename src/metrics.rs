//! Run metrics
//!
//! Counters and histograms go through the `metrics` facade, so they cost
//! next to nothing unless a recorder is installed. [`init_metrics`] installs
//! the Prometheus exporter with an HTTP scrape endpoint.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Metrics exporter errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The Prometheus exporter could not be installed
    #[error("failed to install Prometheus exporter on {addr}: {reason}")]
    InstallFailed {
        /// Requested listen address
        addr: SocketAddr,
        /// Exporter error
        reason: String,
    },
}

/// Install the Prometheus exporter on `addr`
///
/// Idempotent: later calls are ignored. Must run inside a tokio runtime.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::InstallFailed {
            addr,
            reason: e.to_string(),
        })?;

    describe_counter!(
        "units_completed_total",
        Unit::Count,
        "Hours whose every file validated"
    );
    describe_counter!(
        "units_failed_total",
        Unit::Count,
        "Hours that failed to list or to complete"
    );
    describe_counter!(
        "files_skipped_total",
        Unit::Count,
        "Files already valid on disk"
    );
    describe_counter!(
        "files_fetched_total",
        Unit::Count,
        "Files transferred and validated"
    );
    describe_counter!(
        "transfer_attempts_total",
        Unit::Count,
        "Transfer attempts made"
    );
    describe_counter!(
        "transfer_failures_total",
        Unit::Count,
        "Transfer attempts reported as failed by the client"
    );
    describe_counter!(
        "fetch_exhausted_total",
        Unit::Count,
        "Files abandoned after the retry policy ran out"
    );
    describe_histogram!(
        "fetch_duration_seconds",
        Unit::Seconds,
        "Time from first check to a valid file"
    );

    *initialized = true;
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Check if the exporter has been installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record a finished hour
pub fn record_unit(completed: bool) {
    if completed {
        counter!("units_completed_total").increment(1);
    } else {
        counter!("units_failed_total").increment(1);
    }
}

/// Record one transfer attempt and whether the client reported success
pub fn record_transfer_attempt(client_ok: bool) {
    counter!("transfer_attempts_total").increment(1);
    if !client_ok {
        counter!("transfer_failures_total").increment(1);
    }
}

/// Per-file timing, started before the first validity check
pub struct FetchMetrics {
    start_time: Instant,
}

impl FetchMetrics {
    /// Start timing a file
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// The file was already valid
    pub fn record_skipped(&self) {
        counter!("files_skipped_total").increment(1);
    }

    /// The file validated after `attempts` transfers
    pub fn record_fetched(&self, attempts: u32) {
        let duration = self.start_time.elapsed();
        counter!("files_fetched_total").increment(1);
        histogram!("fetch_duration_seconds").record(duration.as_secs_f64());
        debug!(
            attempts = attempts,
            duration_ms = duration.as_millis(),
            "File fetched"
        );
    }

    /// The retry policy gave up
    pub fn record_exhausted(&self) {
        counter!("fetch_exhausted_total").increment(1);
    }
}
