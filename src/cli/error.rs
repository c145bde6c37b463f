//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::lock::LockError;
use crate::metrics::MetricsError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Another run holds the local tree
    #[error("lock error: {0}")]
    LockError(#[from] LockError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The run stopped early on Ctrl+C
    #[error("interrupted after {completed} of {requested} hour(s)")]
    Interrupted {
        /// Hours processed before stopping
        completed: usize,
        /// Hours requested
        requested: usize,
    },

    /// `check` found invalid files
    #[error("{0} file(s) failed validation")]
    InvalidFiles(usize),
}
