//! Remote listing and transfer collaborators
//!
//! The orchestration engine talks to the archive through two traits:
//! [`ListingProvider`] enumerates the files of one hourly directory and
//! [`TransferClient`] performs a single fetch attempt. The shipped
//! implementations drive `curl` as a child process (see [`curl`]).

use crate::time::TimeUnit;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Component, Path};
use tracing::warn;

pub mod curl;
pub mod listing;

pub use curl::{CurlCommand, CurlTransferClient};
pub use listing::{CurlListingProvider, FileFilter, RemotePathTemplate};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Directory listing could not be retrieved
    #[error("listing failed for {dir}: {reason}")]
    ListingFailed {
        /// Remote directory that was queried
        dir: String,
        /// curl diagnostics or spawn error
        reason: String,
    },

    /// A single transfer attempt failed
    #[error("transfer failed for {remote}: {reason}")]
    TransferFailed {
        /// Remote file path
        remote: String,
        /// curl diagnostics or spawn error
        reason: String,
    },

    /// The transfer tool could not be started
    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed {
        /// Program name
        program: String,
        /// OS error
        reason: String,
    },
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Filenames present in one remote hourly directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteListing {
    /// Remote directory path relative to the endpoint root, with a trailing `/`
    pub remote_dir: String,
    /// Selected filenames, unique, in listing order
    pub filenames: Vec<String>,
}

/// Whether `name` is a single plain path component
///
/// Rejects `.`, `..`, absolute paths and anything holding a separator, so a
/// listed name can never resolve outside its hour directory.
pub fn is_plain_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    )
}

impl RemoteListing {
    /// Build a listing, dropping duplicate names while keeping first occurrences
    ///
    /// Names that are not plain filenames are skipped with a warning.
    pub fn new(remote_dir: impl Into<String>, filenames: impl IntoIterator<Item = String>) -> Self {
        let remote_dir = remote_dir.into();
        let mut seen = HashSet::new();
        let filenames = filenames
            .into_iter()
            .filter(|name| {
                if is_plain_filename(name) {
                    true
                } else {
                    warn!(remote_dir = %remote_dir, name = %name, "Skipping unsafe remote name");
                    false
                }
            })
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self {
            remote_dir,
            filenames,
        }
    }

    /// Whether the hour has nothing to download
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

/// Lists the files to download for one time unit
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Resolve the remote directory for `unit` and list its selected filenames
    ///
    /// Errors propagate to the caller unchanged; listing is not retried here.
    async fn list(&self, unit: TimeUnit) -> FetcherResult<RemoteListing>;
}

/// Performs one fetch attempt of a remote file into a local path
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Fetch `remote` into `local`, overwriting whatever is there
    async fn fetch(&self, remote: &str, local: &Path) -> FetcherResult<()>;
}
