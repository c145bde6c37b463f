//! Fetch jobs, per-file outcomes and per-hour reports

use crate::fetcher::is_plain_filename;
use crate::time::TimeUnit;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One file to mirror: a remote path and the local path it lands at
///
/// Immutable once built; jobs are created fresh for each batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchJob {
    remote: String,
    local: PathBuf,
}

impl FetchJob {
    /// Create a job
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }

    /// Build the batch for one listing: `remote_dir + name` to `local_dir/name`
    ///
    /// Names that are not plain filenames produce no job.
    pub fn batch(remote_dir: &str, local_dir: &Path, filenames: &[String]) -> Vec<Self> {
        filenames
            .iter()
            .filter(|name| is_plain_filename(name))
            .map(|name| Self::new(format!("{remote_dir}{name}"), local_dir.join(name)))
            .collect()
    }

    /// Remote path relative to the endpoint root
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Local destination
    pub fn local(&self) -> &Path {
        &self.local
    }
}

/// How a job reached completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FetchOutcome {
    /// The local file already validated; nothing was transferred
    SkippedAlreadyValid,
    /// The file validated after `attempts` transfers
    Fetched {
        /// Transfer attempts made
        attempts: u32,
    },
}

/// A job that a bounded retry policy gave up on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Every allowed transfer left the file invalid
    #[error("{remote} still invalid after {attempts} attempt(s)")]
    AttemptsExhausted {
        /// Remote path of the job
        remote: String,
        /// Transfers made
        attempts: u32,
    },

    /// Shutdown interrupted the wait between attempts
    #[error("{remote} abandoned after {attempts} attempt(s): shutdown requested")]
    Interrupted {
        /// Remote path of the job
        remote: String,
        /// Transfers made
        attempts: u32,
    },
}

/// Result of one hour's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BatchResult {
    /// Every file validated
    Completed {
        /// One outcome per job, in completion order
        outcomes: Vec<FetchOutcome>,
    },
    /// Listing, directory creation or at least one job failed
    Failed {
        /// Description of the failure
        error: String,
        /// Outcomes of the jobs that did finish, in completion order
        outcomes: Vec<FetchOutcome>,
    },
}

impl BatchResult {
    /// Whether the hour finished cleanly
    pub fn is_completed(&self) -> bool {
        matches!(self, BatchResult::Completed { .. })
    }

    /// Outcomes of the jobs that finished, whether or not the batch failed
    pub fn outcomes(&self) -> &[FetchOutcome] {
        match self {
            BatchResult::Completed { outcomes } | BatchResult::Failed { outcomes, .. } => outcomes,
        }
    }
}

/// Everything recorded about one hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    /// The hour processed
    pub unit: TimeUnit,
    /// Remote directory, when the listing succeeded
    pub remote_dir: Option<String>,
    /// Local directory, when the listing succeeded
    pub local_dir: Option<PathBuf>,
    /// Filenames considered
    pub filenames: Vec<String>,
    /// What happened
    pub result: BatchResult,
}

/// Summary of a whole run, in ascending unit order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Per-hour reports
    pub units: Vec<UnitReport>,
    /// Whether the run stopped early on shutdown
    pub interrupted: bool,
}

impl RunReport {
    /// Hours that completed
    pub fn units_completed(&self) -> usize {
        self.units.iter().filter(|u| u.result.is_completed()).count()
    }

    /// Hours that failed
    pub fn units_failed(&self) -> usize {
        self.units.len() - self.units_completed()
    }

    /// Files skipped because they were already valid
    pub fn files_skipped(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, FetchOutcome::SkippedAlreadyValid))
            .count()
    }

    /// Files transferred during this run
    pub fn files_fetched(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, FetchOutcome::Fetched { .. }))
            .count()
    }

    fn outcomes(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.units.iter().flat_map(|u| u.result.outcomes())
    }
}
