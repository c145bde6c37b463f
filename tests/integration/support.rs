//! In-memory collaborators for driving the engine without a network

use async_trait::async_trait;
use himawari_downloader::fetcher::{
    FetcherError, FetcherResult, ListingProvider, RemoteListing, TransferClient,
};
use himawari_downloader::shutdown::SharedShutdown;
use himawari_downloader::TimeUnit;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// Smallest complete classic netCDF file: CDF-1, zero records and three
/// absent lists
pub const CLASSIC_NETCDF: &[u8] = b"CDF\x01\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0";

pub fn hour(y: i32, m: u32, d: u32, h: u32) -> TimeUnit {
    TimeUnit::from_ymdh(y, m, d, h).unwrap()
}

pub fn remote_dir_for(unit: TimeUnit) -> String {
    format!("pub/himawari/L3/PAR/010/{}/", unit.format("%Y%m/%d/%H"))
}

/// Listing provider answering from a fixed table
///
/// Hours missing from the table list as empty.
#[derive(Default)]
pub struct ScriptedListing {
    listings: HashMap<TimeUnit, Result<Vec<String>, String>>,
    visited: Mutex<Vec<TimeUnit>>,
}

impl ScriptedListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(mut self, unit: TimeUnit, names: &[&str]) -> Self {
        self.listings
            .insert(unit, Ok(names.iter().map(|n| n.to_string()).collect()));
        self
    }

    pub fn failing(mut self, unit: TimeUnit, reason: &str) -> Self {
        self.listings.insert(unit, Err(reason.to_string()));
        self
    }

    pub fn visited(&self) -> Vec<TimeUnit> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingProvider for ScriptedListing {
    async fn list(&self, unit: TimeUnit) -> FetcherResult<RemoteListing> {
        self.visited.lock().unwrap().push(unit);
        let dir = remote_dir_for(unit);
        match self.listings.get(&unit) {
            Some(Ok(names)) => Ok(RemoteListing::new(dir, names.clone())),
            Some(Err(reason)) => Err(FetcherError::ListingFailed {
                dir,
                reason: reason.clone(),
            }),
            None => Ok(RemoteListing::new(dir, Vec::new())),
        }
    }
}

/// Transfer client writing a valid netCDF header, except for names marked
/// broken, which always receive garbage
#[derive(Default)]
pub struct RecordingTransfer {
    broken: HashSet<String>,
    shutdown_on_first: Option<SharedShutdown>,
    fetched: Mutex<Vec<String>>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken(mut self, filename: &str) -> Self {
        self.broken.insert(filename.to_string());
        self
    }

    /// Request shutdown while the first transfer is in flight
    pub fn shutdown_on_first(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown_on_first = Some(shutdown);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferClient for RecordingTransfer {
    async fn fetch(&self, remote: &str, local: &Path) -> FetcherResult<()> {
        self.fetched.lock().unwrap().push(remote.to_string());
        if let Some(shutdown) = &self.shutdown_on_first {
            shutdown.request_shutdown();
        }

        let name = remote.rsplit('/').next().unwrap_or(remote);
        let body: &[u8] = if self.broken.contains(name) {
            b"421 Too many connections"
        } else {
            CLASSIC_NETCDF
        };
        tokio::fs::write(local, body)
            .await
            .map_err(|e| FetcherError::TransferFailed {
                remote: remote.to_string(),
                reason: e.to_string(),
            })
    }
}
