use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use himawari_downloader::downloader::config::RetryPolicy;
use himawari_downloader::downloader::{FetchError, FetchJob, FileFetcher};
use himawari_downloader::fetcher::{FetcherError, FetcherResult, TransferClient};
use himawari_downloader::shutdown::ShutdownCoordinator;
use himawari_downloader::validity::NetCdfValidator;
use std::path::Path;

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    // Give the task time to start waiting
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// A request made before anyone waits must not be lost
#[tokio::test]
async fn shutdown_requested_before_wait_does_not_deadlock() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() deadlocked despite shutdown already requested");
}

#[tokio::test]
async fn shutdown_concurrent_waiters_all_notified() {
    let shutdown = ShutdownCoordinator::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        }));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "A waiter was not notified of shutdown");
    }
}

#[tokio::test]
async fn shutdown_is_latching() {
    let shutdown = ShutdownCoordinator::shared();
    assert!(!shutdown.is_shutdown_requested());
    shutdown.request_shutdown();
    shutdown.request_shutdown();
    assert!(shutdown.is_shutdown_requested());
}

/// Always fails and leaves nothing behind
struct DeadTransfer;

#[async_trait]
impl TransferClient for DeadTransfer {
    async fn fetch(&self, remote: &str, _local: &Path) -> FetcherResult<()> {
        Err(FetcherError::TransferFailed {
            remote: remote.to_string(),
            reason: "curl: (7) Failed to connect".to_string(),
        })
    }
}

/// Under an unbounded policy only shutdown can end a hopeless fetch
#[tokio::test]
async fn shutdown_cuts_forever_retry_short() {
    let temp = tempfile::TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let fetcher = FileFetcher::new(Arc::new(NetCdfValidator::new()), Arc::new(DeadTransfer))
        .with_retry(RetryPolicy::Forever {
            delay: Duration::from_secs(60),
        })
        .with_shutdown(shutdown.clone());
    let job = FetchJob::new("pub/himawari/a.nc", temp.path().join("a.nc"));

    let task = tokio::spawn(async move { fetcher.ensure(&job).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("fetch did not stop on shutdown")
        .unwrap();
    assert!(matches!(result, Err(FetchError::Interrupted { attempts: 1, .. })));
}
