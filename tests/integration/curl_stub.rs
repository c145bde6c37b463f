//! Curl-backed collaborators driven by a stand-in script

#![cfg(unix)]

use super::support::hour;
use himawari_downloader::downloader::config::{Credentials, Product};
use himawari_downloader::fetcher::{
    CurlListingProvider, CurlTransferClient, FetcherError, FileFilter, ListingProvider,
    TransferClient,
};
use himawari_downloader::validity::{NetCdfValidator, Validator};
use himawari_downloader::MirrorConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(product: &str, root: &Path) -> MirrorConfig {
    MirrorConfig::new(
        Credentials::new("me@example.com", "secret"),
        Product {
            level: "L3".into(),
            name: product.into(),
            version: "010".into(),
        },
        root,
    )
}

#[tokio::test]
async fn test_listing_parses_name_list_and_filters_par() {
    let temp = TempDir::new().unwrap();
    let script = write_script(
        temp.path(),
        "list.sh",
        r"printf 'H08_20200101_0000_RFL010_FLDK.02401_02401.nc\r\nH08_20200101_0000_RFL010_FLDK.04801_04801.nc\r\n\r\n'",
    );

    let provider = CurlListingProvider::new(&config("PAR", temp.path()))
        .with_program(script.to_string_lossy());
    let listing = provider.list(hour(2020, 1, 1, 0)).await.unwrap();

    assert_eq!(listing.remote_dir, "pub/himawari/L3/PAR/010/202001/01/00/");
    assert_eq!(
        listing.filenames,
        vec!["H08_20200101_0000_RFL010_FLDK.02401_02401.nc".to_string()]
    );

    let unfiltered = provider.with_filter(FileFilter::All);
    let listing = unfiltered.list(hour(2020, 1, 1, 0)).await.unwrap();
    assert_eq!(listing.filenames.len(), 2);
}

#[tokio::test]
async fn test_listing_nonzero_exit_is_listing_error() {
    let temp = TempDir::new().unwrap();
    let script = write_script(
        temp.path(),
        "deny.sh",
        "echo 'curl: (9) Server denied you to change to the given directory' >&2\nexit 9",
    );

    let provider = CurlListingProvider::new(&config("ARP", temp.path()))
        .with_program(script.to_string_lossy());
    let err = provider.list(hour(2021, 6, 30, 23)).await.unwrap_err();

    match err {
        FetcherError::ListingFailed { dir, reason } => {
            assert_eq!(dir, "pub/himawari/L3/ARP/010/202106/30/23/");
            assert!(reason.contains("status 9"));
            assert!(reason.contains("Server denied"));
        }
        other => panic!("expected listing error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transfer_writes_output_argument() {
    let temp = TempDir::new().unwrap();
    // Write an empty CDF-1 file to whatever follows --output
    let script = write_script(
        temp.path(),
        "fetch.sh",
        r#"while [ "$#" -gt 0 ]; do
  if [ "$1" = "--output" ]; then shift; { printf 'CDF\001'; head -c 28 /dev/zero; } > "$1"; fi
  shift
done"#,
    );

    let cfg = config("PAR", temp.path());
    let client = CurlTransferClient::new(cfg.endpoint.clone()).with_program(script.to_string_lossy());
    let local = temp.path().join("a.nc");
    client
        .fetch("pub/himawari/L3/PAR/010/202001/01/00/a.nc", &local)
        .await
        .unwrap();

    assert!(NetCdfValidator::new().is_valid(&local).await);
}

#[tokio::test]
async fn test_transfer_failure_carries_curl_diagnostics() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), "fail.sh", "echo 'curl: (28) Timeout' >&2\nexit 28");

    let cfg = config("PAR", temp.path());
    let client = CurlTransferClient::new(cfg.endpoint.clone()).with_program(script.to_string_lossy());
    let err = client
        .fetch("pub/himawari/x.nc", &temp.path().join("x.nc"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::TransferFailed { .. }));
    assert!(err.to_string().contains("Timeout"));
}

#[tokio::test]
async fn test_account_is_sent_on_stdin() {
    let temp = TempDir::new().unwrap();
    let args_file = temp.path().join("args.txt");
    let stdin_file = temp.path().join("stdin.txt");
    let script = write_script(
        temp.path(),
        "record.sh",
        &format!(
            "printf '%s\\n' \"$@\" > '{}'\ncat > '{}'",
            args_file.display(),
            stdin_file.display()
        ),
    );

    let provider = CurlListingProvider::new(&config("ARP", temp.path()))
        .with_program(script.to_string_lossy());
    let listing = provider.list(hour(2020, 1, 1, 0)).await.unwrap();
    assert!(listing.is_empty());

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert!(!args.contains("secret"));
    assert!(args.lines().any(|a| a == "--config"));
    let stdin = std::fs::read_to_string(&stdin_file).unwrap();
    assert_eq!(stdin, "user = \"me@example.com:secret\"\n");
}

#[tokio::test]
async fn test_listing_drops_names_with_path_components() {
    let temp = TempDir::new().unwrap();
    let script = write_script(
        temp.path(),
        "list.sh",
        r"printf '../../../../tmp/evil.nc\r\n/etc/evil.nc\r\nok.nc\r\n'",
    );

    let provider = CurlListingProvider::new(&config("ARP", temp.path()))
        .with_program(script.to_string_lossy());
    let listing = provider.list(hour(2020, 1, 1, 0)).await.unwrap();
    assert_eq!(listing.filenames, vec!["ok.nc".to_string()]);
}
