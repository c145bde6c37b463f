//! curl-backed FTP transport
//!
//! Listing and transfer both shell out to `curl`, which handles FTP, the
//! account login and SOCKS/HTTP proxies. Each call is one child process;
//! the caller bounds how many run at once.
//!
//! The account is handed to curl as a config file on stdin (`--config -`),
//! so the password never appears in the process list.

use super::{FetcherError, FetcherResult, TransferClient};
use crate::downloader::config::{Credentials, Endpoint};
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const CURL_PROGRAM: &str = "curl";

/// Argument builder for one curl invocation against an [`Endpoint`]
#[derive(Debug, Clone)]
pub struct CurlCommand {
    program: String,
    args: Vec<String>,
    credentials: Credentials,
}

impl CurlCommand {
    /// Base invocation: silent but still reporting errors, authenticated
    /// through a stdin config, routed through the endpoint proxy when one
    /// is configured
    pub fn new(endpoint: &Endpoint) -> Self {
        let mut args = vec![
            "--silent".to_string(),
            "--show-error".to_string(),
            "--config".to_string(),
            "-".to_string(),
        ];
        if let Some(proxy) = &endpoint.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        Self {
            program: CURL_PROGRAM.to_string(),
            args,
            credentials: endpoint.credentials.clone(),
        }
    }

    /// Use a different executable (a wrapper script, or a full path to curl)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Name-only directory listing of `url`
    pub fn list_only(mut self, url: String) -> Self {
        self.args.push("--list-only".to_string());
        self.args.push(url);
        self
    }

    /// Download `url` into `local`
    pub fn download(mut self, url: String, local: &Path) -> Self {
        self.args.push("--output".to_string());
        self.args.push(local.to_string_lossy().into_owned());
        self.args.push(url);
        self
    }

    /// Program that will be executed
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Config text written to curl's stdin
    fn stdin_config(&self) -> String {
        format!("user = \"{}\"\n", quote_config(&self.credentials.to_userpass()))
    }

    /// Run to completion, capturing stdout and stderr
    pub async fn output(&self) -> FetcherResult<Output> {
        let spawn_failed = |e: std::io::Error| FetcherError::SpawnFailed {
            program: self.program.clone(),
            reason: e.to_string(),
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits without reading its config still reports
            // through its exit status
            if let Err(e) = stdin.write_all(self.stdin_config().as_bytes()).await {
                debug!(program = %self.program, error = %e, "Child did not read its config");
            }
        }

        child.wait_with_output().await.map_err(spawn_failed)
    }
}

/// Escape a value for a double-quoted curl config parameter
fn quote_config(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted
}

/// Summarize a failed curl run for error messages
pub(crate) fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    match output.status.code() {
        Some(code) if stderr.is_empty() => format!("curl exited with status {code}"),
        Some(code) => format!("curl exited with status {code}: {stderr}"),
        None => "curl terminated by signal".to_string(),
    }
}

/// [`TransferClient`] fetching one file per curl process
#[derive(Debug, Clone)]
pub struct CurlTransferClient {
    endpoint: Endpoint,
    program: Option<String>,
}

impl CurlTransferClient {
    /// Create a transfer client for `endpoint`
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            program: None,
        }
    }

    /// Override the executable used instead of `curl`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Build the curl command for one transfer
    pub fn command(&self, remote: &str, local: &Path) -> CurlCommand {
        let command = CurlCommand::new(&self.endpoint).download(self.endpoint.url_for(remote), local);
        match &self.program {
            Some(program) => command.with_program(program.clone()),
            None => command,
        }
    }
}

#[async_trait]
impl TransferClient for CurlTransferClient {
    async fn fetch(&self, remote: &str, local: &Path) -> FetcherResult<()> {
        debug!(remote = %remote, local = %local.display(), "Starting transfer");
        let output = self.command(remote, local).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(FetcherError::TransferFailed {
                remote: remote.to_string(),
                reason: describe_failure(&output),
            })
        }
    }
}
