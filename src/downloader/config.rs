//! Download configuration, constants and retry policy

use crate::downloader::DownloadError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default FTP host of the JAXA P-Tree service
pub const DEFAULT_HOST: &str = "ftp.ptree.jaxa.jp";

/// Default remote root under which product trees live
pub const DEFAULT_REMOTE_ROOT: &str = "pub/himawari";

/// Default number of concurrent file transfers per hour.
/// Six keeps the P-Tree server responsive without tripping its connection cap.
pub const DEFAULT_WORKERS: usize = 6;

/// Maximum transfer attempts per file under the bounded retry policy.
pub const MAX_ATTEMPTS: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}

/// Backoff curve applied between transfer attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// Constant delay between attempts
    Fixed(Duration),
    /// Doubling delay starting at one second, capped at [`MAX_BACKOFF_MS`]
    Exponential,
}

impl Backoff {
    /// Delay to wait after the `attempt`-th failed transfer (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential => calculate_backoff(attempt.saturating_sub(1)),
        }
    }
}

/// How a file fetch reacts when a transfer leaves the file invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Keep transferring until the file validates. A file that can never be
    /// fetched holds its worker slot forever.
    Forever {
        /// Pause between attempts, zero for back-to-back retries
        delay: Duration,
    },
    /// Give up after `max_attempts` transfers
    Bounded {
        /// Total transfer attempts allowed (at least 1)
        max_attempts: u32,
        /// Delay curve between attempts
        backoff: Backoff,
    },
}

impl RetryPolicy {
    /// Unbounded retries with no delay
    pub fn forever() -> Self {
        RetryPolicy::Forever {
            delay: Duration::ZERO,
        }
    }

    /// Bounded retries with exponential backoff
    pub fn bounded(max_attempts: u32) -> Self {
        RetryPolicy::Bounded {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential,
        }
    }

    /// Decide what follows the `attempt`-th failed transfer (1-based).
    ///
    /// Returns the delay before the next attempt, or `None` to give up.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            RetryPolicy::Forever { delay } => Some(*delay),
            RetryPolicy::Bounded {
                max_attempts,
                backoff,
            } => {
                if attempt >= *max_attempts {
                    None
                } else {
                    Some(backoff.delay(attempt))
                }
            }
        }
    }

    /// Whether this policy can give up on a file
    pub fn is_bounded(&self) -> bool {
        matches!(self, RetryPolicy::Bounded { .. })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(MAX_ATTEMPTS)
    }
}

/// Account used for both listing and transfer
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Registered account (an email address for P-Tree)
    pub user: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// `user:password` form used by curl's `-u`
    pub fn to_userpass(&self) -> String {
        format!("{}:{}", self.user, self.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// FTP host name
    pub host: String,
    /// Account credentials
    pub credentials: Credentials,
    /// Optional outbound proxy, passed to curl as `--proxy`
    /// (e.g. `socks5h://127.0.0.1:10808`)
    pub proxy: Option<String>,
}

impl Endpoint {
    /// Endpoint on the default P-Tree host without a proxy
    pub fn new(credentials: Credentials) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            credentials,
            proxy: None,
        }
    }

    /// Full `ftp://` URL for a path relative to the host root
    pub fn url_for(&self, path: &str) -> String {
        format!("ftp://{}/{}", self.host, path.trim_start_matches('/'))
    }
}

/// Data product coordinates used to build remote paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Product level (e.g. `L2`, `L3`)
    pub level: String,
    /// Product short name (e.g. `PAR`, `ARP`)
    pub name: String,
    /// Product version (e.g. `010`)
    pub version: String,
}

/// Complete configuration for a mirror run
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Remote endpoint
    pub endpoint: Endpoint,
    /// Root under the host holding all products
    pub remote_root: String,
    /// Product coordinates
    pub product: Product,
    /// Local directory the remote tree is mirrored into
    pub local_root: PathBuf,
    /// Concurrent transfers per hour
    pub workers: usize,
    /// Retry strategy for each file
    pub retry: RetryPolicy,
}

impl MirrorConfig {
    /// Configuration with default host, root, worker count and retry policy
    pub fn new(credentials: Credentials, product: Product, local_root: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: Endpoint::new(credentials),
            remote_root: DEFAULT_REMOTE_ROOT.to_string(),
            product,
            local_root: local_root.into(),
            workers: DEFAULT_WORKERS,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the proxy
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.endpoint.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fail fast on configuration that would make every unit fail
    ///
    /// Checks that credentials and product coordinates are present and that
    /// the local root can be created and written to.
    pub fn validate(&self) -> Result<(), DownloadError> {
        let required = [
            ("user", &self.endpoint.credentials.user),
            ("password", &self.endpoint.credentials.password),
            ("host", &self.endpoint.host),
            ("level", &self.product.level),
            ("product", &self.product.name),
            ("version", &self.product.version),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(DownloadError::ConfigError(format!("missing {name}")));
            }
        }

        std::fs::create_dir_all(&self.local_root).map_err(|e| {
            DownloadError::ConfigError(format!(
                "cannot create local root {}: {e}",
                self.local_root.display()
            ))
        })?;

        let probe = self.local_root.join(".write-probe");
        std::fs::write(&probe, b"").map_err(|e| {
            DownloadError::ConfigError(format!(
                "local root {} is not writable: {e}",
                self.local_root.display()
            ))
        })?;
        std::fs::remove_file(&probe).ok();

        Ok(())
    }
}
