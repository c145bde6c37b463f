//! Hourly directory listing
//!
//! Remote layout: `<root>/<level>/<product>/<version>/<YYYYMM>/<DD>/<HH>/`.

use super::curl::{describe_failure, CurlCommand};
use super::{is_plain_filename, FetcherError, FetcherResult, ListingProvider, RemoteListing};
use crate::downloader::config::{Endpoint, MirrorConfig, Product};
use crate::time::TimeUnit;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Suffix identifying the global 5 km grid in the PAR product, which also
/// carries a 1 km Japan-area variant in the same directory
pub const PAR_GLOBAL_SUFFIX: &str = "02401_02401.nc";

/// Maps a time unit to its remote directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePathTemplate {
    product_root: String,
}

impl RemotePathTemplate {
    /// Template for `product` under `remote_root`
    pub fn new(remote_root: &str, product: &Product) -> Self {
        let root = remote_root.trim_matches('/');
        let product_root = if root.is_empty() {
            format!("{}/{}/{}/", product.level, product.name, product.version)
        } else {
            format!(
                "{root}/{}/{}/{}/",
                product.level, product.name, product.version
            )
        };
        Self { product_root }
    }

    /// Product directory shared by every hour, with a trailing `/`
    pub fn product_root(&self) -> &str {
        &self.product_root
    }

    /// Remote directory of `unit`, with a trailing `/`
    pub fn dir_for(&self, unit: TimeUnit) -> String {
        format!("{}{}", self.product_root, unit.format("%Y%m/%d/%H/"))
    }
}

/// Selects which listed filenames are downloaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FileFilter {
    /// Keep every name
    #[default]
    All,
    /// Keep names ending with the given suffix
    Suffix(String),
}

impl FileFilter {
    /// Filter appropriate for a product short name
    pub fn for_product(product: &str) -> Self {
        if product.eq_ignore_ascii_case("PAR") {
            FileFilter::Suffix(PAR_GLOBAL_SUFFIX.to_string())
        } else {
            FileFilter::All
        }
    }

    /// Whether `name` is selected
    pub fn matches(&self, name: &str) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::Suffix(suffix) => name.ends_with(suffix.as_str()),
        }
    }
}

/// Split a name-only FTP listing into filenames
///
/// Servers answer with CRLF line endings; bare LF is accepted too. Blank
/// lines are dropped, as are names that are not a single plain path
/// component (`..`, `/etc/x`, `a/b.nc`).
pub fn parse_name_list(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| line.trim_end_matches('\r').trim())
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let plain = is_plain_filename(line);
            if !plain {
                warn!(name = %line, "Skipping listed name that is not a plain filename");
            }
            plain
        })
        .map(str::to_string)
        .collect()
}

/// [`ListingProvider`] issuing `curl --list-only` against the FTP endpoint
#[derive(Debug, Clone)]
pub struct CurlListingProvider {
    endpoint: Endpoint,
    template: RemotePathTemplate,
    filter: FileFilter,
    program: Option<String>,
}

impl CurlListingProvider {
    /// Create a provider for the configured product, using the product's
    /// default filename filter
    pub fn new(config: &MirrorConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            template: RemotePathTemplate::new(&config.remote_root, &config.product),
            filter: FileFilter::for_product(&config.product.name),
            program: None,
        }
    }

    /// Replace the filename filter
    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Override the executable used instead of `curl`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Path template in use
    pub fn template(&self) -> &RemotePathTemplate {
        &self.template
    }

    fn command(&self, dir: &str) -> CurlCommand {
        let command = CurlCommand::new(&self.endpoint).list_only(self.endpoint.url_for(dir));
        match &self.program {
            Some(program) => command.with_program(program.clone()),
            None => command,
        }
    }
}

#[async_trait]
impl ListingProvider for CurlListingProvider {
    async fn list(&self, unit: TimeUnit) -> FetcherResult<RemoteListing> {
        let dir = self.template.dir_for(unit);
        debug!(unit = %unit, remote_dir = %dir, "Listing remote directory");

        let output = self
            .command(&dir)
            .output()
            .await
            .map_err(|e| FetcherError::ListingFailed {
                dir: dir.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FetcherError::ListingFailed {
                dir,
                reason: describe_failure(&output),
            });
        }

        let body = String::from_utf8_lossy(&output.stdout);
        let names = parse_name_list(&body)
            .into_iter()
            .filter(|name| self.filter.matches(name));

        Ok(RemoteListing::new(dir, names))
    }
}
