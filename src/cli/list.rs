//! `list` command: print the selected remote filenames for one hour

use crate::fetcher::{CurlListingProvider, ListingProvider};
use crate::time::TimeUnit;
use clap::Parser;

use super::{Cli, CliError, OutputFormat};

/// List command arguments
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Hour to list (truncated to the hour, UTC)
    #[arg(long)]
    pub time: TimeUnit,
}

impl ListArgs {
    /// Execute the list command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let config = cli.mirror_config()?;
        let provider = CurlListingProvider::new(&config);
        let listing = provider.list(self.time).await?;

        match cli.output_format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "unit": self.time,
                    "remote_dir": listing.remote_dir,
                    "count": listing.filenames.len(),
                    "filenames": listing.filenames,
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                println!("{} ({} file(s))", listing.remote_dir, listing.filenames.len());
                for name in &listing.filenames {
                    println!("  {name}");
                }
            }
        }

        Ok(())
    }
}
