//! `check` command: validate local files without touching the network

use crate::validity::{NetCdfValidator, NonEmptyValidator, Validator};
use clap::Parser;
use std::path::PathBuf;

use super::{Cli, CliError, OutputFormat};

/// Check command arguments
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Files to check
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Accept any non-empty file instead of requiring netCDF
    #[arg(long, default_value_t = false)]
    pub any_format: bool,
}

impl CheckArgs {
    /// Execute the check command
    ///
    /// Fails with [`CliError::InvalidFiles`] when at least one path is invalid.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let validator: Box<dyn Validator> = if self.any_format {
            Box::new(NonEmptyValidator)
        } else {
            Box::new(NetCdfValidator::new())
        };

        let mut results = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            results.push((path, validator.is_valid(path).await));
        }
        let invalid = results.iter().filter(|(_, valid)| !valid).count();

        match cli.output_format {
            OutputFormat::Json => {
                let files: Vec<_> = results
                    .iter()
                    .map(|(path, valid)| {
                        serde_json::json!({ "path": path.display().to_string(), "valid": valid })
                    })
                    .collect();
                let output = serde_json::json!({
                    "checked": results.len(),
                    "invalid": invalid,
                    "files": files,
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                for (path, valid) in &results {
                    let status = if *valid { "valid" } else { "INVALID" };
                    println!("{status:>8}  {}", path.display());
                }
            }
        }

        if invalid > 0 {
            return Err(CliError::InvalidFiles(invalid));
        }
        Ok(())
    }
}
