//! CLI command implementations

pub mod check;
pub mod download;
pub mod error;
pub mod list;

pub use check::CheckArgs;
pub use download::{Cli, Commands, DownloadArgs, OutputFormat};
pub use error::CliError;
pub use list::ListArgs;
