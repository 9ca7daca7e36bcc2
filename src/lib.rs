pub mod ai;
pub mod capture_date;
pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod gallery;
pub mod media_utils;
pub mod models;
pub mod source;

pub use config::AppConfig;
pub use database::Database;
pub use errors::{AppError, AppResult};
pub use gallery::{GalleryState, UserPrompt};

use clap::Parser;

/// Parse the command line and run one command.
pub async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    cli::run(cli).await
}
