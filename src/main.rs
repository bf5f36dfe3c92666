//! Backtesting command-line front end.

mod cli;

use anyhow::{Context, Result};
use backtest_config::{load_config, load_env_config, AppConfig};
use backtest_monitor::setup_logging;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load host configuration {}", path.display()))?,
        None => load_env_config().unwrap_or_else(|_| AppConfig::default()),
    };

    // Setup logging
    let level = cli
        .log_level
        .as_ref()
        .map_or(app.logging.level.as_str(), |level| level.as_str());
    let json = cli.json_logs || app.logging.is_json();
    let log_file = cli
        .log_file
        .as_deref()
        .or_else(|| app.logging.file.as_deref().map(Path::new));
    let _guard = setup_logging(level, json, log_file);

    // Execute command
    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &app).await,
        Commands::Strategies => cli::commands::strategies::run().await,
        Commands::ValidateConfig(args) => cli::commands::validate::run(args, &app).await,
    }
}
