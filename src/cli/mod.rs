//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backtest")]
#[command(author, version, about = "Deterministic two-phase event-driven backtester")]
pub struct Cli {
    /// Host configuration file (logging, data location, output)
    #[arg(short, long, env = "BACKTEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overrides the host configuration
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a backtest described by a run configuration
    #[command(alias = "backtest")]
    Run(RunArgs),
    /// List builtin strategies
    Strategies,
    /// Validate the host configuration and, optionally, a run configuration
    ValidateConfig(ValidateArgs),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Run configuration (JSON, or TOML by extension)
    pub run_config: PathBuf,

    /// Directory of per-symbol CSV files, overrides the host configuration
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Prefetched OHLCV JSON document; takes precedence over CSV data
    #[arg(long, conflicts_with = "data")]
    pub prefetched: Option<PathBuf>,

    /// Symbols to run (comma-separated), overrides the run configuration
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// First day of CSV data to load (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// Last day of CSV data to load (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Also load higher-resolution detail candles
    #[arg(long)]
    pub detail: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Save the JSON report to this file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Save the equity curve as CSV to this file
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Run configuration to check as well
    pub run_config: Option<PathBuf>,
}
