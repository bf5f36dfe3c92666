//! Configuration management.
//!
//! Two layers: [`AppConfig`] holds host settings (logging, data location,
//! output) loaded from a file plus `BACKTEST__*` environment variables, and
//! [`RunConfig`] describes one backtest as handed to the sandbox.

mod components;
mod run;
mod settings;

pub use components::{Component, ComponentRegistry, ComponentSpec, ResolvedComponents};
pub use run::{
    CrossingPolicy, ExecutionSettings, ExitSettings, MarketMode, MarketSettings,
    PartialTakeProfit, RunConfig, ScaleInSettings, ScaleReference,
};
pub use settings::{AppConfig, AppSettings, DataSettings, LoggingConfig, OutputSettings};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load host configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("BACKTEST")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Host configuration from the environment only.
pub fn load_env_config() -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(
            Environment::with_prefix("BACKTEST")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
