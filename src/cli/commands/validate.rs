//! Validate configuration command.

use anyhow::Result;
use backtest_config::{AppConfig, ComponentRegistry, RunConfig};
use backtest_core::traits::Strategy;

use crate::cli::ValidateArgs;

pub async fn run(args: ValidateArgs, app: &AppConfig) -> Result<()> {
    println!("Host configuration is valid!");
    println!();
    println!("App: {}", app.app.name);
    println!("Environment: {}", app.app.environment);
    println!("Log level: {}", app.logging.level);
    println!("CSV directory: {}", app.data.csv_dir);
    println!("Output directory: {}", app.output.dir);

    let Some(path) = args.run_config else {
        return Ok(());
    };

    println!();
    println!("Validating run configuration: {:?}", path);
    let checked = RunConfig::from_path(&path).and_then(|config| {
        config.validate()?;
        let components = ComponentRegistry::new().resolve(&config)?;
        Ok((config, components))
    });

    match checked {
        Ok((config, components)) => {
            println!("Run configuration is valid!");
            println!();
            println!("Symbols: {}", config.symbols.join(", "));
            println!("Interval: {}", config.interval);
            println!("Initial cash: {}", config.initial_cash);
            println!("Strategy: {}", components.strategy.name());
            println!("Fee model: {}", components.fee_model.name());
            println!("Slippage model: {}", components.slippage_model.name());
            println!("Fill policy: {}", components.fill_policy.name());
            println!("Sizing model: {}", components.sizing_model.name());
            println!("Capacity policy: {}", components.capacity_policy.name());
            println!("Market: {:?}", config.market.mode);
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            Err(e.into())
        }
    }
}
