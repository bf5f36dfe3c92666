//! List strategies command.

use anyhow::Result;
use backtest_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  defaults: {}", info.default_config);
        println!();
    }

    println!("Select one in the run configuration, e.g. strategy = \"ma_crossover\"");
    println!("or strategy = {{ builtin = \"ma_crossover\", params = {{ fast_period = 10 }} }}.");

    Ok(())
}
