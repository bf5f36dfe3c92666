//! Pure entry point: configuration and candles in, report out.

use std::fmt;
use std::sync::Arc;

use backtest_config::{ComponentRegistry, RunConfig};
use backtest_core::error::{DataError, EngineError, EngineResult};
use backtest_core::traits::Strategy;
use backtest_core::types::PrefetchedOhlcv;
use backtest_ledger::TransactionLedger;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    generate_parallel, work_units, ExitResolver, GeneratorSettings, MarketData, PortfolioManager,
    PortfolioSettings, ProposalGenerator, RunReport, Timeline,
};

/// Result of a run as handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Success(RunReport),
    Error { message: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Success(report) => Some(report),
            RunOutcome::Error { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<RunReport, String> {
        match self {
            RunOutcome::Success(report) => Ok(report),
            RunOutcome::Error { message } => Err(message),
        }
    }
}

/// Runs backtests with a fixed set of host registrations.
///
/// A run reads nothing but its arguments: no files, network, environment
/// or wall clock.
#[derive(Clone, Default)]
pub struct Sandbox {
    registry: ComponentRegistry,
    exit_resolver: Option<Arc<dyn ExitResolver>>,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("exit_resolver", &self.exit_resolver)
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sandbox resolving components against a host registry.
    pub fn with_registry(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            exit_resolver: None,
        }
    }

    /// Check every open trade with `resolver` before the built-in exits.
    pub fn with_exit_resolver(mut self, resolver: Arc<dyn ExitResolver>) -> Self {
        self.exit_resolver = Some(resolver);
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Run on prefetched candles. Errors become an error outcome.
    pub fn run(&self, config: &RunConfig, data: &PrefetchedOhlcv) -> RunOutcome {
        match self.execute(config, data) {
            Ok(report) => RunOutcome::Success(report),
            Err(e) => {
                warn!(error = %e, "Run failed");
                RunOutcome::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Run on the candles embedded in the configuration.
    pub fn run_embedded(&self, config: &RunConfig) -> RunOutcome {
        match &config.ohlcv_data {
            Some(data) => self.run(config, data),
            None => RunOutcome::Error {
                message: EngineError::Config("ohlcv_data is required for an embedded run".into())
                    .to_string(),
            },
        }
    }

    /// Both phases of a run.
    pub fn execute(&self, config: &RunConfig, data: &PrefetchedOhlcv) -> EngineResult<RunReport> {
        config.validate()?;
        let components = self.registry.resolve(config)?;

        let mut data = data.clone();
        let dropped = data.sanitize();
        if dropped > 0 {
            warn!(dropped, "Dropped malformed or duplicate candles");
        }
        let market = MarketData::from_prefetched(&data, &config.symbols);
        if market.symbols().next().is_none() {
            return Err(DataError::NoDataAvailable.into());
        }

        let lookback = config
            .lookback
            .unwrap_or(0)
            .max(components.strategy.required_lookback())
            .max(1);
        info!(
            strategy = components.strategy.name(),
            symbols = config.symbols.len(),
            interval = %config.interval,
            lookback,
            "Starting run"
        );

        let generator = ProposalGenerator::new(
            components.strategy,
            GeneratorSettings::from_config(config, lookback),
            self.exit_resolver.clone(),
        );
        let units = work_units(&config.symbols, config.execution.symbols_per_unit);
        let batches = generate_parallel(&generator, &units, &market, config.execution.workers)?;
        let timeline = Timeline::merge(batches, market.clock());
        info!(
            proposals = timeline.len(),
            bars = timeline.clock().len(),
            "Proposals generated"
        );

        let ledger = TransactionLedger::new(
            components.fee_model,
            components.slippage_model,
            components.fill_policy,
            config.seed,
        );
        let mut portfolio = PortfolioManager::new(
            PortfolioSettings {
                initial_cash: config.initial_cash,
                interval_ms: config.interval.as_millis(),
                market: config.market.clone(),
                risk: config.risk.clone(),
            },
            components.sizing_model,
            components.capacity_policy,
            ledger,
        );
        portfolio.schedule(timeline.proposals().iter().cloned());

        for (ts, marks) in market.bars() {
            portfolio.on_bar(ts, &marks)?;
        }
        let last = timeline.clock().last().copied().unwrap_or_default();
        portfolio.finish(last + 1)?;

        let report = portfolio.results()?;
        info!(
            trades = report.trade_log.len(),
            rejected = report.rejected_proposals.len(),
            final_equity = %report.final_equity,
            "Run complete"
        );
        Ok(report)
    }
}

/// Run with the builtin components only.
pub fn run(config: &RunConfig, data: &PrefetchedOhlcv) -> RunOutcome {
    Sandbox::new().run(config, data)
}

/// Run on `config.ohlcv_data` with the builtin components only.
pub fn run_embedded(config: &RunConfig) -> RunOutcome {
    Sandbox::new().run_embedded(config)
}
