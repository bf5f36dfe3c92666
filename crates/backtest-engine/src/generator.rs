//! Phase one: turning decisions into trade proposals.
//!
//! Every symbol is decided independently, so work units fan out on rayon and
//! write only to their own vectors. Ordering is fixed afterwards by the
//! [`Timeline`](crate::Timeline).

use std::collections::BTreeMap;
use std::sync::Arc;

use backtest_config::{ExitSettings, RunConfig, ScaleReference};
use backtest_core::error::{EngineError, EngineResult, StrategyError};
use backtest_core::traits::{DecisionContext, Strategy};
use backtest_core::types::{Candle, CandleWindow, Decision, Direction, Interval, PrefetchedOhlcv};
use backtest_indicators::Atr;
use backtest_strategies::StrategyHandle;
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::crossing::proposal_seed;
use crate::proposal::to_decimal;
use crate::{CandlePath, ExitResolver, TradeProposal, TradeProposalBuilder};

/// ATR period attached to proposal metadata.
const ATR_PERIOD: usize = 14;

/// Sanitized candle series shared by the generator and the replay.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    main: BTreeMap<String, Arc<[Candle]>>,
    detail: BTreeMap<String, Arc<[Candle]>>,
}

impl MarketData {
    /// Take the series of `symbols` from an already sanitized document.
    pub fn from_prefetched(data: &PrefetchedOhlcv, symbols: &[String]) -> Self {
        let mut main = BTreeMap::new();
        let mut detail = BTreeMap::new();
        for symbol in symbols {
            match data.series(symbol) {
                Some(rows) if !rows.is_empty() => {
                    main.insert(symbol.clone(), Arc::from(rows));
                }
                _ => warn!(symbol = %symbol, "No candles for symbol"),
            }
            if let Some(rows) = data.detail(symbol) {
                detail.insert(symbol.clone(), Arc::from(rows));
            }
        }
        Self { main, detail }
    }

    pub fn series(&self, symbol: &str) -> Option<&Arc<[Candle]>> {
        self.main.get(symbol)
    }

    pub fn detail(&self, symbol: &str) -> Option<&Arc<[Candle]>> {
        self.detail.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.main.keys()
    }

    /// Sorted union of every main-candle timestamp.
    pub fn clock(&self) -> Vec<i64> {
        let mut clock: Vec<i64> = self
            .main
            .values()
            .flat_map(|rows| rows.iter().map(|c| c.ts))
            .collect();
        clock.sort_unstable();
        clock.dedup();
        clock
    }

    /// Closing prices per clock tick, for symbols with a bar at that tick.
    pub fn bars(&self) -> Vec<(i64, BTreeMap<String, Decimal>)> {
        let mut bars: BTreeMap<i64, BTreeMap<String, Decimal>> = BTreeMap::new();
        for (symbol, rows) in &self.main {
            for candle in rows.iter() {
                bars.entry(candle.ts)
                    .or_default()
                    .insert(symbol.clone(), to_decimal(candle.close));
            }
        }
        bars.into_iter().collect()
    }
}

/// Per-run inputs of the generator.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub interval: Interval,
    pub lookback: usize,
    pub num_iterations: usize,
    pub allow_short: bool,
    pub exits: ExitSettings,
    /// Run-level seed of the random crossing policy
    pub crossing_seed: u64,
}

impl GeneratorSettings {
    pub fn from_config(config: &RunConfig, lookback: usize) -> Self {
        Self {
            interval: config.interval,
            lookback,
            num_iterations: config.num_iterations,
            allow_short: config.market.allow_short,
            exits: config.exits.clone(),
            crossing_seed: config.crossing_seed(),
        }
    }
}

/// Asks the strategy for a decision on every eligible bar of a symbol.
#[derive(Debug, Clone)]
pub struct ProposalGenerator {
    strategy: StrategyHandle,
    settings: GeneratorSettings,
    exit_resolver: Option<Arc<dyn ExitResolver>>,
}

impl ProposalGenerator {
    pub fn new(
        strategy: StrategyHandle,
        settings: GeneratorSettings,
        exit_resolver: Option<Arc<dyn ExitResolver>>,
    ) -> Self {
        Self {
            strategy,
            settings,
            exit_resolver,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Proposals for every symbol of a work unit, in symbol then bar order.
    pub fn generate_unit(&self, symbols: &[String], market: &MarketData) -> Vec<TradeProposal> {
        symbols
            .iter()
            .flat_map(|symbol| self.generate_symbol(symbol, market))
            .collect()
    }

    /// Proposals of one symbol.
    pub fn generate_symbol(&self, symbol: &str, market: &MarketData) -> Vec<TradeProposal> {
        let Some(rows) = market.series(symbol) else {
            return Vec::new();
        };
        let lookback = self.settings.lookback.max(1);
        if rows.len() < lookback {
            let err = EngineError::DataInsufficient {
                symbol: symbol.to_string(),
                required: lookback,
                available: rows.len(),
            };
            warn!(error = %err, "Skipping symbol");
            return Vec::new();
        }

        let ctx = DecisionContext {
            symbol,
            tp_ratio: self.settings.exits.tp_ratio,
            sl_ratio: self.settings.exits.sl_ratio,
        };
        let first = (lookback - 1).max(rows.len().saturating_sub(self.settings.num_iterations));
        let mut proposals = Vec::new();

        for i in first..rows.len().saturating_sub(1) {
            let window = CandleWindow::new(symbol, &rows[i + 1 - lookback..=i]);
            let decision = match self.strategy.decide(&window, self.settings.interval, &ctx) {
                Ok(decision) => decision,
                Err(StrategyError::InsufficientData { required, available }) => {
                    debug!(symbol, ts = rows[i].ts, required, available, "Window too short");
                    continue;
                }
                Err(e) => {
                    warn!(symbol, ts = rows[i].ts, error = %e, "Strategy failed, decision dropped");
                    continue;
                }
            };

            match self.build(symbol, rows, i, &decision, &window, &ctx, market) {
                Ok(Some(proposal)) => proposals.push(proposal),
                Ok(None) => {}
                Err(e) => warn!(symbol, ts = rows[i].ts, error = %e, "Proposal dropped"),
            }
        }

        debug!(symbol, count = proposals.len(), "Generated proposals");
        proposals
    }

    /// Candles a decision on bar `i` trades on.
    fn path(&self, symbol: &str, rows: &Arc<[Candle]>, i: usize, market: &MarketData) -> CandlePath {
        let delay = self.settings.exits.execution_delay_bars;
        if let Some(detail) = market.detail(symbol) {
            let bars = 1 + delay as i64;
            let start_ts = rows[i].ts + self.settings.interval.as_millis() * bars;
            let start = detail.partition_point(|c| c.ts < start_ts);
            return CandlePath::new(Arc::clone(detail), start, true);
        }
        CandlePath::new(Arc::clone(rows), i + 1 + delay, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        symbol: &str,
        rows: &Arc<[Candle]>,
        i: usize,
        decision: &Decision,
        window: &CandleWindow<'_>,
        ctx: &DecisionContext<'_>,
        market: &MarketData,
    ) -> EngineResult<Option<TradeProposal>> {
        let Some(direction) = decision.direction() else {
            return Ok(None);
        };
        if direction == Direction::Short && !self.settings.allow_short {
            debug!(symbol, ts = rows[i].ts, "SELL ignored, shorts disabled");
            return Ok(None);
        }
        decision.validate()?;

        let entry = decision.entry_or(rows[i].close);
        let sign = direction.sign_f64();
        let tp = decision.tp_price.unwrap_or_else(|| ctx.take_profit(entry, sign));
        let sl = decision.sl_price.unwrap_or_else(|| ctx.stop_loss(entry, sign));
        let path = self.path(symbol, rows, i, market);
        let exits = &self.settings.exits;

        let mut builder = TradeProposalBuilder::new(symbol, direction, rows[i].ts, entry)
            .take_profit(tp)
            .stop_loss(sl)
            .crossing(
                exits.crossing_policy,
                proposal_seed(self.settings.crossing_seed, symbol, rows[i].ts, direction),
            )
            .atr(Atr::new(ATR_PERIOD).latest_from_candles(window.rows()))
            .confidence(decision.confidence.unwrap_or(1.0))
            .strategy(self.strategy.name())
            .decision_size(decision.size.map(to_decimal));

        let scale = &exits.scale_in;
        if scale.tranches > 1 {
            let reference = match scale.reference {
                ScaleReference::Decision => entry,
                ScaleReference::Open => path.candles().first().map_or(entry, |c| c.open),
                ScaleReference::Close => rows[i].close,
            };
            builder = builder.scale_in(scale.tranches, scale.start_pct, scale.step_pct, reference);
        }
        if let Some(add_pct) = exits.add_pct {
            builder = builder.dca(add_pct);
        }
        if let Some(bars) = exits.max_holding_bars {
            builder = builder.max_holding_bars(bars);
        }
        if let Some(partial) = exits.partial_take_profit {
            builder = builder.partial_take_profit(partial);
        }
        if let Some(resolver) = &self.exit_resolver {
            builder = builder.custom_exit(Arc::clone(resolver));
        }

        builder.path(path).build().map(Some)
    }
}

/// Split symbols into work units of `per_unit` symbols each.
pub fn work_units(symbols: &[String], per_unit: usize) -> Vec<Vec<String>> {
    symbols
        .chunks(per_unit.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Generate every unit in parallel. `workers` sizes a dedicated pool;
/// `None` uses rayon's global pool.
pub fn generate_parallel(
    generator: &ProposalGenerator,
    units: &[Vec<String>],
    market: &MarketData,
    workers: Option<usize>,
) -> EngineResult<Vec<Vec<TradeProposal>>> {
    let fan_out = || -> Vec<Vec<TradeProposal>> {
        units
            .par_iter()
            .map(|unit| generator.generate_unit(unit, market))
            .collect()
    };

    match workers {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| EngineError::Config(format!("failed to build worker pool: {}", e)))?;
            Ok(pool.install(fan_out))
        }
        None => Ok(fan_out()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_strategies::{PayloadStrategy, StrategyRegistry};
    use serde_json::{json, Value};

    /// Buys on bars whose close is an exact multiple of ten.
    struct RoundNumbers;

    impl PayloadStrategy for RoundNumbers {
        fn decide(
            &self,
            window: &CandleWindow<'_>,
            _interval: Interval,
            _ctx: &DecisionContext<'_>,
        ) -> Result<Value, StrategyError> {
            let bar = window.current().ok_or(StrategyError::InsufficientData {
                required: 1,
                available: 0,
            })?;
            if bar.close % 10.0 == 0.0 {
                Ok(json!({"signal": "BUY", "entry_price": bar.close}))
            } else if bar.close < 0.0 {
                Ok(json!({"signal": "BUY", "entry_price": -1.0}))
            } else {
                Ok(json!({"signal": "NO"}))
            }
        }

        fn required_lookback(&self) -> usize {
            2
        }
    }

    /// Buys every bar with a fixed take-profit and no entry price.
    struct NoEntry;

    impl PayloadStrategy for NoEntry {
        fn decide(
            &self,
            _window: &CandleWindow<'_>,
            _interval: Interval,
            _ctx: &DecisionContext<'_>,
        ) -> Result<Value, StrategyError> {
            Ok(json!({"signal": "BUY", "tp_price": 30.0}))
        }

        fn required_lookback(&self) -> usize {
            2
        }
    }

    fn handle() -> StrategyHandle {
        let mut registry = StrategyRegistry::new();
        registry.register_dynamic(
            "tests",
            "RoundNumbers",
            Arc::new(|_: &Value| Ok::<_, StrategyError>(Arc::new(RoundNumbers) as Arc<dyn PayloadStrategy>)),
        );
        registry.create_dynamic("tests", "RoundNumbers", &Value::Null).unwrap()
    }

    fn settings(num_iterations: usize) -> GeneratorSettings {
        GeneratorSettings {
            interval: Interval::Daily,
            lookback: 2,
            num_iterations,
            allow_short: false,
            exits: ExitSettings::default(),
            crossing_seed: 42,
        }
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 86_400_000, c, c + 1.0, c - 1.0, c, 1.0))
            .collect()
    }

    fn market(closes: &[f64]) -> MarketData {
        let data = PrefetchedOhlcv::new().with_series("BTCUSDT", series(closes));
        MarketData::from_prefetched(&data, &["BTCUSDT".to_string()])
    }

    #[test]
    fn test_decisions_skip_first_and_last_bar() {
        let generator = ProposalGenerator::new(handle(), settings(100), None);
        let market = market(&[10.0, 20.0, 25.0, 30.0, 40.0]);

        let proposals = generator.generate_symbol("BTCUSDT", &market);
        // Bar 0 has no full window, bar 4 has no future
        let decided: Vec<i64> = proposals.iter().map(|p| p.meta.decision_time).collect();
        assert_eq!(decided, vec![86_400_000, 3 * 86_400_000]);

        let first = &proposals[0];
        assert_eq!(first.direction, Direction::Long);
        assert_eq!(first.entry_time(), 2 * 86_400_000);
        assert_eq!(first.candles().len(), 3);
        assert!((first.exits.take_profit.unwrap() - 22.0).abs() < 1e-9);
        assert!((first.exits.stop_loss.unwrap() - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_entry_falls_back_to_close() {
        let mut registry = StrategyRegistry::new();
        registry.register_dynamic(
            "tests",
            "NoEntry",
            Arc::new(|_: &Value| Ok::<_, StrategyError>(Arc::new(NoEntry) as Arc<dyn PayloadStrategy>)),
        );
        let handle = registry.create_dynamic("tests", "NoEntry", &Value::Null).unwrap();
        let generator = ProposalGenerator::new(handle, settings(100), None);

        // Bar 2 closes at 40, above the take-profit, and is dropped
        let proposals = generator.generate_symbol("BTCUSDT", &market(&[10.0, 20.0, 40.0, 50.0]));
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].meta.decision_time, 86_400_000);
        assert!((proposals[0].meta.entry_price - 20.0).abs() < 1e-9);
        assert_eq!(proposals[0].exits.take_profit, Some(30.0));
    }

    #[test]
    fn test_num_iterations_limits_bars() {
        let generator = ProposalGenerator::new(handle(), settings(2), None);
        let market = market(&[10.0, 20.0, 25.0, 30.0, 40.0]);

        let proposals = generator.generate_symbol("BTCUSDT", &market);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].meta.decision_time, 3 * 86_400_000);
    }

    #[test]
    fn test_short_series_and_invalid_payload_are_skipped() {
        let generator = ProposalGenerator::new(handle(), settings(100), None);
        assert!(generator.generate_symbol("BTCUSDT", &market(&[10.0])).is_empty());
        assert!(generator.generate_symbol("ETHUSDT", &market(&[10.0, 20.0])).is_empty());
        assert!(generator
            .generate_symbol("BTCUSDT", &market(&[5.0, -3.0, 5.0]))
            .is_empty());
    }

    #[test]
    fn test_future_candles_do_not_change_decisions() {
        let generator = ProposalGenerator::new(handle(), settings(100), None);
        let base = generator.generate_symbol("BTCUSDT", &market(&[10.0, 20.0, 25.0, 31.0]));
        let altered = generator.generate_symbol("BTCUSDT", &market(&[10.0, 20.0, 25.0, 99.0]));

        assert_eq!(base.len(), 1);
        assert_eq!(altered.len(), 1);
        assert_eq!(base[0].meta, altered[0].meta);
    }

    #[test]
    fn test_detail_path_starts_after_decision_bar() {
        let hour = 3_600_000;
        let detail: Vec<Candle> = (0..72)
            .map(|h| Candle::new(h * hour, 20.0, 21.0, 19.0, 20.0, 1.0))
            .collect();
        let data = PrefetchedOhlcv::new()
            .with_series("BTCUSDT", series(&[10.0, 20.0, 25.0]))
            .with_detail("BTCUSDT", detail);
        let market = MarketData::from_prefetched(&data, &["BTCUSDT".to_string()]);

        let generator = ProposalGenerator::new(handle(), settings(100), None);
        let proposals = generator.generate_symbol("BTCUSDT", &market);
        assert_eq!(proposals.len(), 1);
        assert!(proposals[0].path().is_detail());
        assert_eq!(proposals[0].entry_time(), 2 * 86_400_000);
        assert_eq!(proposals[0].candles().len(), 24);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let symbols: Vec<String> = ["AUSDT", "BUSDT", "CUSDT"].iter().map(|s| s.to_string()).collect();
        let mut data = PrefetchedOhlcv::new();
        for symbol in &symbols {
            data = data.with_series(symbol.clone(), series(&[10.0, 20.0, 30.0, 40.0]));
        }
        let market = MarketData::from_prefetched(&data, &symbols);
        let generator = ProposalGenerator::new(handle(), settings(100), None);

        let units = work_units(&symbols, 2);
        assert_eq!(units.len(), 2);

        let sequential = generator.generate_unit(&symbols, &market);
        let parallel: Vec<TradeProposal> = generate_parallel(&generator, &units, &market, Some(3))
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(sequential.len(), 6);
        assert_eq!(
            sequential.iter().map(|p| p.meta.clone()).collect::<Vec<_>>(),
            parallel.iter().map(|p| p.meta.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_market_clock_and_bars() {
        let data = PrefetchedOhlcv::new()
            .with_series("BTCUSDT", series(&[10.0, 20.0]))
            .with_series("ETHUSDT", vec![Candle::new(86_400_000, 5.0, 6.0, 4.0, 5.5, 1.0)]);
        let market = MarketData::from_prefetched(&data, &["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

        assert_eq!(market.clock(), vec![0, 86_400_000]);
        let bars = market.bars();
        assert_eq!(bars[0].1.len(), 1);
        assert_eq!(bars[1].1["ETHUSDT"], Decimal::new(55, 1));
    }
}
