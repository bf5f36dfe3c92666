//! Run configuration handed to the sandbox.

use std::collections::BTreeSet;
use std::path::Path;

use backtest_core::error::EngineError;
use backtest_core::types::{Interval, PrefetchedOhlcv};
use backtest_risk::RiskLimits;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::ComponentSpec;

/// Eight hours, the usual perpetual funding period.
const FUNDING_INTERVAL_MS: i64 = 8 * 60 * 60 * 1000;

/// Which exit wins when one candle reaches both take-profit and stop-loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossingPolicy {
    #[default]
    PreferSl,
    PreferTp,
    Random,
}

/// Price the scale-in ladder is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScaleReference {
    /// Entry price of the decision
    #[default]
    Decision,
    /// Open of the first tradable candle
    Open,
    /// Close of the decision bar
    Close,
}

/// Split the entry into `tranches`. The first fills immediately; tranche `k`
/// (counting from zero) rests `start_pct + k * step_pct` beyond the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleInSettings {
    pub tranches: usize,
    pub start_pct: f64,
    pub step_pct: f64,
    pub reference: ScaleReference,
}

impl Default for ScaleInSettings {
    fn default() -> Self {
        Self {
            tranches: 1,
            start_pct: 0.01,
            step_pct: 0.01,
            reference: ScaleReference::Decision,
        }
    }
}

/// Close `fraction` of the filled quantity once price moves `ratio` in favour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTakeProfit {
    pub ratio: f64,
    pub fraction: f64,
}

/// Bracket and trade-management settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitSettings {
    pub tp_ratio: f64,
    pub sl_ratio: f64,
    pub crossing_policy: CrossingPolicy,
    /// Seed of the random crossing policy; falls back to the run seed
    pub seed: Option<u64>,
    /// DCA add leg this many percent beyond the filled entry
    pub add_pct: Option<f64>,
    pub scale_in: ScaleInSettings,
    /// Close at the bar's close after this many bars in the trade
    pub max_holding_bars: Option<usize>,
    pub partial_take_profit: Option<PartialTakeProfit>,
    /// Candles skipped after the decision before anything can fill
    pub execution_delay_bars: usize,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            tp_ratio: 0.1,
            sl_ratio: 0.05,
            crossing_policy: CrossingPolicy::PreferSl,
            seed: None,
            add_pct: None,
            scale_in: ScaleInSettings::default(),
            max_holding_bars: None,
            partial_take_profit: None,
            execution_delay_bars: 0,
        }
    }
}

/// Spot or perpetual-futures accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarketMode {
    #[default]
    Spot,
    Perpetual,
}

/// Market settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub mode: MarketMode,
    pub leverage: Decimal,
    /// Funding rate charged per interval on position notional
    pub funding_rate: Decimal,
    pub funding_interval_ms: i64,
    pub maintenance_margin_rate: Decimal,
    /// Turn SELL decisions into short trades
    pub allow_short: bool,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            mode: MarketMode::Spot,
            leverage: Decimal::ONE,
            funding_rate: dec!(0.0001),
            funding_interval_ms: FUNDING_INTERVAL_MS,
            maintenance_margin_rate: dec!(0.005),
            allow_short: false,
        }
    }
}

impl MarketSettings {
    pub fn is_perpetual(&self) -> bool {
        self.mode == MarketMode::Perpetual
    }
}

/// Phase-one parallelism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Worker threads; `None` uses rayon's default
    pub workers: Option<usize>,
    /// Symbols per work-unit
    pub symbols_per_unit: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            workers: None,
            symbols_per_unit: 1,
        }
    }
}

fn default_iterations() -> usize {
    100
}

fn default_cash() -> Decimal {
    dec!(10000)
}

/// One backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub strategy: Option<ComponentSpec>,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default = "default_iterations")]
    pub num_iterations: usize,
    /// Overrides the strategy's own lookback when larger
    #[serde(default)]
    pub lookback: Option<usize>,
    #[serde(default = "default_cash")]
    pub initial_cash: Decimal,
    #[serde(default)]
    pub fee_model: Option<ComponentSpec>,
    #[serde(default)]
    pub slippage_model: Option<ComponentSpec>,
    #[serde(default)]
    pub fill_policy: Option<ComponentSpec>,
    #[serde(default)]
    pub sizing_model: Option<ComponentSpec>,
    #[serde(default)]
    pub capacity_policy: Option<ComponentSpec>,
    #[serde(default)]
    pub exits: ExitSettings,
    #[serde(default)]
    pub market: MarketSettings,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub seed: u64,
    /// Candles embedded by the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ohlcv_data: Option<PrefetchedOhlcv>,
}

impl RunConfig {
    /// Minimal configuration for a symbol list; everything else defaults.
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            strategy: None,
            symbols,
            interval: Interval::default(),
            num_iterations: default_iterations(),
            lookback: None,
            initial_cash: default_cash(),
            fee_model: None,
            slippage_model: None,
            fill_policy: None,
            sizing_model: None,
            capacity_policy: None,
            exits: ExitSettings::default(),
            market: MarketSettings::default(),
            risk: RiskLimits::default(),
            execution: ExecutionSettings::default(),
            seed: 0,
            ohlcv_data: None,
        }
    }

    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read a file, choosing the format by extension (JSON unless `.toml`).
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Seed of the random crossing policy.
    pub fn crossing_seed(&self) -> u64 {
        self.exits.seed.unwrap_or(self.seed)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::Config(msg));

        if self.symbols.is_empty() {
            return invalid("at least one symbol is required".into());
        }
        let mut seen = BTreeSet::new();
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return invalid("symbol names must not be empty".into());
            }
            if !seen.insert(symbol.as_str()) {
                return invalid(format!("duplicate symbol {}", symbol));
            }
        }
        if self.num_iterations == 0 {
            return invalid("num_iterations must be positive".into());
        }
        if self.lookback == Some(0) {
            return invalid("lookback must be positive".into());
        }
        if self.initial_cash <= Decimal::ZERO {
            return invalid(format!("initial_cash must be positive, got {}", self.initial_cash));
        }

        let exits = &self.exits;
        if !(exits.tp_ratio.is_finite() && exits.tp_ratio > 0.0) {
            return invalid(format!("tp_ratio must be positive, got {}", exits.tp_ratio));
        }
        if !(exits.sl_ratio.is_finite() && exits.sl_ratio > 0.0 && exits.sl_ratio < 1.0) {
            return invalid(format!("sl_ratio must be in (0, 1), got {}", exits.sl_ratio));
        }
        if let Some(add) = exits.add_pct {
            if !(add.is_finite() && add > 0.0 && add < 100.0) {
                return invalid(format!("add_pct must be in (0, 100), got {}", add));
            }
        }
        let scale = &exits.scale_in;
        if scale.tranches == 0 {
            return invalid("scale_in.tranches must be at least 1".into());
        }
        if scale.tranches > 1
            && !(scale.start_pct >= 0.0 && scale.step_pct >= 0.0
                && scale.start_pct + scale.step_pct * (scale.tranches - 1) as f64 <= 0.9)
        {
            return invalid("scale_in ladder must stay within 90% of the reference".into());
        }
        if exits.max_holding_bars == Some(0) {
            return invalid("max_holding_bars must be positive".into());
        }
        if let Some(partial) = exits.partial_take_profit {
            if !(partial.ratio.is_finite() && partial.ratio > 0.0) {
                return invalid(format!("partial_take_profit.ratio must be positive, got {}", partial.ratio));
            }
            if !(partial.fraction > 0.0 && partial.fraction < 1.0) {
                return invalid(format!(
                    "partial_take_profit.fraction must be in (0, 1), got {}",
                    partial.fraction
                ));
            }
        }

        let market = &self.market;
        if market.leverage < Decimal::ONE {
            return invalid(format!("leverage must be at least 1, got {}", market.leverage));
        }
        if !market.is_perpetual() && market.leverage > Decimal::ONE {
            return invalid("leverage above 1 requires perpetual mode".into());
        }
        if !market.is_perpetual() && market.allow_short {
            return invalid("allow_short requires perpetual mode".into());
        }
        if market.funding_interval_ms <= 0 {
            return invalid("funding_interval_ms must be positive".into());
        }
        if market.maintenance_margin_rate < Decimal::ZERO || market.maintenance_margin_rate >= Decimal::ONE {
            return invalid(format!(
                "maintenance_margin_rate must be in [0, 1), got {}",
                market.maintenance_margin_rate
            ));
        }

        if self.execution.workers == Some(0) {
            return invalid("execution.workers must be positive".into());
        }
        if self.execution.symbols_per_unit == 0 {
            return invalid("execution.symbols_per_unit must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let config = RunConfig::from_json(r#"{"symbols": ["BTCUSDT"]}"#).unwrap();

        assert_eq!(config.num_iterations, 100);
        assert_eq!(config.initial_cash, dec!(10000));
        assert_eq!(config.interval, Interval::Daily);
        assert_eq!(config.exits.tp_ratio, 0.1);
        assert_eq!(config.exits.sl_ratio, 0.05);
        assert_eq!(config.exits.crossing_policy, CrossingPolicy::PreferSl);
        assert_eq!(config.market.funding_interval_ms, 28_800_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_document() {
        let config = RunConfig::from_toml(
            r#"
            symbols = ["BTCUSDT", "ETHUSDT"]
            interval = "4h"
            strategy = "ma_crossover"
            fee_model = 0.0005
            seed = 7

            [exits]
            crossing_policy = "random"
            max_holding_bars = 10

            [market]
            mode = "perpetual"
            leverage = 3
            allow_short = true

            [capacity_policy]
            max_open_positions = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.interval, Interval::Hour4);
        assert_eq!(config.crossing_seed(), 7);
        assert!(config.market.is_perpetual());
        assert_eq!(config.market.leverage, dec!(3));
        assert!(matches!(config.fee_model, Some(ComponentSpec::Number(_))));
        assert!(matches!(config.capacity_policy, Some(ComponentSpec::Literal(_))));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_interval_is_rejected() {
        let result = RunConfig::from_json(r#"{"symbols": ["BTCUSDT"], "interval": "2d"}"#);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_validation_failures() {
        let base = RunConfig::new(vec!["BTCUSDT".into()]);
        assert!(base.validate().is_ok());

        let mut config = base.clone();
        config.symbols.clear();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.symbols.push("BTCUSDT".into());
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.initial_cash = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.market.leverage = dec!(2);
        assert!(config.validate().is_err());
        config.market.mode = MarketMode::Perpetual;
        assert!(config.validate().is_ok());

        let mut config = base.clone();
        config.exits.partial_take_profit = Some(PartialTakeProfit {
            ratio: 0.05,
            fraction: 1.0,
        });
        assert!(config.validate().is_err());

        let mut config = base;
        config.execution.workers = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_embedded_ohlcv() {
        let config = RunConfig::from_json(
            r#"{"symbols": ["BTCUSDT"],
                "ohlcv_data": {"BTCUSDT": [{"ts": 0, "o": 1, "h": 1, "l": 1, "c": 1, "v": 0}]}}"#,
        )
        .unwrap();
        let data = config.ohlcv_data.unwrap();
        assert_eq!(data.series("BTCUSDT").unwrap().len(), 1);
    }
}
