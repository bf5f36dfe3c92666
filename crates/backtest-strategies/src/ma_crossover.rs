//! Moving Average Crossover Strategy.
//!
//! Generates buy signals when the fast MA crosses above the slow MA,
//! and sell signals when the fast MA crosses below the slow MA.

use backtest_core::{
    error::StrategyError,
    traits::{DecisionContext, Indicator, Strategy, StrategyConfig},
    types::{CandleWindow, Decision, Interval},
};
use backtest_indicators::{Ema, Sma};
use serde::{Deserialize, Serialize};

/// Configuration for the MA Crossover strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MACrossoverConfig {
    /// Fast moving average period
    pub fast_period: usize,
    /// Slow moving average period
    pub slow_period: usize,
    /// Use EMA instead of SMA
    pub use_ema: bool,
    /// Minimum crossover magnitude to generate signal (as fraction)
    pub signal_threshold: f64,
}

impl Default for MACrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            use_ema: true,
            signal_threshold: 0.001, // 0.1%
        }
    }
}

impl StrategyConfig for MACrossoverConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.fast_period >= self.slow_period {
            return Err(StrategyError::InvalidConfig(
                "Fast period must be less than slow period".into(),
            ));
        }
        if self.fast_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Fast period must be greater than 0".into(),
            ));
        }
        if self.signal_threshold.is_nan() || self.signal_threshold < 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Signal threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Moving Average Crossover Strategy.
///
/// Compares the last two MA values inside the window, so the strategy keeps
/// no state between bars.
#[derive(Debug, Clone)]
pub struct MACrossoverStrategy {
    config: MACrossoverConfig,
}

impl MACrossoverStrategy {
    /// Create a new MA Crossover strategy.
    pub fn new(config: MACrossoverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MACrossoverConfig {
        &self.config
    }

    fn calculate_ma(&self, closes: &[f64], period: usize) -> Vec<f64> {
        if self.config.use_ema {
            Ema::new(period).calculate(closes)
        } else {
            Sma::new(period).calculate(closes)
        }
    }
}

fn last_two(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [.., prev, current] => Some((*prev, *current)),
        _ => None,
    }
}

impl Strategy for MACrossoverStrategy {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn description(&self) -> &str {
        "Generates signals based on fast/slow moving average crossovers"
    }

    fn decide(
        &self,
        window: &CandleWindow<'_>,
        _interval: Interval,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision, StrategyError> {
        let insufficient = || StrategyError::InsufficientData {
            required: self.required_lookback(),
            available: window.len(),
        };
        let bar = window.current().ok_or_else(insufficient)?;
        let closes = window.closes();

        let fast = self.calculate_ma(&closes, self.config.fast_period);
        let slow = self.calculate_ma(&closes, self.config.slow_period);
        let (prev_f, current_fast) = last_two(&fast).ok_or_else(insufficient)?;
        let (prev_s, current_slow) = last_two(&slow).ok_or_else(insufficient)?;

        let crossover_magnitude = if current_slow != 0.0 {
            ((current_fast - current_slow) / current_slow).abs()
        } else {
            0.0
        };
        if crossover_magnitude < self.config.signal_threshold {
            return Ok(Decision::no());
        }

        let meta = serde_json::json!({
            "fast_ma": current_fast,
            "slow_ma": current_slow,
            "crossover_magnitude": crossover_magnitude,
        });

        // Bullish crossover: fast crosses above slow
        if prev_f <= prev_s && current_fast > current_slow {
            return Ok(Decision::buy(bar.close)
                .with_bracket(ctx.take_profit(bar.close, 1.0), ctx.stop_loss(bar.close, 1.0))
                .with_confidence(crossover_magnitude.min(1.0))
                .with_meta(meta));
        }

        // Bearish crossover: fast crosses below slow
        if prev_f >= prev_s && current_fast < current_slow {
            return Ok(Decision::sell(bar.close)
                .with_bracket(ctx.take_profit(bar.close, -1.0), ctx.stop_loss(bar.close, -1.0))
                .with_confidence(crossover_magnitude.min(1.0))
                .with_meta(meta));
        }

        Ok(Decision::no())
    }

    fn required_lookback(&self) -> usize {
        self.config.slow_period + 1
    }
}
