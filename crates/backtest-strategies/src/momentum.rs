//! Momentum/Trend Following Strategy.
//!
//! Uses price momentum and trend indicators to follow strong trends.
//! Buys when momentum is positive in an uptrend, sells when it is negative
//! in a downtrend. RSI confirms both directions.

use backtest_core::{
    error::StrategyError,
    traits::{DecisionContext, Indicator, Strategy, StrategyConfig},
    types::{CandleWindow, Decision, Interval},
};
use backtest_indicators::{Ema, RateOfChange, Rsi};
use serde::{Deserialize, Serialize};

/// Configuration for the Momentum strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Momentum lookback period
    pub momentum_period: usize,
    /// Fast EMA period for trend
    pub fast_ema_period: usize,
    /// Slow EMA period for trend
    pub slow_ema_period: usize,
    /// RSI period for confirmation
    pub rsi_period: usize,
    /// Minimum RSI for long entry
    pub rsi_long_threshold: f64,
    /// Maximum RSI for short entry
    pub rsi_short_threshold: f64,
    /// Minimum momentum (fraction) for entry
    pub min_momentum: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            momentum_period: 10,
            fast_ema_period: 12,
            slow_ema_period: 26,
            rsi_period: 14,
            rsi_long_threshold: 50.0,
            rsi_short_threshold: 50.0,
            min_momentum: 0.02, // 2%
        }
    }
}

impl StrategyConfig for MomentumConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.momentum_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Momentum period must be greater than 0".into(),
            ));
        }
        if self.fast_ema_period == 0 || self.fast_ema_period >= self.slow_ema_period {
            return Err(StrategyError::InvalidConfig(
                "Fast EMA period must be positive and less than slow EMA period".into(),
            ));
        }
        if self.rsi_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "RSI period must be greater than 0".into(),
            ));
        }
        for threshold in [self.rsi_long_threshold, self.rsi_short_threshold] {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(StrategyError::InvalidConfig(format!(
                    "RSI threshold {} outside [0, 100]",
                    threshold
                )));
            }
        }
        Ok(())
    }
}

/// Momentum/Trend Following Strategy.
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    config: MomentumConfig,
}

impl MomentumStrategy {
    /// Create a new Momentum strategy.
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    /// Calculate trend strength (fast EMA - slow EMA) / slow EMA.
    fn calculate_trend(&self, closes: &[f64]) -> Option<f64> {
        let fast_val = Ema::new(self.config.fast_ema_period).latest(closes)?;
        let slow_val = Ema::new(self.config.slow_ema_period).latest(closes)?;

        if slow_val != 0.0 {
            Some((fast_val - slow_val) / slow_val)
        } else {
            None
        }
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn description(&self) -> &str {
        "Follows strong trends using momentum and RSI confirmation"
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

        let momentum = RateOfChange::new(self.config.momentum_period)
            .latest(&closes)
            .ok_or_else(insufficient)?
            / 100.0;
        let Some(trend) = self.calculate_trend(&closes) else {
            return Ok(Decision::no());
        };
        let rsi = Rsi::new(self.config.rsi_period)
            .latest(&closes)
            .ok_or_else(insufficient)?;

        let meta = serde_json::json!({
            "momentum": momentum,
            "trend": trend,
            "rsi": rsi,
        });

        // Long entry: positive momentum, uptrend, RSI above threshold
        if momentum >= self.config.min_momentum && trend > 0.0 && rsi >= self.config.rsi_long_threshold
        {
            return Ok(Decision::buy(bar.close)
                .with_bracket(ctx.take_profit(bar.close, 1.0), ctx.stop_loss(bar.close, 1.0))
                .with_confidence((momentum / 0.1).clamp(0.0, 1.0))
                .with_meta(meta));
        }

        // Short entry: negative momentum, downtrend, RSI below threshold
        if momentum <= -self.config.min_momentum
            && trend < 0.0
            && rsi <= self.config.rsi_short_threshold
        {
            return Ok(Decision::sell(bar.close)
                .with_bracket(ctx.take_profit(bar.close, -1.0), ctx.stop_loss(bar.close, -1.0))
                .with_confidence((momentum.abs() / 0.1).clamp(0.0, 1.0))
                .with_meta(meta));
        }

        Ok(Decision::no())
    }

    fn required_lookback(&self) -> usize {
        (self.config.momentum_period + 1)
            .max(self.config.slow_ema_period)
            .max(self.config.rsi_period + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candles_from_closes;
    use backtest_core::types::Signal;

    fn ctx() -> DecisionContext<'static> {
        DecisionContext {
            symbol: "TEST",
            tp_ratio: 0.1,
            sl_ratio: 0.05,
        }
    }

    fn decide_on(prices: &[f64]) -> Decision {
        let strategy = MomentumStrategy::new(MomentumConfig::default());
        let candles = candles_from_closes(prices);
        let start = candles.len() - strategy.required_lookback();
        let window = CandleWindow::new("TEST", &candles[start..]);
        strategy.decide(&window, Interval::Daily, &ctx()).unwrap()
    }

    #[test]
    fn test_lookback() {
        let strategy = MomentumStrategy::new(MomentumConfig::default());
        assert_eq!(strategy.required_lookback(), 26);
    }

    #[test]
    fn test_uptrend_buys() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let decision = decide_on(&prices);

        assert_eq!(decision.signal, Signal::Buy);
        assert_eq!(decision.confidence, Some(1.0));
        assert!(decision.meta["trend"].as_f64().unwrap() > 0.0);
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_downtrend_sells() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 * 0.99f64.powi(i)).collect();
        let decision = decide_on(&prices);

        assert_eq!(decision.signal, Signal::Sell);
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_flat_market_holds() {
        let decision = decide_on(&[100.0; 40]);
        assert_eq!(decision.signal, Signal::No);
    }

    #[test]
    fn test_config_validation() {
        let config = MomentumConfig {
            rsi_long_threshold: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(MomentumConfig::default().validate().is_ok());
    }
}
