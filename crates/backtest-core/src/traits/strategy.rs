//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{CandleWindow, Decision, Interval};

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Run-level inputs available to every decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionContext<'a> {
    /// Symbol being decided on
    pub symbol: &'a str,
    /// Take-profit distance as a fraction of entry
    pub tp_ratio: f64,
    /// Stop-loss distance as a fraction of entry
    pub sl_ratio: f64,
}

impl<'a> DecisionContext<'a> {
    /// Take-profit level for an entry in the given direction sign (+1 / -1).
    pub fn take_profit(&self, entry: f64, sign: f64) -> f64 {
        entry * (1.0 + sign * self.tp_ratio)
    }

    /// Stop-loss level for an entry in the given direction sign (+1 / -1).
    pub fn stop_loss(&self, entry: f64, sign: f64) -> f64 {
        entry * (1.0 - sign * self.sl_ratio)
    }
}

/// Core strategy trait.
///
/// A strategy is a pure function of a bounded window of history. The window
/// ends at the bar being decided on; strategies hold no per-run state, so one
/// instance is shared by every worker.
pub trait Strategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Decide on the last bar of `window`.
    ///
    /// # Returns
    /// * `Ok(Decision)` with `Signal::No` when there is nothing to do
    /// * `Err(StrategyError::MalformedPayload)` when a plugin returned
    ///   something that is not a decision
    fn decide(
        &self,
        window: &CandleWindow<'_>,
        interval: Interval,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision, StrategyError>;

    /// Number of bars the window must hold before `decide` is called.
    fn required_lookback(&self) -> usize;

    /// Check if there are enough bars for a decision.
    fn has_enough_data(&self, bars_available: usize) -> bool {
        bars_available >= self.required_lookback()
    }

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, Signal};

    struct LastCloseStrategy {
        lookback: usize,
    }

    impl Strategy for LastCloseStrategy {
        fn name(&self) -> &str {
            "last_close"
        }

        fn decide(
            &self,
            window: &CandleWindow<'_>,
            _interval: Interval,
            ctx: &DecisionContext<'_>,
        ) -> Result<Decision, StrategyError> {
            let bar = window.current().ok_or(StrategyError::InsufficientData {
                required: 1,
                available: 0,
            })?;
            if bar.is_bullish() {
                Ok(Decision::buy(bar.close).with_bracket(
                    ctx.take_profit(bar.close, 1.0),
                    ctx.stop_loss(bar.close, 1.0),
                ))
            } else {
                Ok(Decision::no())
            }
        }

        fn required_lookback(&self) -> usize {
            self.lookback
        }
    }

    #[test]
    fn test_strategy_lookback() {
        let strategy = LastCloseStrategy { lookback: 20 };

        assert!(!strategy.has_enough_data(19));
        assert!(strategy.has_enough_data(20));
        assert_eq!(strategy.description(), "");
    }

    #[test]
    fn test_context_bracket() {
        let ctx = DecisionContext {
            symbol: "BTCUSDT",
            tp_ratio: 0.1,
            sl_ratio: 0.05,
        };
        let rows = [Candle::new(0, 100.0, 101.0, 99.0, 100.5, 1.0)];
        let window = CandleWindow::new("BTCUSDT", &rows);

        let decision = LastCloseStrategy { lookback: 1 }
            .decide(&window, Interval::Daily, &ctx)
            .unwrap();
        assert_eq!(decision.signal, Signal::Buy);
        assert!((decision.tp_price.unwrap() - 110.55).abs() < 1e-9);
        assert!((decision.sl_price.unwrap() - 95.475).abs() < 1e-9);

        assert!((ctx.take_profit(100.0, -1.0) - 90.0).abs() < 1e-9);
        assert!((ctx.stop_loss(100.0, -1.0) - 105.0).abs() < 1e-9);
    }
}
