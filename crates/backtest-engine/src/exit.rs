//! Exit rules of a proposal.

use std::fmt;
use std::sync::Arc;

use backtest_config::{CrossingPolicy, PartialTakeProfit};
use backtest_core::types::{Candle, Direction, ExitReason};
use rust_decimal::Decimal;

use crate::CrossingResolver;

/// What a custom resolver sees on each candle of an open trade.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    pub candle: &'a Candle,
    /// Average entry price of the filled legs
    pub avg_entry: f64,
    /// Quantity still open
    pub open_qty: Decimal,
    /// Candles held, counting the entry candle
    pub bars_held: usize,
    /// Best price reached before this candle (highest high for longs,
    /// lowest low for shorts), or the entry when this is the first candle
    pub best_price: f64,
}

/// A custom close decided by an [`ExitResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct CustomExit {
    pub price: f64,
    pub label: String,
}

/// Host-supplied exit rule, checked before every built-in rule.
///
/// Resolvers are pure: they must decide from the context alone.
pub trait ExitResolver: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn check(&self, ctx: &ExitContext<'_>) -> Option<CustomExit>;
}

/// Closes once price retraces `pct` from the best price since entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingStop {
    pub pct: f64,
}

impl ExitResolver for TrailingStop {
    fn name(&self) -> &str {
        "trailing_stop"
    }

    fn check(&self, ctx: &ExitContext<'_>) -> Option<CustomExit> {
        let level = ctx.best_price * (1.0 - ctx.direction.sign_f64() * self.pct);
        let hit = match ctx.direction {
            Direction::Long => ctx.candle.low <= level,
            Direction::Short => ctx.candle.high >= level,
        };
        hit.then(|| CustomExit {
            price: level,
            label: self.name().to_string(),
        })
    }
}

/// Bracket and trade-management rules of one proposal.
#[derive(Debug, Clone)]
pub struct ExitPlan {
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub crossing: CrossingPolicy,
    /// Seed of the random crossing policy for this proposal
    pub crossing_seed: u64,
    pub max_holding_bars: Option<usize>,
    pub partial_take_profit: Option<PartialTakeProfit>,
    pub custom: Option<Arc<dyn ExitResolver>>,
}

impl Default for ExitPlan {
    fn default() -> Self {
        Self {
            take_profit: None,
            stop_loss: None,
            crossing: CrossingPolicy::PreferSl,
            crossing_seed: 0,
            max_holding_bars: None,
            partial_take_profit: None,
            custom: None,
        }
    }
}

impl ExitPlan {
    pub fn resolver(&self) -> CrossingResolver {
        CrossingResolver::new(self.crossing, self.crossing_seed)
    }

    /// Partial take-profit level for an average entry.
    pub fn partial_level(&self, direction: Direction, avg_entry: f64) -> Option<f64> {
        self.partial_take_profit
            .map(|p| avg_entry * (1.0 + direction.sign_f64() * p.ratio))
    }

    /// Fill price of the partial take-profit on this candle, if its level was reached.
    pub fn partial_fill(&self, candle: &Candle, direction: Direction, avg_entry: f64) -> Option<f64> {
        let level = self.partial_level(direction, avg_entry)?;
        favorable_fill(candle, direction, level)
    }

    /// Fill price of the take-profit on this candle. A gap past the level fills at the open.
    pub fn take_profit_fill(&self, candle: &Candle, direction: Direction) -> Option<f64> {
        favorable_fill(candle, direction, self.take_profit?)
    }

    /// Fill price of the stop-loss on this candle. A gap through the level fills at the open.
    pub fn stop_loss_fill(&self, candle: &Candle, direction: Direction) -> Option<f64> {
        let sl = self.stop_loss?;
        match direction {
            Direction::Long => (candle.low <= sl).then(|| candle.open.min(sl)),
            Direction::Short => (candle.high >= sl).then(|| candle.open.max(sl)),
        }
    }

    /// Bracket exit on a candle, if either level was reached.
    pub fn check_bracket(
        &self,
        candle: &Candle,
        direction: Direction,
        resolver: &mut CrossingResolver,
    ) -> Option<(ExitReason, f64)> {
        let tp_hit = self.take_profit_fill(candle, direction);
        let sl_hit = self.stop_loss_fill(candle, direction);

        match (tp_hit, sl_hit) {
            (Some(tp), Some(sl)) => {
                if resolver.take_profit_wins() {
                    Some((ExitReason::TakeProfit, tp))
                } else {
                    Some((ExitReason::StopLoss, sl))
                }
            }
            (Some(tp), None) => Some((ExitReason::TakeProfit, tp)),
            (None, Some(sl)) => Some((ExitReason::StopLoss, sl)),
            (None, None) => None,
        }
    }
}

fn favorable_fill(candle: &Candle, direction: Direction, level: f64) -> Option<f64> {
    match direction {
        Direction::Long => (candle.high >= level).then(|| candle.open.max(level)),
        Direction::Short => (candle.low <= level).then(|| candle.open.min(level)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(crossing: CrossingPolicy) -> ExitPlan {
        ExitPlan {
            take_profit: Some(110.0),
            stop_loss: Some(95.0),
            crossing,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_level() {
        let plan = plan(CrossingPolicy::PreferSl);
        let mut resolver = plan.resolver();

        let candle = Candle::new(0, 100.0, 111.0, 99.0, 105.0, 1.0);
        assert_eq!(
            plan.check_bracket(&candle, Direction::Long, &mut resolver),
            Some((ExitReason::TakeProfit, 110.0))
        );

        let candle = Candle::new(0, 100.0, 101.0, 99.0, 100.0, 1.0);
        assert_eq!(plan.check_bracket(&candle, Direction::Long, &mut resolver), None);
    }

    #[test]
    fn test_crossing_candle() {
        let candle = Candle::new(0, 100.0, 120.0, 90.0, 100.0, 1.0);

        let plan_sl = plan(CrossingPolicy::PreferSl);
        assert_eq!(
            plan_sl.check_bracket(&candle, Direction::Long, &mut plan_sl.resolver()),
            Some((ExitReason::StopLoss, 95.0))
        );

        let plan_tp = plan(CrossingPolicy::PreferTp);
        assert_eq!(
            plan_tp.check_bracket(&candle, Direction::Long, &mut plan_tp.resolver()),
            Some((ExitReason::TakeProfit, 110.0))
        );
    }

    #[test]
    fn test_short_bracket() {
        let plan = ExitPlan {
            take_profit: Some(90.0),
            stop_loss: Some(105.0),
            ..Default::default()
        };
        let candle = Candle::new(0, 100.0, 106.0, 99.0, 104.0, 1.0);
        assert_eq!(
            plan.check_bracket(&candle, Direction::Short, &mut plan.resolver()),
            Some((ExitReason::StopLoss, 105.0))
        );
    }

    #[test]
    fn test_gap_fills_at_open() {
        let plan = plan(CrossingPolicy::PreferSl);

        let gap_down = Candle::new(0, 90.0, 91.0, 89.0, 90.0, 1.0);
        assert_eq!(
            plan.check_bracket(&gap_down, Direction::Long, &mut plan.resolver()),
            Some((ExitReason::StopLoss, 90.0))
        );

        let gap_up = Candle::new(0, 115.0, 116.0, 113.0, 114.0, 1.0);
        assert_eq!(
            plan.check_bracket(&gap_up, Direction::Long, &mut plan.resolver()),
            Some((ExitReason::TakeProfit, 115.0))
        );

        let short = ExitPlan {
            take_profit: Some(90.0),
            stop_loss: Some(105.0),
            ..Default::default()
        };
        assert_eq!(
            short.check_bracket(&gap_up, Direction::Short, &mut short.resolver()),
            Some((ExitReason::StopLoss, 115.0))
        );
        assert_eq!(
            short.check_bracket(&gap_down, Direction::Short, &mut short.resolver()),
            Some((ExitReason::TakeProfit, 90.0))
        );
    }

    #[test]
    fn test_trailing_stop() {
        let stop = TrailingStop { pct: 0.1 };
        let candle = Candle::new(0, 115.0, 116.0, 107.0, 108.0, 1.0);
        let ctx = ExitContext {
            symbol: "BTCUSDT",
            direction: Direction::Long,
            candle: &candle,
            avg_entry: 100.0,
            open_qty: Decimal::ONE,
            bars_held: 3,
            best_price: 120.0,
        };

        let exit = stop.check(&ctx).unwrap();
        assert!((exit.price - 108.0).abs() < 1e-9);
        assert_eq!(exit.label, "trailing_stop");

        let ctx = ExitContext { best_price: 110.0, ..ctx };
        assert_eq!(stop.check(&ctx), None);
    }
}
