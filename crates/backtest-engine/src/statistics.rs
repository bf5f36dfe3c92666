//! Run statistics.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::TradeLogEntry;

/// Periods per year used to annualize per-bar returns.
const PERIODS_PER_YEAR: f64 = 252.0;

/// Headline metrics of a run. Returns and drawdown are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_return: Decimal,
    pub win_rate: Decimal,
    pub max_drawdown: Decimal,
    /// Sharpe ratio of per-bar returns (risk-free rate of 0)
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Gross profit / gross loss, zero without losses
    pub profit_factor: Decimal,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub final_equity: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
}

/// Trade metrics of one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub trades: usize,
    pub winning: usize,
    pub losing: usize,
    pub pnl: Decimal,
    pub fees: Decimal,
    pub win_rate: Decimal,
}

/// Accumulates equity and trades while the replay runs.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    initial_equity: Decimal,
    last_equity: Decimal,
    peak_equity: Decimal,
    max_drawdown: Decimal,
    returns: Vec<f64>,
    pnls: Vec<Decimal>,
    per_symbol: BTreeMap<String, SymbolStats>,
}

impl RunStatistics {
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            initial_equity,
            last_equity: initial_equity,
            peak_equity: initial_equity,
            max_drawdown: Decimal::ZERO,
            returns: Vec::new(),
            pnls: Vec::new(),
            per_symbol: BTreeMap::new(),
        }
    }

    /// Record the equity of one bar.
    pub fn record_equity(&mut self, equity: Decimal) {
        if self.last_equity > Decimal::ZERO {
            let ret = ((equity - self.last_equity) / self.last_equity)
                .to_f64()
                .unwrap_or(0.0);
            self.returns.push(ret);
        }
        self.last_equity = equity;

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    pub fn peak_equity(&self) -> Decimal {
        self.peak_equity
    }

    /// Record a closed trade.
    pub fn add_trade(&mut self, trade: &TradeLogEntry) {
        self.pnls.push(trade.pnl);

        let stats = self.per_symbol.entry(trade.symbol.clone()).or_default();
        stats.trades += 1;
        stats.pnl += trade.pnl;
        stats.fees += trade.fees;
        if trade.pnl > Decimal::ZERO {
            stats.winning += 1;
        } else if trade.pnl < Decimal::ZERO {
            stats.losing += 1;
        }
        stats.win_rate = Decimal::from(stats.winning) / Decimal::from(stats.trades);
    }

    pub fn per_symbol(&self) -> &BTreeMap<String, SymbolStats> {
        &self.per_symbol
    }

    /// Calculate the summary for the final equity.
    pub fn finalize(&self, final_equity: Decimal) -> Summary {
        let total_return = if self.initial_equity > Decimal::ZERO {
            (final_equity - self.initial_equity) / self.initial_equity
        } else {
            Decimal::ZERO
        };

        let wins: Vec<Decimal> = self.pnls.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = self.pnls.iter().copied().filter(|p| *p < Decimal::ZERO).collect();
        let gross_profit: Decimal = wins.iter().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();

        let total_trades = self.pnls.len();
        let win_rate = if total_trades > 0 {
            Decimal::from(wins.len()) / Decimal::from(total_trades)
        } else {
            Decimal::ZERO
        };
        let avg_win = if wins.is_empty() {
            Decimal::ZERO
        } else {
            gross_profit / Decimal::from(wins.len())
        };
        let avg_loss = if losses.is_empty() {
            Decimal::ZERO
        } else {
            gross_loss / Decimal::from(losses.len())
        };
        let profit_factor = if gross_loss > Decimal::ZERO {
            gross_profit / gross_loss
        } else {
            Decimal::ZERO
        };

        Summary {
            total_return,
            win_rate,
            max_drawdown: self.max_drawdown,
            sharpe_ratio: self.sharpe_ratio(),
            sortino_ratio: self.sortino_ratio(),
            profit_factor,
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            final_equity,
            avg_win,
            avg_loss,
        }
    }

    fn sharpe_ratio(&self) -> f64 {
        if self.returns.len() < 2 {
            return 0.0;
        }
        let mean = self.returns.iter().mean();
        let std_dev = self.returns.iter().std_dev();
        if std_dev.is_finite() && std_dev > 0.0 {
            mean * PERIODS_PER_YEAR.sqrt() / std_dev
        } else {
            0.0
        }
    }

    // Downside deviation over the negative returns only
    fn sortino_ratio(&self) -> f64 {
        let negative: Vec<f64> = self.returns.iter().copied().filter(|r| *r < 0.0).collect();
        if negative.is_empty() {
            return 0.0;
        }
        let mean = self.returns.iter().mean();
        let downside = (negative.iter().map(|r| r.powi(2)).sum::<f64>() / negative.len() as f64).sqrt();
        if downside > 0.0 {
            mean * PERIODS_PER_YEAR.sqrt() / downside
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_core::types::{Direction, ExitReason, ProposalId};
    use rust_decimal_macros::dec;

    fn trade(symbol: &str, pnl: Decimal) -> TradeLogEntry {
        TradeLogEntry {
            proposal_id: ProposalId(0),
            symbol: symbol.to_string(),
            direction: Direction::Long,
            entry_time: 0,
            entry_price: dec!(100),
            exit_time: 1,
            exit_price: dec!(100),
            qty: dec!(1),
            fees: dec!(0.1),
            pnl,
            pnl_pct: Decimal::ZERO,
            reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn test_drawdown_and_return() {
        let mut stats = RunStatistics::new(dec!(1000));
        for equity in [dec!(1000), dec!(1100), dec!(880), dec!(990)] {
            stats.record_equity(equity);
        }

        let summary = stats.finalize(dec!(990));
        assert_eq!(summary.max_drawdown, dec!(0.2));
        assert_eq!(summary.total_return, dec!(-0.01));
        assert_eq!(stats.peak_equity(), dec!(1100));
        assert!(summary.sharpe_ratio.is_finite());
        assert!(summary.sortino_ratio != 0.0);
    }

    #[test]
    fn test_trade_statistics() {
        let mut stats = RunStatistics::new(dec!(1000));
        stats.add_trade(&trade("BTCUSDT", dec!(30)));
        stats.add_trade(&trade("BTCUSDT", dec!(-10)));
        stats.add_trade(&trade("ETHUSDT", dec!(10)));
        stats.add_trade(&trade("ETHUSDT", dec!(-20)));

        let summary = stats.finalize(dec!(1010));
        assert_eq!(summary.total_trades, 4);
        assert_eq!(summary.winning_trades, 2);
        assert_eq!(summary.losing_trades, 2);
        assert_eq!(summary.win_rate, dec!(0.5));
        assert_eq!(summary.profit_factor, dec!(40) / dec!(30));
        assert_eq!(summary.avg_win, dec!(20));
        assert_eq!(summary.avg_loss, dec!(15));

        let btc = &stats.per_symbol()["BTCUSDT"];
        assert_eq!(btc.trades, 2);
        assert_eq!(btc.pnl, dec!(20));
        assert_eq!(btc.fees, dec!(0.2));
        assert_eq!(btc.win_rate, dec!(0.5));
    }

    #[test]
    fn test_flat_curve_has_zero_ratios() {
        let mut stats = RunStatistics::new(dec!(1000));
        stats.record_equity(dec!(1000));
        stats.record_equity(dec!(1000));
        let summary = stats.finalize(dec!(1000));
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert_eq!(summary.sortino_ratio, 0.0);
        assert_eq!(summary.profit_factor, Decimal::ZERO);
    }
}
