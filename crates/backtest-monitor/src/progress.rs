//! Structured summary of a finished run.

use backtest_engine::RunReport;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Log the headline numbers and per-symbol results of a run.
pub fn log_report(report: &RunReport) {
    let summary = &report.summary;
    info!(
        trades = summary.total_trades,
        win_rate = %(summary.win_rate * Decimal::ONE_HUNDRED).round_dp(2),
        total_return = %(summary.total_return * Decimal::ONE_HUNDRED).round_dp(2),
        max_drawdown = %(summary.max_drawdown * Decimal::ONE_HUNDRED).round_dp(2),
        sharpe = summary.sharpe_ratio,
        final_equity = %report.final_equity.round_dp(2),
        "Backtest finished"
    );

    for (symbol, stats) in &report.per_symbol {
        info!(
            symbol = %symbol,
            trades = stats.trades,
            pnl = %stats.pnl.round_dp(2),
            fees = %stats.fees.round_dp(2),
            "Symbol result"
        );
    }

    if !report.rejected_proposals.is_empty() {
        warn!(
            rejected = report.rejected_proposals.len(),
            "Some proposals were not admitted"
        );
    }
}
