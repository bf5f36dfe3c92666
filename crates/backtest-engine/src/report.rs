//! Run report generation.

use std::collections::BTreeMap;

use backtest_core::types::{Direction, ExitReason, FillRecord, ProposalId};
use backtest_risk::AdmissionStage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Summary, SymbolStats};

/// Equity at the end of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: i64,
    pub equity: Decimal,
    pub cash: Decimal,
}

/// One closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub proposal_id: ProposalId,
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: i64,
    /// Average execution price of the entry fills
    pub entry_price: Decimal,
    pub exit_time: i64,
    /// Average execution price of the exit fills
    pub exit_price: Decimal,
    /// Quantity entered
    pub qty: Decimal,
    pub fees: Decimal,
    /// Net cash result including fees and funding
    pub pnl: Decimal,
    /// `pnl` over the entry value
    pub pnl_pct: Decimal,
    /// Reason of the terminal exit
    pub reason: ExitReason,
}

/// A proposal the portfolio did not admit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedProposal {
    pub proposal_id: ProposalId,
    pub symbol: String,
    pub ts: i64,
    pub stage: AdmissionStage,
    pub reason: String,
}

/// Complete result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub initial_cash: Decimal,
    pub final_cash: Decimal,
    pub final_equity: Decimal,
    pub equity_curve: Vec<EquityPoint>,
    pub trade_log: Vec<TradeLogEntry>,
    pub summary: Summary,
    pub per_symbol: BTreeMap<String, SymbolStats>,
    pub fills: Vec<FillRecord>,
    pub rejected_proposals: Vec<RejectedProposal>,
}

impl RunReport {
    /// Generate a text summary.
    pub fn summary_text(&self) -> String {
        let pct = |d: Decimal| d * Decimal::ONE_HUNDRED;
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                     BACKTEST REPORT                        \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("PERFORMANCE\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Initial Cash:        ${:.2}\n", self.initial_cash));
        s.push_str(&format!("  Final Cash:          ${:.2}\n", self.final_cash));
        s.push_str(&format!("  Final Equity:        ${:.2}\n", self.final_equity));
        s.push_str(&format!(
            "  Total Return:        {:.2}%\n",
            pct(self.summary.total_return)
        ));
        s.push_str(&format!(
            "  Max Drawdown:        {:.2}%\n",
            pct(self.summary.max_drawdown)
        ));
        s.push('\n');

        s.push_str("RISK METRICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", self.summary.sharpe_ratio));
        s.push_str(&format!("  Sortino Ratio:       {:.2}\n", self.summary.sortino_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", self.summary.profit_factor));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Total Trades:        {}\n", self.summary.total_trades));
        s.push_str(&format!("  Winning Trades:      {}\n", self.summary.winning_trades));
        s.push_str(&format!("  Losing Trades:       {}\n", self.summary.losing_trades));
        s.push_str(&format!(
            "  Win Rate:            {:.2}%\n",
            pct(self.summary.win_rate)
        ));
        s.push_str(&format!("  Avg Win:             ${:.2}\n", self.summary.avg_win));
        s.push_str(&format!("  Avg Loss:            ${:.2}\n", self.summary.avg_loss));
        s.push_str(&format!("  Rejected Proposals:  {}\n", self.rejected_proposals.len()));
        s.push('\n');

        if !self.per_symbol.is_empty() {
            s.push_str("PER SYMBOL\n");
            s.push_str("───────────────────────────────────────────────────────────\n");
            for (symbol, stats) in &self.per_symbol {
                s.push_str(&format!(
                    "  {:<12} trades {:>4}  win {:>6.2}%  pnl ${:.2}\n",
                    symbol,
                    stats.trades,
                    pct(stats.win_rate),
                    stats.pnl
                ));
            }
            s.push('\n');
        }

        s.push_str("EXECUTION\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Fills:               {}\n", self.fills.len()));
        s.push_str(&format!("  Equity Points:       {}\n", self.equity_curve.len()));
        s.push('\n');

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export the equity curve to CSV.
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("ts,equity,cash\n");
        for point in &self.equity_curve {
            csv.push_str(&format!("{},{},{}\n", point.ts, point.equity, point.cash));
        }
        csv
    }
}
