//! Phase two: single-threaded replay of admitted proposals.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::sync::Arc;

use backtest_config::MarketSettings;
use backtest_core::error::{EngineError, EngineResult};
use backtest_core::types::{Direction, EventKind, ExitReason, FillRecord, TradeEvent};
use backtest_ledger::TransactionLedger;
use backtest_risk::{
    cash_required, Admission, AdmissionRequest, AdmissionStage, CapacityPolicy, LimitCheck,
    PortfolioSnapshot, RiskLimits, SizingModel,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::proposal::to_decimal;
use crate::{
    EquityPoint, EventCursor, PerpetualMargin, RejectedProposal, RunReport, RunStatistics,
    TimelineKey, TradeLogEntry, TradeProposal,
};

/// Run-level settings of the portfolio.
#[derive(Debug, Clone)]
pub struct PortfolioSettings {
    pub initial_cash: Decimal,
    /// Bar length; events up to the end of a bar are processed with it
    pub interval_ms: i64,
    pub market: MarketSettings,
    pub risk: RiskLimits,
}

/// Fill bookkeeping of one admitted trade.
#[derive(Debug, Clone, Default)]
struct TradeRecord {
    entry_time: Option<i64>,
    entry_qty: Decimal,
    entry_value: Decimal,
    exit_time: i64,
    exit_qty: Decimal,
    exit_value: Decimal,
    fees: Decimal,
    cash: Decimal,
    reason: Option<ExitReason>,
}

impl TradeRecord {
    fn record(&mut self, fill: &FillRecord) {
        self.cash += fill.cash_delta();
        if fill.kind != EventKind::Funding {
            self.fees += fill.fee;
        }
        match fill.kind {
            EventKind::Open => {
                self.entry_time.get_or_insert(fill.ts);
                self.entry_qty += fill.qty.abs();
                self.entry_value += fill.notional();
            }
            EventKind::PartialClose | EventKind::Close | EventKind::Liquidate => {
                self.exit_time = fill.ts;
                self.exit_qty += fill.qty.abs();
                self.exit_value += fill.notional();
                if fill.kind != EventKind::PartialClose || self.reason.is_none() {
                    self.reason = fill.meta.exit.clone();
                }
            }
            EventKind::Funding => {}
        }
    }
}

#[derive(Debug)]
struct ActiveTrade {
    proposal: Arc<TradeProposal>,
    cursor: EventCursor,
    /// Cash held back per pending unit
    reserve_per_unit: Decimal,
    record: TradeRecord,
}

impl ActiveTrade {
    fn reserved(&self) -> Decimal {
        self.reserve_per_unit * self.cursor.pending_qty()
    }
}

/// Owns cash, the ledger and every admitted trade during replay.
///
/// Proposals wait in a queue keyed by entry time until the clock reaches
/// them, then pass admission. Admitted trades step their cursors only when
/// the clock reaches their next candle, so nothing is realized ahead of
/// time.
#[derive(Debug)]
pub struct PortfolioManager {
    settings: PortfolioSettings,
    sizing: SizingModel,
    capacity: CapacityPolicy,
    perp: Option<PerpetualMargin>,
    ledger: TransactionLedger,
    cash: Decimal,
    marks: BTreeMap<String, Decimal>,
    queued: BTreeMap<u64, Arc<TradeProposal>>,
    pending: BinaryHeap<Reverse<(i64, u64)>>,
    active: BTreeMap<u64, ActiveTrade>,
    cursors: BinaryHeap<Reverse<(i64, String, u64)>>,
    last_horizon: Option<i64>,
    equity_curve: Vec<EquityPoint>,
    trade_log: Vec<TradeLogEntry>,
    rejected: Vec<RejectedProposal>,
    stats: RunStatistics,
}

impl PortfolioManager {
    pub fn new(
        settings: PortfolioSettings,
        sizing: SizingModel,
        capacity: CapacityPolicy,
        ledger: TransactionLedger,
    ) -> Self {
        let perp = PerpetualMargin::from_settings(&settings.market);
        Self {
            cash: settings.initial_cash,
            stats: RunStatistics::new(settings.initial_cash),
            settings,
            sizing,
            capacity,
            perp,
            ledger,
            marks: BTreeMap::new(),
            queued: BTreeMap::new(),
            pending: BinaryHeap::new(),
            active: BTreeMap::new(),
            cursors: BinaryHeap::new(),
            last_horizon: None,
            equity_curve: Vec::new(),
            trade_log: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Queue proposals for admission at their entry time.
    pub fn schedule(&mut self, proposals: impl IntoIterator<Item = Arc<TradeProposal>>) {
        for proposal in proposals {
            let seq = proposal.id.0;
            self.pending.push(Reverse((proposal.entry_time(), seq)));
            self.queued.insert(seq, proposal);
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Cash held back for admitted legs that have not filled.
    pub fn reserved_cash(&self) -> Decimal {
        self.active.values().map(ActiveTrade::reserved).sum()
    }

    /// Cash plus the market value of open positions at the latest marks.
    pub fn equity(&self) -> Decimal {
        self.cash + self.ledger.market_value(&self.marks)
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn active_trades(&self) -> usize {
        self.active.len()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trade_log(&self) -> &[TradeLogEntry] {
        &self.trade_log
    }

    pub fn rejected(&self) -> &[RejectedProposal] {
        &self.rejected
    }

    /// Process one bar of the global clock.
    ///
    /// Everything due before the end of the bar is admitted and stepped in
    /// timeline order, then the bar's closes become the marks, perpetual
    /// funding and liquidation are applied, and one equity point is
    /// recorded.
    pub fn on_bar(&mut self, ts: i64, marks: &BTreeMap<String, Decimal>) -> EngineResult<()> {
        let horizon = ts.saturating_add(self.settings.interval_ms - 1);
        self.advance(horizon)?;

        for (symbol, mark) in marks {
            self.marks.insert(symbol.clone(), *mark);
        }

        let from = self.last_horizon.unwrap_or(ts - 1);
        self.last_horizon = Some(horizon);
        if self.perp.is_some() {
            self.settle_margin(from, horizon)?;
        }

        self.record_equity(ts);
        Ok(())
    }

    /// Flush every cursor still open after the last bar.
    pub fn finish(&mut self, ts: i64) -> EngineResult<()> {
        let booked = self.ledger.fills().len();
        self.advance(i64::MAX)?;

        if self.ledger.fills().len() > booked {
            self.record_equity(ts);
        }
        Ok(())
    }

    fn record_equity(&mut self, ts: i64) {
        let equity = self.equity();
        self.stats.record_equity(equity);
        self.equity_curve.push(EquityPoint {
            ts,
            equity,
            cash: self.cash,
        });
    }

    fn next_due(&self) -> Option<i64> {
        let pending = self.pending.peek().map(|Reverse((t, _))| *t);
        let cursor = self.cursors.peek().map(|Reverse((t, _, _))| *t);
        match (pending, cursor) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn advance(&mut self, horizon: i64) -> EngineResult<()> {
        while let Some(t) = self.next_due() {
            if t > horizon {
                break;
            }

            while let Some(Reverse((entry_time, seq))) = self.pending.peek().copied() {
                if entry_time != t {
                    break;
                }
                self.pending.pop();
                if let Some(proposal) = self.queued.remove(&seq) {
                    self.try_execute(proposal, t);
                }
            }

            let mut stepped = Vec::new();
            let mut events = Vec::new();
            while let Some(Reverse((due, _, _))) = self.cursors.peek() {
                if *due != t {
                    break;
                }
                let Some(Reverse((_, _, seq))) = self.cursors.pop() else {
                    break;
                };
                if let Some(trade) = self.active.get_mut(&seq) {
                    events.extend(trade.cursor.step(&trade.proposal));
                    stepped.push(seq);
                }
            }

            self.book(events)?;

            for seq in stepped {
                self.reschedule(seq);
            }
        }
        Ok(())
    }

    fn reschedule(&mut self, seq: u64) {
        let Some(trade) = self.active.get(&seq) else {
            return;
        };
        match trade.cursor.next_ts(&trade.proposal) {
            Some(next) => {
                let symbol = trade.proposal.symbol().to_string();
                self.cursors.push(Reverse((next, symbol, seq)));
            }
            None => self.close_trade(seq),
        }
    }

    fn book(&mut self, mut events: Vec<TradeEvent>) -> EngineResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        events.sort_by_cached_key(TimelineKey::for_event);

        let fills = self.ledger.ingest(&events)?;
        self.cash += self.ledger.pop_cash_delta();
        for fill in &fills {
            if let Some(trade) = self.active.get_mut(&fill.meta.proposal_id.0) {
                trade.record.record(fill);
            }
        }

        if self.perp.is_none() && self.cash < Decimal::ZERO {
            return Err(EngineError::ReplayInvariantViolation(format!(
                "cash went negative ({}) at {}",
                self.cash, events[0].ts
            )));
        }
        Ok(())
    }

    fn close_trade(&mut self, seq: u64) {
        let Some(trade) = self.active.remove(&seq) else {
            return;
        };
        let record = trade.record;
        let Some(entry_time) = record.entry_time else {
            debug!(proposal = seq, symbol = trade.proposal.symbol(), "Trade ended without a fill");
            return;
        };

        let entry_price = record.entry_value / record.entry_qty;
        let exit_price = if record.exit_qty.is_zero() {
            Decimal::ZERO
        } else {
            record.exit_value / record.exit_qty
        };
        let pnl_pct = if record.entry_value.is_zero() {
            Decimal::ZERO
        } else {
            record.cash / record.entry_value
        };

        let entry = TradeLogEntry {
            proposal_id: trade.proposal.id,
            symbol: trade.proposal.symbol().to_string(),
            direction: trade.proposal.direction,
            entry_time,
            entry_price,
            exit_time: record.exit_time,
            exit_price,
            qty: record.entry_qty,
            fees: record.fees,
            pnl: record.cash,
            pnl_pct,
            reason: record.reason.unwrap_or(ExitReason::EndOfData),
        };
        debug!(
            proposal = seq,
            symbol = %entry.symbol,
            pnl = %entry.pnl,
            reason = %entry.reason,
            "Trade closed"
        );
        self.stats.add_trade(&entry);
        self.trade_log.push(entry);
    }

    /// Symbols with an open position or an admitted trade.
    fn exposed_symbols(&self) -> BTreeSet<String> {
        self.ledger
            .positions()
            .map(|p| p.symbol.clone())
            .chain(self.active.values().map(|t| t.proposal.symbol().to_string()))
            .collect()
    }

    fn snapshot<'a>(&self, exposed: &'a BTreeSet<String>) -> PortfolioSnapshot<'a> {
        let equity = self.equity();
        let cash = match &self.perp {
            Some(perp) => perp.free_margin(equity, self.ledger.gross_exposure(&self.marks)),
            None => self.cash,
        };
        PortfolioSnapshot {
            cash,
            reserved_cash: self.reserved_cash(),
            equity,
            peak_equity: self.stats.peak_equity().max(equity),
            active_legs: self.active.values().map(|t| t.proposal.legs.len()).sum(),
            active_trades: self.active.len(),
            exposed_symbols: exposed,
        }
    }

    fn admit(
        &self,
        proposal: &TradeProposal,
        request: &AdmissionRequest<'_>,
        snapshot: &PortfolioSnapshot<'_>,
    ) -> (Admission, Decimal) {
        if self
            .open_direction(request.symbol)
            .is_some_and(|direction| direction != request.direction)
        {
            return (
                Admission::rejected(
                    AdmissionStage::Capacity,
                    format!("Opposite trade open on {}", request.symbol),
                ),
                Decimal::ZERO,
            );
        }

        if let LimitCheck::Blocked { reason } = self.capacity.admit(request, snapshot) {
            return (Admission::rejected(AdmissionStage::Capacity, reason), Decimal::ZERO);
        }

        let Some(qty) = self.sizing.quantity(request, snapshot) else {
            return (
                Admission::rejected(
                    AdmissionStage::Sizing,
                    format!("{} sizing produced no quantity", self.sizing.name()),
                ),
                Decimal::ZERO,
            );
        };

        let leverage = self.perp.as_ref().map_or(Decimal::ONE, PerpetualMargin::leverage);
        let required = cash_required(
            proposal.price_bound() * qty,
            self.ledger.max_adverse_fraction(),
            self.ledger.fee_rate(request.symbol),
            leverage,
        );
        let available = snapshot.available_cash();
        if required > available {
            return (
                Admission::rejected(
                    AdmissionStage::Cash,
                    format!("Requires {:.2}, available {:.2}", required, available),
                ),
                Decimal::ZERO,
            );
        }

        if let LimitCheck::Blocked { reason } = self.settings.risk.check(request, qty, snapshot) {
            return (Admission::rejected(AdmissionStage::Risk, reason), Decimal::ZERO);
        }

        (Admission::Accepted { qty }, required)
    }

    /// Run admission for a proposal whose entry time has come.
    ///
    /// Capacity, sizing, cash and risk are checked in that order. An
    /// admitted proposal becomes an active trade whose cursor is stepped
    /// from `now`; a rejection is logged and recorded, never an error.
    pub fn try_execute(&mut self, proposal: Arc<TradeProposal>, now: i64) -> bool {
        let exposed = self.exposed_symbols();
        let snapshot = self.snapshot(&exposed);
        let request = AdmissionRequest {
            symbol: proposal.symbol(),
            direction: proposal.direction,
            entry_price: to_decimal(proposal.meta.entry_price),
            stop_price: proposal.meta.sl_price.map(to_decimal),
            legs: proposal.legs.len(),
            atr: proposal.meta.atr,
            decision_size: proposal.decision_size,
        };

        let (admission, required) = self.admit(&proposal, &request, &snapshot);
        let qty = match admission {
            Admission::Accepted { qty } => qty,
            Admission::Rejected { stage, reason } => {
                debug!(
                    proposal = proposal.id.0,
                    symbol = proposal.symbol(),
                    stage = %stage,
                    reason = %reason,
                    "Proposal rejected"
                );
                self.rejected.push(RejectedProposal {
                    proposal_id: proposal.id,
                    symbol: proposal.symbol().to_string(),
                    ts: now,
                    stage,
                    reason,
                });
                return false;
            }
        };

        let scale = qty / proposal.size();
        let cursor = proposal.cursor(scale);
        let pending = cursor.pending_qty();
        let reserve_per_unit = if pending.is_zero() {
            Decimal::ZERO
        } else {
            required / pending
        };

        debug!(
            proposal = proposal.id.0,
            symbol = proposal.symbol(),
            direction = %proposal.direction,
            qty = %qty,
            reserved = %required,
            "Proposal admitted"
        );

        let seq = proposal.id.0;
        if let Some(next) = cursor.next_ts(&proposal) {
            self.cursors.push(Reverse((next, proposal.symbol().to_string(), seq)));
        }
        self.active.insert(
            seq,
            ActiveTrade {
                proposal,
                cursor,
                reserve_per_unit,
                record: TradeRecord::default(),
            },
        );
        true
    }

    /// Perpetual funding over `(from, to]` and the maintenance check.
    fn settle_margin(&mut self, from: i64, to: i64) -> EngineResult<()> {
        let Some(perp) = self.perp.clone() else {
            return Ok(());
        };

        let periods = perp.funding_periods(from, to);
        let mut events = Vec::new();
        if periods > 0 {
            for trade in self.active.values_mut() {
                let Some(mark) = self.marks.get(trade.proposal.symbol()).copied() else {
                    continue;
                };
                let per_unit = perp.funding_per_unit(mark, periods);
                events.extend(trade.cursor.funding(&trade.proposal, to, per_unit));
            }
        }

        let funding: Decimal = events.iter().map(|e| e.price * e.qty).sum();
        let equity = self.equity() - funding;
        let gross = self.ledger.gross_exposure(&self.marks);
        let mut liquidated = Vec::new();
        if perp.is_liquidatable(equity, gross) {
            warn!(
                ts = to,
                equity = %equity,
                maintenance = %perp.maintenance_margin(gross),
                "Maintenance margin breached, liquidating"
            );
            for (seq, trade) in self.active.iter_mut() {
                let mark = self
                    .marks
                    .get(trade.proposal.symbol())
                    .copied()
                    .unwrap_or_else(|| to_decimal(trade.proposal.meta.entry_price));
                match trade.cursor.liquidate(&trade.proposal, to, mark) {
                    Some(event) => events.push(event),
                    None => trade.cursor.cancel(),
                }
                liquidated.push(*seq);
            }
        }

        self.book(events)?;

        if !liquidated.is_empty() {
            self.cursors.retain(|Reverse((_, _, seq))| !liquidated.contains(seq));
            for seq in liquidated {
                self.close_trade(seq);
            }
            info!(ts = to, cash = %self.cash, "Positions liquidated");
        }
        Ok(())
    }

    /// Build the report. Reconciles the ledger first.
    pub fn results(&self) -> EngineResult<RunReport> {
        self.ledger.reconcile()?;

        let final_equity = self.equity();
        Ok(RunReport {
            initial_cash: self.settings.initial_cash,
            final_cash: self.cash,
            final_equity,
            equity_curve: self.equity_curve.clone(),
            trade_log: self.trade_log.clone(),
            summary: self.stats.finalize(final_equity),
            per_symbol: self.stats.per_symbol().clone(),
            fills: self.ledger.fills().to_vec(),
            rejected_proposals: self.rejected.clone(),
        })
    }

    /// Direction of the trades open on a symbol, if any.
    pub fn open_direction(&self, symbol: &str) -> Option<Direction> {
        self.active
            .values()
            .find(|t| t.proposal.symbol() == symbol)
            .map(|t| t.proposal.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CandlePath, TradeProposalBuilder};
    use backtest_config::MarketMode;
    use backtest_core::types::{Candle, ProposalId};
    use backtest_ledger::{FeeModel, FillPolicy, SlippageModel};
    use rust_decimal_macros::dec;

    fn flat_path() -> CandlePath {
        CandlePath::new(
            Arc::from(vec![
                Candle::new(10, 100.0, 100.0, 100.0, 100.0, 1.0),
                Candle::new(20, 100.0, 100.0, 100.0, 100.0, 1.0),
            ]),
            0,
            false,
        )
    }

    fn proposal(id: u64, symbol: &str, direction: Direction, size: Option<Decimal>) -> Arc<TradeProposal> {
        let (tp, sl) = match direction {
            Direction::Long => (110.0, 95.0),
            Direction::Short => (90.0, 105.0),
        };
        let mut proposal = TradeProposalBuilder::new(symbol, direction, 0, 100.0)
            .take_profit(tp)
            .stop_loss(sl)
            .decision_size(size)
            .path(flat_path())
            .build()
            .unwrap();
        proposal.assign_id(ProposalId(id));
        Arc::new(proposal)
    }

    fn settings() -> PortfolioSettings {
        PortfolioSettings {
            initial_cash: dec!(10000),
            interval_ms: 10,
            market: MarketSettings::default(),
            risk: RiskLimits::default(),
        }
    }

    fn manager(settings: PortfolioSettings, sizing: SizingModel, capacity: CapacityPolicy) -> PortfolioManager {
        let ledger = TransactionLedger::new(
            FeeModel::default(),
            SlippageModel::Zero,
            FillPolicy::default(),
            7,
        );
        PortfolioManager::new(settings, sizing, capacity, ledger)
    }

    fn marks(price: Decimal) -> BTreeMap<String, Decimal> {
        ["BTCUSDT", "ETHUSDT"]
            .iter()
            .map(|s| (s.to_string(), price))
            .collect()
    }

    #[test]
    fn test_reservation_released_on_fill() {
        let mut pm = manager(settings(), SizingModel::default(), CapacityPolicy::default());

        assert!(pm.try_execute(proposal(0, "BTCUSDT", Direction::Long, None), 10));
        assert_eq!(pm.active_trades(), 1);
        // 50 units at 100 plus the worst-case fee
        assert_eq!(pm.reserved_cash(), dec!(5005));
        assert_eq!(pm.cash(), dec!(10000));

        pm.on_bar(10, &marks(dec!(100))).unwrap();
        assert_eq!(pm.reserved_cash(), Decimal::ZERO);
        assert_eq!(pm.cash(), dec!(4995));
        assert_eq!(pm.equity(), dec!(9995));
        assert_eq!(pm.open_direction("BTCUSDT"), Some(Direction::Long));

        pm.on_bar(20, &marks(dec!(100))).unwrap();
        assert_eq!(pm.active_trades(), 0);
        assert_eq!(pm.trade_log().len(), 1);
        assert_eq!(pm.trade_log()[0].reason, ExitReason::EndOfData);
        assert_eq!(pm.equity_curve().len(), 2);

        let report = pm.results().unwrap();
        assert_eq!(report.final_cash, dec!(9990));
    }

    #[test]
    fn test_sizing_without_quantity_is_rejected() {
        let mut pm = manager(settings(), SizingModel::External, CapacityPolicy::default());

        assert!(!pm.try_execute(proposal(0, "BTCUSDT", Direction::Long, None), 10));
        assert_eq!(pm.rejected()[0].stage, AdmissionStage::Sizing);
        assert_eq!(pm.active_trades(), 0);
    }

    #[test]
    fn test_cash_stage() {
        let mut pm = manager(settings(), SizingModel::External, CapacityPolicy::default());

        assert!(!pm.try_execute(proposal(0, "BTCUSDT", Direction::Long, Some(dec!(200))), 10));
        assert!(pm.try_execute(proposal(1, "BTCUSDT", Direction::Long, Some(dec!(90))), 10));

        let rejected = pm.rejected();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].proposal_id, ProposalId(0));
        assert_eq!(rejected[0].stage, AdmissionStage::Cash);
        assert_eq!(rejected[0].ts, 10);
    }

    #[test]
    fn test_risk_limits_run_last() {
        let mut settings = settings();
        settings.risk.max_risk_per_trade = Some(dec!(0.01));
        let mut pm = manager(settings, SizingModel::default(), CapacityPolicy::default());

        // 50 units with 5 of risk each against a budget of 100
        assert!(!pm.try_execute(proposal(0, "BTCUSDT", Direction::Long, None), 10));
        assert_eq!(pm.rejected()[0].stage, AdmissionStage::Risk);
    }

    #[test]
    fn test_capacity_counts_admitted_legs() {
        let mut pm = manager(
            settings(),
            SizingModel::default(),
            CapacityPolicy::LegCapacity { max_legs: 1 },
        );

        assert!(pm.try_execute(proposal(0, "BTCUSDT", Direction::Long, None), 10));
        assert!(!pm.try_execute(proposal(1, "ETHUSDT", Direction::Long, None), 10));
        assert_eq!(pm.rejected()[0].stage, AdmissionStage::Capacity);
    }

    #[test]
    fn test_opposite_direction_on_symbol_is_rejected() {
        let mut settings = settings();
        settings.market.mode = MarketMode::Perpetual;
        settings.market.allow_short = true;
        let mut pm = manager(settings, SizingModel::default(), CapacityPolicy::default());

        assert!(pm.try_execute(proposal(0, "BTCUSDT", Direction::Long, None), 10));
        assert!(!pm.try_execute(proposal(1, "BTCUSDT", Direction::Short, None), 10));
        assert!(pm.try_execute(proposal(2, "ETHUSDT", Direction::Short, None), 10));

        assert_eq!(pm.rejected().len(), 1);
        assert_eq!(pm.rejected()[0].symbol, "BTCUSDT");
        assert_eq!(pm.rejected()[0].stage, AdmissionStage::Capacity);
    }

    #[test]
    fn test_scheduled_proposals_wait_for_their_bar() {
        let mut pm = manager(settings(), SizingModel::default(), CapacityPolicy::default());
        pm.schedule([proposal(0, "BTCUSDT", Direction::Long, None)]);

        pm.on_bar(0, &marks(dec!(100))).unwrap();
        assert_eq!(pm.active_trades(), 0);
        assert!(pm.ledger().fills().is_empty());

        pm.on_bar(10, &marks(dec!(100))).unwrap();
        assert_eq!(pm.active_trades(), 1);
        assert_eq!(pm.ledger().fills().len(), 1);

        pm.finish(21).unwrap();
        assert_eq!(pm.trade_log().len(), 1);
        assert_eq!(pm.equity_curve().last().map(|p| p.ts), Some(21));
    }
}
