//! The transaction ledger.

use std::collections::BTreeMap;

use backtest_core::error::{EngineError, EngineResult};
use backtest_core::types::{EventKind, FillRecord, Position, TradeEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::{FeeModel, FillPolicy, SlippageModel};

/// Deterministic cash and position ledger.
///
/// Every event is converted to exactly one fill. Cash changes are collected
/// in a log that the portfolio drains once per bar.
#[derive(Debug)]
pub struct TransactionLedger {
    fee_model: FeeModel,
    slippage_model: SlippageModel,
    fill_policy: FillPolicy,
    rng: StdRng,
    positions: BTreeMap<String, Position>,
    fills: Vec<FillRecord>,
    cash_log: Vec<(i64, Decimal)>,
}

impl TransactionLedger {
    /// Create a ledger. `seed` drives random slippage.
    pub fn new(
        fee_model: FeeModel,
        slippage_model: SlippageModel,
        fill_policy: FillPolicy,
        seed: u64,
    ) -> Self {
        Self {
            fee_model,
            slippage_model,
            fill_policy,
            rng: StdRng::seed_from_u64(seed),
            positions: BTreeMap::new(),
            fills: Vec::new(),
            cash_log: Vec::new(),
        }
    }

    /// Fee rate applied to a symbol.
    pub fn fee_rate(&self, symbol: &str) -> Decimal {
        self.fee_model.rate(symbol)
    }

    /// Worst adverse price fraction a fill can see (slippage plus depth).
    pub fn max_adverse_fraction(&self) -> Decimal {
        self.slippage_model.max_slippage() + self.fill_policy.max_offset()
    }

    /// Book a batch of events in order. Returns the fills created.
    pub fn ingest(&mut self, events: &[TradeEvent]) -> EngineResult<Vec<FillRecord>> {
        let mut created = Vec::with_capacity(events.len());
        for event in events {
            let fill = self.fill(event)?;
            self.apply(&fill);
            created.push(fill);
        }
        Ok(created)
    }

    fn fill(&mut self, event: &TradeEvent) -> EngineResult<FillRecord> {
        if event.kind == EventKind::Funding {
            // Price is funding per unit, so the amount keeps the position's sign
            return Ok(FillRecord {
                ts: event.ts,
                symbol: event.symbol().to_string(),
                qty: Decimal::ZERO,
                exec_price: event.price,
                fee: event.price * event.qty,
                kind: EventKind::Funding,
                meta: event.meta.clone(),
            });
        }

        if event.kind.is_exit() {
            self.check_exit(event)?;
        }

        let slip = self.slippage_model.sample(&mut self.rng);
        let exec_price = self.fill_policy.execution_price(event.price, event.qty, slip);
        let fee = (exec_price * event.qty).abs() * self.fee_model.rate(event.symbol());

        Ok(FillRecord {
            ts: event.ts,
            symbol: event.symbol().to_string(),
            qty: event.qty,
            exec_price,
            fee,
            kind: event.kind,
            meta: event.meta.clone(),
        })
    }

    fn check_exit(&self, event: &TradeEvent) -> EngineResult<()> {
        let held = self
            .positions
            .get(event.symbol())
            .map_or(Decimal::ZERO, |p| p.qty);

        if held.is_zero() {
            return Err(EngineError::ReplayInvariantViolation(format!(
                "{} {} for {} with no open position",
                event.kind, event.meta.proposal_id, event.symbol()
            )));
        }
        if held.is_sign_positive() == event.qty.is_sign_positive() {
            return Err(EngineError::ReplayInvariantViolation(format!(
                "{} {} for {} has the same sign as the position ({} vs {})",
                event.kind, event.meta.proposal_id, event.symbol(), event.qty, held
            )));
        }
        if event.qty.abs() > held.abs() {
            return Err(EngineError::ReplayInvariantViolation(format!(
                "{} {} for {} exceeds the position ({} vs {})",
                event.kind, event.meta.proposal_id, event.symbol(), event.qty, held
            )));
        }
        Ok(())
    }

    fn apply(&mut self, fill: &FillRecord) {
        self.cash_log.push((fill.ts, fill.cash_delta()));

        if !fill.qty.is_zero() {
            let position = self
                .positions
                .entry(fill.symbol.clone())
                .or_insert_with(|| Position::flat(fill.symbol.clone()));
            let realized = position.apply(fill.qty, fill.exec_price);
            trace!(
                symbol = %fill.symbol,
                qty = %fill.qty,
                price = %fill.exec_price,
                realized = %realized,
                "Position updated"
            );
            if position.is_flat() {
                self.positions.remove(&fill.symbol);
            }
        }

        debug!(
            ts = fill.ts,
            symbol = %fill.symbol,
            kind = %fill.kind,
            qty = %fill.qty,
            exec_price = %fill.exec_price,
            fee = %fill.fee,
            "Fill booked"
        );
        self.fills.push(fill.clone());
    }

    /// Realised cash change since the last call, clearing the log.
    pub fn pop_cash_delta(&mut self) -> Decimal {
        self.cash_log.drain(..).map(|(_, delta)| delta).sum()
    }

    /// Realised cash change since the last pop, without clearing.
    pub fn pending_cash_delta(&self) -> Decimal {
        self.cash_log.iter().map(|(_, delta)| *delta).sum()
    }

    /// Open position for a symbol.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// All open positions.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// All fills booked so far.
    pub fn fills(&self) -> &[FillRecord] {
        &self.fills
    }

    fn mark(position: &Position, marks: &BTreeMap<String, Decimal>) -> Decimal {
        marks
            .get(&position.symbol)
            .copied()
            .unwrap_or(position.avg_price)
    }

    /// Mark-to-market P&L of open positions. Missing marks fall back to cost.
    pub fn unrealised_pnl(&self, marks: &BTreeMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .map(|p| p.unrealized_pnl(Self::mark(p, marks)))
            .sum()
    }

    /// Signed market value of open positions.
    pub fn market_value(&self, marks: &BTreeMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(Self::mark(p, marks)))
            .sum()
    }

    /// Gross exposure `Σ |qty × mark|`.
    pub fn gross_exposure(&self, marks: &BTreeMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .map(|p| p.market_value(Self::mark(p, marks)).abs())
            .sum()
    }

    /// Check every position against the sum of its fills.
    pub fn reconcile(&self) -> EngineResult<()> {
        let mut expected: BTreeMap<&str, Decimal> = BTreeMap::new();
        for fill in &self.fills {
            *expected.entry(fill.symbol.as_str()).or_default() += fill.qty;
        }

        for (symbol, qty) in &expected {
            let held = self.positions.get(*symbol).map_or(Decimal::ZERO, |p| p.qty);
            if held != *qty {
                return Err(EngineError::ReplayInvariantViolation(format!(
                    "position {} holds {} but fills sum to {}",
                    symbol, held, qty
                )));
            }
        }
        if let Some(orphan) = self.positions.keys().find(|s| !expected.contains_key(s.as_str())) {
            return Err(EngineError::ReplayInvariantViolation(format!(
                "position {} has no fills",
                orphan
            )));
        }
        Ok(())
    }
}
