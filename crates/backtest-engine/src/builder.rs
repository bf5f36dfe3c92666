//! Fluent construction of trade proposals.

use std::sync::Arc;

use backtest_config::{CrossingPolicy, PartialTakeProfit};
use backtest_core::error::{EngineError, EngineResult};
use backtest_core::types::{Direction, LegPrice, OrderLeg, TradeMeta};
use rust_decimal::Decimal;

use crate::{CandlePath, ExitPlan, ExitResolver, TradeProposal};

/// Builds a [`TradeProposal`] from a decision.
///
/// Without explicit legs the proposal gets a single immediate `INIT` leg of
/// one unit. Every leg quantity is in units of the unsized proposal.
#[derive(Debug, Clone)]
pub struct TradeProposalBuilder {
    symbol: String,
    direction: Direction,
    decision_time: i64,
    entry_price: f64,
    legs: Vec<OrderLeg>,
    explicit_legs: bool,
    exits: ExitPlan,
    atr: Option<f64>,
    confidence: f64,
    strategy: String,
    decision_size: Option<Decimal>,
    path: Option<CandlePath>,
}

impl TradeProposalBuilder {
    pub fn new(symbol: impl Into<String>, direction: Direction, decision_time: i64, entry_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            decision_time,
            entry_price,
            legs: Vec::new(),
            explicit_legs: false,
            exits: ExitPlan::default(),
            atr: None,
            confidence: 1.0,
            strategy: String::new(),
            decision_size: None,
            path: None,
        }
    }

    fn init_leg(&self) -> OrderLeg {
        OrderLeg::immediate(self.direction.entry_side(), Decimal::ONE, "INIT")
    }

    /// Ladder the entry into `tranches` legs of one unit each.
    ///
    /// The first leg fills immediately; leg `k` rests
    /// `start_pct + k * step_pct` beyond `reference`.
    pub fn scale_in(mut self, tranches: usize, start_pct: f64, step_pct: f64, reference: f64) -> Self {
        let side = self.direction.entry_side();
        let sign = self.direction.sign_f64();

        self.legs.retain(|leg| !leg.is_immediate() && !leg.comment.starts_with("SCALE"));
        self.legs.insert(0, self.init_leg());
        for k in 1..tranches {
            let offset = start_pct + k as f64 * step_pct;
            let price = reference * (1.0 - sign * offset);
            self.legs.push(OrderLeg::resting(
                side,
                Decimal::ONE,
                LegPrice::Limit { price },
                format!("SCALE_{}", k + 1),
            ));
        }
        self
    }

    /// Add one unit `add_pct` percent beyond the first fill.
    pub fn dca(mut self, add_pct: f64) -> Self {
        self.legs.push(OrderLeg::resting(
            self.direction.entry_side(),
            Decimal::ONE,
            LegPrice::OffsetFromFill { pct: add_pct },
            "DCA",
        ));
        self
    }

    /// Add a hand-built leg. Disables the implicit `INIT` leg.
    pub fn leg(mut self, leg: OrderLeg) -> Self {
        self.legs.push(leg);
        self.explicit_legs = true;
        self
    }

    pub fn take_profit(mut self, price: f64) -> Self {
        self.exits.take_profit = Some(price);
        self
    }

    pub fn stop_loss(mut self, price: f64) -> Self {
        self.exits.stop_loss = Some(price);
        self
    }

    pub fn crossing(mut self, policy: CrossingPolicy, seed: u64) -> Self {
        self.exits.crossing = policy;
        self.exits.crossing_seed = seed;
        self
    }

    pub fn max_holding_bars(mut self, bars: usize) -> Self {
        self.exits.max_holding_bars = Some(bars);
        self
    }

    pub fn partial_take_profit(mut self, partial: PartialTakeProfit) -> Self {
        self.exits.partial_take_profit = Some(partial);
        self
    }

    pub fn custom_exit(mut self, resolver: Arc<dyn ExitResolver>) -> Self {
        self.exits.custom = Some(resolver);
        self
    }

    pub fn atr(mut self, atr: Option<f64>) -> Self {
        self.atr = atr;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = name.into();
        self
    }

    /// Size requested by the decision.
    pub fn decision_size(mut self, size: Option<Decimal>) -> Self {
        self.decision_size = size;
        self
    }

    /// Candles the proposal trades on, starting after the decision bar.
    pub fn path(mut self, path: CandlePath) -> Self {
        self.path = Some(path);
        self
    }

    fn check_levels(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(EngineError::ProposalInvalid(msg));
        let entry = self.entry_price;
        let sign = self.direction.sign_f64();

        if !(entry.is_finite() && entry > 0.0) {
            return invalid(format!("{}: entry price {} is not positive", self.symbol, entry));
        }
        if let Some(tp) = self.exits.take_profit {
            if !tp.is_finite() || (tp - entry) * sign <= 0.0 {
                return invalid(format!("{}: take-profit {} on the wrong side of {}", self.symbol, tp, entry));
            }
        }
        if let Some(sl) = self.exits.stop_loss {
            if !sl.is_finite() || sl <= 0.0 || (entry - sl) * sign <= 0.0 {
                return invalid(format!("{}: stop-loss {} on the wrong side of {}", self.symbol, sl, entry));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return invalid(format!("{}: confidence {} outside [0, 1]", self.symbol, self.confidence));
        }
        Ok(())
    }

    pub fn build(mut self) -> EngineResult<TradeProposal> {
        self.check_levels()?;

        let path = match self.path.take() {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(EngineError::ProposalInvalid(format!(
                    "{}: no candles after decision at {}",
                    self.symbol, self.decision_time
                )))
            }
        };
        let entry_time = path.candles()[0].ts;
        if entry_time <= self.decision_time {
            return Err(EngineError::ProposalInvalid(format!(
                "{}: path starts at {} which is not after the decision at {}",
                self.symbol, entry_time, self.decision_time
            )));
        }

        if !self.explicit_legs && !self.legs.iter().any(OrderLeg::is_immediate) {
            let init = self.init_leg();
            self.legs.insert(0, init);
        }
        if self.legs.is_empty() {
            return Err(EngineError::ProposalInvalid(format!("{}: no entry legs", self.symbol)));
        }
        let entry_side = self.direction.entry_side();
        if let Some(leg) = self
            .legs
            .iter()
            .find(|leg| leg.side != entry_side || leg.qty <= Decimal::ZERO)
        {
            return Err(EngineError::ProposalInvalid(format!(
                "{}: leg {} does not add to a {} position",
                self.symbol, leg.comment, self.direction
            )));
        }

        let size = self.legs.iter().map(|leg| leg.qty).sum();
        let meta = TradeMeta {
            symbol: self.symbol,
            direction: self.direction,
            decision_time: self.decision_time,
            entry_time,
            entry_price: self.entry_price,
            tp_price: self.exits.take_profit,
            sl_price: self.exits.stop_loss,
            size,
            atr: self.atr,
            confidence: self.confidence,
            strategy: self.strategy,
        };

        Ok(TradeProposal::new(
            self.direction,
            self.legs,
            self.exits,
            meta,
            self.decision_size,
            path,
        ))
    }
}
