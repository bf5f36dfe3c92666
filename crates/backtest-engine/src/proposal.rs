//! Immutable trade proposals.

use std::sync::{Arc, OnceLock};

use backtest_core::types::{
    Candle, Direction, LegPrice, OrderLeg, ProposalId, TradeEvent, TradeMeta,
};
use rust_decimal::Decimal;

use crate::{EventCursor, ExitPlan};

/// Convert a candle or decision price to the ledger's decimal type.
pub(crate) fn to_decimal(price: f64) -> Decimal {
    Decimal::try_from(price).unwrap_or(Decimal::ZERO)
}

/// The price path a proposal trades on: a range of a shared candle series.
#[derive(Debug, Clone)]
pub struct CandlePath {
    rows: Arc<[Candle]>,
    start: usize,
    end: usize,
    detail: bool,
}

impl CandlePath {
    /// Rows `start..` of a series.
    pub fn new(rows: Arc<[Candle]>, start: usize, detail: bool) -> Self {
        let start = start.min(rows.len());
        let end = rows.len();
        Self {
            rows,
            start,
            end,
            detail,
        }
    }

    /// Candles of the path, oldest first.
    pub fn candles(&self) -> &[Candle] {
        &self.rows[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if the path runs on detail candles.
    pub fn is_detail(&self) -> bool {
        self.detail
    }
}

/// A sized-later trade built from one decision.
///
/// Legs hold quantities of the unsized proposal; the portfolio scales them
/// once the proposal is admitted. Everything is fixed at build time, so the
/// proposal is shared read-only between the timeline and the replay.
#[derive(Debug, Clone)]
pub struct TradeProposal {
    pub id: ProposalId,
    pub direction: Direction,
    pub legs: Vec<OrderLeg>,
    pub exits: ExitPlan,
    pub meta: TradeMeta,
    /// Size requested by the decision, for the external sizing model
    pub decision_size: Option<Decimal>,
    path: CandlePath,
    events: OnceLock<Vec<TradeEvent>>,
}

impl TradeProposal {
    pub(crate) fn new(
        direction: Direction,
        legs: Vec<OrderLeg>,
        exits: ExitPlan,
        meta: TradeMeta,
        decision_size: Option<Decimal>,
        path: CandlePath,
    ) -> Self {
        Self {
            id: ProposalId::default(),
            direction,
            legs,
            exits,
            meta,
            decision_size,
            path,
            events: OnceLock::new(),
        }
    }

    /// Assign the replay sequence number. Called by the timeline merge.
    pub(crate) fn assign_id(&mut self, id: ProposalId) {
        self.id = id;
        self.events = OnceLock::new();
    }

    pub fn symbol(&self) -> &str {
        &self.meta.symbol
    }

    /// Earliest time the first leg can fill.
    pub fn entry_time(&self) -> i64 {
        self.meta.entry_time
    }

    /// Candles after the decision bar.
    pub fn candles(&self) -> &[Candle] {
        self.path.candles()
    }

    pub fn path(&self) -> &CandlePath {
        &self.path
    }

    /// Total unsized quantity across legs.
    pub fn size(&self) -> Decimal {
        self.meta.size
    }

    /// Highest price per unit any leg can fill at, for the cash requirement.
    pub fn price_bound(&self) -> Decimal {
        let entry = to_decimal(self.meta.entry_price);
        self.legs
            .iter()
            .map(|leg| match leg.price {
                LegPrice::Market | LegPrice::OffsetFromFill { .. } => entry,
                LegPrice::Limit { price } => to_decimal(price),
            })
            .fold(entry, Decimal::max)
    }

    /// Replay cursor at `scale` units per unsized unit.
    pub fn cursor(&self, scale: Decimal) -> EventCursor {
        EventCursor::new(self, scale)
    }

    /// Every event of the unsized proposal. Computed once and cached.
    pub fn build_events(&self) -> &[TradeEvent] {
        self.events.get_or_init(|| {
            let mut cursor = self.cursor(Decimal::ONE);
            let mut events = Vec::new();
            while !cursor.is_done() {
                events.extend(cursor.step(self));
            }
            events
        })
    }
}
