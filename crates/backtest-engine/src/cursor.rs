//! Lazy realization of a proposal's events.

use backtest_core::types::{
    Candle, Direction, EventKind, EventMeta, ExitReason, LegPrice, LegTrigger, OrderLeg,
    TradeEvent,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::crossing::CrossingResolver;
use crate::exit::ExitContext;
use crate::proposal::to_decimal;
use crate::TradeProposal;

/// Decimal places kept on scaled quantities.
const QTY_DP: u32 = 8;

fn truncate(qty: Decimal) -> Decimal {
    qty.round_dp_with_strategy(QTY_DP, RoundingStrategy::ToZero)
}

#[derive(Debug, Clone)]
struct LegState {
    qty: Decimal,
    filled: bool,
    expired: bool,
}

impl LegState {
    fn is_pending(&self) -> bool {
        !self.filled && !self.expired && !self.qty.is_zero()
    }
}

/// Steps a proposal through its candle path one candle at a time.
///
/// The cursor does not hold the proposal; every step is handed the same
/// proposal it was created from. Quantities are the unsized leg quantities
/// times `scale`, truncated to 8 decimal places.
#[derive(Debug, Clone)]
pub struct EventCursor {
    scale: Decimal,
    legs: Vec<LegState>,
    next: usize,
    /// Unsigned quantity currently held
    open_qty: Decimal,
    entered_qty: Decimal,
    entry_cost: Decimal,
    first_fill: Option<(usize, Decimal)>,
    bars_held: usize,
    best_price: Option<f64>,
    partial_done: bool,
    crossing: CrossingResolver,
    ordinal: u32,
    done: bool,
}

impl EventCursor {
    pub(crate) fn new(proposal: &TradeProposal, scale: Decimal) -> Self {
        let legs = proposal
            .legs
            .iter()
            .map(|leg| LegState {
                qty: truncate(leg.qty * scale),
                filled: false,
                expired: false,
            })
            .collect();

        Self {
            scale,
            legs,
            next: 0,
            open_qty: Decimal::ZERO,
            entered_qty: Decimal::ZERO,
            entry_cost: Decimal::ZERO,
            first_fill: None,
            bars_held: 0,
            best_price: None,
            partial_done: false,
            crossing: proposal.exits.resolver(),
            ordinal: 0,
            done: proposal.candles().is_empty(),
        }
    }

    pub fn scale(&self) -> Decimal {
        self.scale
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Check if any leg has filled.
    pub fn is_entered(&self) -> bool {
        !self.entered_qty.is_zero()
    }

    /// Unsigned quantity currently held.
    pub fn open_qty(&self) -> Decimal {
        self.open_qty
    }

    /// Scaled quantity of legs that have not filled and not expired.
    pub fn pending_qty(&self) -> Decimal {
        self.legs
            .iter()
            .filter(|l| l.is_pending())
            .map(|l| l.qty)
            .sum()
    }

    /// Open time of the next candle to process.
    pub fn next_ts(&self, proposal: &TradeProposal) -> Option<i64> {
        if self.done {
            return None;
        }
        proposal.candles().get(self.next).map(|c| c.ts)
    }

    fn event(
        &mut self,
        proposal: &TradeProposal,
        ts: i64,
        price: Decimal,
        qty: Decimal,
        kind: EventKind,
        leg: Option<String>,
        exit: Option<ExitReason>,
    ) -> TradeEvent {
        let meta = EventMeta {
            proposal_id: proposal.id,
            symbol: proposal.symbol().to_string(),
            ordinal: self.ordinal,
            leg,
            exit,
        };
        self.ordinal += 1;
        TradeEvent {
            ts,
            price,
            qty,
            kind,
            meta,
        }
    }

    /// Fill price of a leg on this candle, if it triggers.
    fn leg_fill(&self, proposal: &TradeProposal, leg: &OrderLeg, candle: &Candle, first: bool) -> Option<f64> {
        let direction = proposal.direction;
        let entry = proposal.meta.entry_price;

        if leg.trigger == LegTrigger::Immediate {
            if !first {
                return None;
            }
            return Some(match direction {
                Direction::Long => candle.open.min(entry),
                Direction::Short => candle.open.max(entry),
            });
        }

        let px = match leg.price {
            LegPrice::Market => entry,
            LegPrice::Limit { price } => price,
            LegPrice::OffsetFromFill { pct } => {
                // Rests from the candle after the first fill
                let (candle_index, fill) = self.first_fill?;
                if candle_index + 1 >= self.next {
                    return None;
                }
                fill.to_f64()? * (1.0 - direction.sign_f64() * pct / 100.0)
            }
        };

        match leg.trigger {
            LegTrigger::AtOrBelow if candle.low <= px => Some(candle.open.min(px)),
            LegTrigger::AtOrAbove if candle.high >= px => Some(candle.open.max(px)),
            _ => None,
        }
    }

    fn fill_legs(&mut self, proposal: &TradeProposal, candle: &Candle, first: bool, events: &mut Vec<TradeEvent>) {
        let sign = proposal.direction.sign();

        for (index, leg) in proposal.legs.iter().enumerate() {
            if !self.legs[index].is_pending() {
                continue;
            }

            match self.leg_fill(proposal, leg, candle, first) {
                Some(price) => {
                    let qty = self.legs[index].qty;
                    let price = to_decimal(price);
                    self.legs[index].filled = true;
                    self.open_qty += qty;
                    self.entered_qty += qty;
                    self.entry_cost += price * qty;
                    if self.first_fill.is_none() {
                        self.first_fill = Some((self.next - 1, price));
                    }
                    let event = self.event(
                        proposal,
                        candle.ts,
                        price,
                        sign * qty,
                        EventKind::Open,
                        Some(leg.comment.clone()),
                        None,
                    );
                    events.push(event);
                }
                None if first && leg.time_in_force.expires_after_first_candle() => {
                    self.legs[index].expired = true;
                }
                None => {}
            }
        }
    }

    fn avg_entry(&self) -> f64 {
        if self.entered_qty.is_zero() {
            return 0.0;
        }
        (self.entry_cost / self.entered_qty).to_f64().unwrap_or(0.0)
    }

    fn close(
        &mut self,
        proposal: &TradeProposal,
        ts: i64,
        price: Decimal,
        kind: EventKind,
        reason: ExitReason,
    ) -> TradeEvent {
        let qty = -proposal.direction.sign() * self.open_qty;
        self.open_qty = Decimal::ZERO;
        self.done = true;
        for leg in self.legs.iter_mut().filter(|l| l.is_pending()) {
            leg.expired = true;
        }
        self.event(proposal, ts, price, qty, kind, None, Some(reason))
    }

    /// Exits on this candle. At most one partial close, then at most one close.
    fn check_exits(&mut self, proposal: &TradeProposal, candle: &Candle, last: bool, events: &mut Vec<TradeEvent>) {
        let direction = proposal.direction;
        let exits = &proposal.exits;
        let avg_entry = self.avg_entry();

        if let Some(resolver) = exits.custom.as_ref() {
            let ctx = ExitContext {
                symbol: proposal.symbol(),
                direction,
                candle,
                avg_entry,
                open_qty: self.open_qty,
                bars_held: self.bars_held,
                best_price: self.best_price.unwrap_or(avg_entry),
            };
            if let Some(exit) = resolver.check(&ctx) {
                let event = self.close(
                    proposal,
                    candle.ts,
                    to_decimal(exit.price),
                    EventKind::Close,
                    ExitReason::Custom(exit.label),
                );
                events.push(event);
                return;
            }
        }

        if !self.partial_done {
            if let (Some(price), Some(partial)) = (
                exits.partial_fill(candle, direction, avg_entry),
                exits.partial_take_profit,
            ) {
                self.partial_done = true;
                let fraction = Decimal::try_from(partial.fraction).unwrap_or(Decimal::ZERO);
                let qty = truncate(self.open_qty * fraction);
                if qty > Decimal::ZERO && qty < self.open_qty {
                    // Stop on the same candle: the crossing policy picks which came first
                    if let Some(stop) = exits.stop_loss_fill(candle, direction) {
                        if !self.crossing.take_profit_wins() {
                            let event = self.close(
                                proposal,
                                candle.ts,
                                to_decimal(stop),
                                EventKind::Close,
                                ExitReason::StopLoss,
                            );
                            events.push(event);
                            return;
                        }
                    }
                    self.open_qty -= qty;
                    let event = self.event(
                        proposal,
                        candle.ts,
                        to_decimal(price),
                        -direction.sign() * qty,
                        EventKind::PartialClose,
                        None,
                        Some(ExitReason::PartialTakeProfit),
                    );
                    events.push(event);
                }
            }
        }

        let exit = if let Some((reason, price)) = exits.check_bracket(candle, direction, &mut self.crossing) {
            Some((reason, price))
        } else if exits.max_holding_bars.is_some_and(|max| self.bars_held >= max) {
            Some((ExitReason::TimeExit, candle.close))
        } else if last {
            Some((ExitReason::EndOfData, candle.close))
        } else {
            None
        };

        if let Some((reason, price)) = exit {
            let event = self.close(proposal, candle.ts, to_decimal(price), EventKind::Close, reason);
            events.push(event);
        }
    }

    /// Process the next candle. Returns the events it produced, in order.
    pub fn step(&mut self, proposal: &TradeProposal) -> Vec<TradeEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        let candles = proposal.candles();
        let Some(candle) = candles.get(self.next) else {
            self.done = true;
            return events;
        };
        let first = self.next == 0;
        self.next += 1;
        let last = self.next >= candles.len();

        self.fill_legs(proposal, candle, first, &mut events);

        if self.open_qty.is_zero() {
            // Not entered yet, or nothing left to enter
            let waiting = self.legs.iter().any(LegState::is_pending);
            if !waiting || last {
                self.done = true;
            }
            return events;
        }

        self.bars_held += 1;
        self.check_exits(proposal, candle, last, &mut events);

        let best = match proposal.direction {
            Direction::Long => candle.high,
            Direction::Short => candle.low,
        };
        self.best_price = Some(match (self.best_price, proposal.direction) {
            (None, _) => best,
            (Some(prev), Direction::Long) => prev.max(best),
            (Some(prev), Direction::Short) => prev.min(best),
        });

        events
    }

    /// Funding charge on the open quantity. `per_unit` is mark times rate.
    pub fn funding(&mut self, proposal: &TradeProposal, ts: i64, per_unit: Decimal) -> Option<TradeEvent> {
        if self.open_qty.is_zero() || per_unit.is_zero() {
            return None;
        }
        let qty = proposal.direction.sign() * self.open_qty;
        Some(self.event(proposal, ts, per_unit, qty, EventKind::Funding, None, None))
    }

    /// Forced close of the open quantity at `price`; pending legs are cancelled.
    pub fn liquidate(&mut self, proposal: &TradeProposal, ts: i64, price: Decimal) -> Option<TradeEvent> {
        if self.open_qty.is_zero() {
            self.cancel();
            return None;
        }
        Some(self.close(proposal, ts, price, EventKind::Liquidate, ExitReason::Liquidation))
    }

    /// Stop without emitting anything further.
    pub fn cancel(&mut self) {
        for leg in self.legs.iter_mut().filter(|l| l.is_pending()) {
            leg.expired = true;
        }
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::TrailingStop;
    use crate::TradeProposalBuilder;
    use backtest_config::{CrossingPolicy, PartialTakeProfit};
    use backtest_core::types::{Candle, TimeInForce};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn path(rows: Vec<Candle>) -> crate::CandlePath {
        crate::CandlePath::new(Arc::from(rows), 0, false)
    }

    fn long(rows: Vec<Candle>) -> TradeProposalBuilder {
        TradeProposalBuilder::new("BTCUSDT", Direction::Long, -86_400_000, 100.0)
            .take_profit(110.0)
            .stop_loss(95.0)
            .path(path(rows))
    }

    fn day(i: i64) -> i64 {
        i * 86_400_000
    }

    #[test]
    fn test_stop_loss_round_trip() {
        let proposal = long(vec![
            Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
            Candle::new(day(1), 99.0, 100.0, 94.0, 96.0, 1.0),
            Candle::new(day(2), 96.0, 97.0, 95.5, 96.0, 1.0),
        ])
        .build()
        .unwrap();

        let events = proposal.build_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Open);
        assert_eq!(events[0].price, dec!(100));
        assert_eq!(events[0].qty, dec!(1));
        assert_eq!(events[1].kind, EventKind::Close);
        assert_eq!(events[1].ts, day(1));
        assert_eq!(events[1].price, dec!(95));
        assert_eq!(events[1].qty, dec!(-1));
        assert_eq!(events[1].meta.exit, Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_build_events_is_idempotent() {
        let proposal = long(vec![
            Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
            Candle::new(day(1), 100.0, 111.0, 99.0, 109.0, 1.0),
        ])
        .build()
        .unwrap();

        let first = proposal.build_events().to_vec();
        let second = proposal.build_events();
        assert_eq!(first, second);
        assert!(std::ptr::eq(proposal.build_events(), second));
        assert_eq!(second[1].meta.exit, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn test_entry_improved_by_open() {
        // Gap down through the entry: buy at the open
        let proposal = long(vec![
            Candle::new(day(0), 98.0, 99.0, 97.0, 98.5, 1.0),
            Candle::new(day(1), 98.5, 99.0, 98.0, 98.5, 1.0),
        ])
        .build()
        .unwrap();

        let events = proposal.build_events();
        assert_eq!(events[0].price, dec!(98));
        assert_eq!(events[1].meta.exit, Some(ExitReason::EndOfData));
        assert_eq!(events[1].price, dec!(98.5));
    }

    #[test]
    fn test_crossing_policy_on_ambiguous_candle() {
        let rows = vec![
            Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
            Candle::new(day(1), 100.0, 120.0, 90.0, 100.0, 1.0),
        ];

        let prefer_sl = long(rows.clone()).build().unwrap();
        assert_eq!(prefer_sl.build_events()[1].price, dec!(95));

        let prefer_tp = long(rows.clone())
            .crossing(CrossingPolicy::PreferTp, 0)
            .build()
            .unwrap();
        assert_eq!(prefer_tp.build_events()[1].price, dec!(110));

        let random = |seed| {
            long(rows.clone())
                .crossing(CrossingPolicy::Random, seed)
                .build()
                .unwrap()
                .build_events()[1]
                .price
        };
        assert_eq!(random(11), random(11));
    }

    #[test]
    fn test_scale_in_and_partial_take_profit() {
        let proposal = TradeProposalBuilder::new("ETHUSDT", Direction::Long, -86_400_000, 100.0)
            .take_profit(120.0)
            .stop_loss(80.0)
            .scale_in(2, 0.05, 0.0, 100.0)
            .partial_take_profit(PartialTakeProfit {
                ratio: 0.05,
                fraction: 0.5,
            })
            .path(path(vec![
                Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
                Candle::new(day(1), 99.0, 99.5, 94.0, 96.0, 1.0),
                Candle::new(day(2), 96.0, 104.0, 95.0, 103.0, 1.0),
                Candle::new(day(3), 103.0, 104.0, 102.0, 103.0, 1.0),
            ]))
            .build()
            .unwrap();

        let mut cursor = proposal.cursor(dec!(10));
        let first = cursor.step(&proposal);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].qty, dec!(10));

        // Second tranche rests at 95
        let second = cursor.step(&proposal);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].price, dec!(95));
        assert_eq!(cursor.open_qty(), dec!(20));

        // Average entry 97.5, partial level 102.375
        let third = cursor.step(&proposal);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].kind, EventKind::PartialClose);
        assert_eq!(third[0].qty, dec!(-10));

        let last = cursor.step(&proposal);
        assert_eq!(last[0].kind, EventKind::Close);
        assert_eq!(last[0].qty, dec!(-10));
        assert!(cursor.is_done());
    }

    #[test]
    fn test_stop_gap_fills_at_open() {
        // Entry candle opens below the stop
        let entered = long(vec![
            Candle::new(day(0), 90.0, 91.0, 89.0, 90.0, 1.0),
            Candle::new(day(1), 90.0, 91.0, 89.0, 90.0, 1.0),
        ])
        .build()
        .unwrap();
        let events = entered.build_events();
        assert_eq!(events[0].price, dec!(90));
        assert_eq!(events[1].ts, day(0));
        assert_eq!(events[1].price, dec!(90));
        assert_eq!(events[1].meta.exit, Some(ExitReason::StopLoss));

        let held = long(vec![
            Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
            Candle::new(day(1), 90.0, 91.0, 89.0, 90.0, 1.0),
            Candle::new(day(2), 90.0, 91.0, 89.0, 90.0, 1.0),
        ])
        .build()
        .unwrap();
        let events = held.build_events();
        assert_eq!(events[1].ts, day(1));
        assert_eq!(events[1].price, dec!(90));
        assert_eq!(events[1].meta.exit, Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_partial_and_stop_on_same_candle() {
        let builder = || {
            TradeProposalBuilder::new("BTCUSDT", Direction::Long, -86_400_000, 100.0)
                .take_profit(120.0)
                .stop_loss(95.0)
                .partial_take_profit(PartialTakeProfit {
                    ratio: 0.05,
                    fraction: 0.5,
                })
                .path(path(vec![
                    Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
                    Candle::new(day(1), 100.0, 106.0, 94.0, 97.0, 1.0),
                    Candle::new(day(2), 97.0, 98.0, 96.0, 97.0, 1.0),
                ]))
        };

        let prefer_sl = builder().build().unwrap();
        let events = prefer_sl.build_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Close);
        assert_eq!(events[1].ts, day(1));
        assert_eq!(events[1].price, dec!(95));
        assert_eq!(events[1].qty, dec!(-1));
        assert_eq!(events[1].meta.exit, Some(ExitReason::StopLoss));

        // Partial first, then the rest of the candle still reaches the stop
        let prefer_tp = builder()
            .crossing(CrossingPolicy::PreferTp, 0)
            .build()
            .unwrap();
        let events = prefer_tp.build_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind, EventKind::PartialClose);
        assert_eq!(events[1].price, dec!(105));
        assert_eq!(events[1].qty, dec!(-0.5));
        assert_eq!(events[2].kind, EventKind::Close);
        assert_eq!(events[2].ts, day(1));
        assert_eq!(events[2].price, dec!(95));
        assert_eq!(events[2].qty, dec!(-0.5));
        assert!(events[1].meta.ordinal < events[2].meta.ordinal);
    }

    #[test]
    fn test_expired_leg_never_enters() {
        let proposal = TradeProposalBuilder::new("BTCUSDT", Direction::Long, -86_400_000, 100.0)
            .leg(
                OrderLeg::resting(
                    backtest_core::types::Side::Buy,
                    dec!(1),
                    LegPrice::Limit { price: 90.0 },
                    "IOC",
                )
                .with_time_in_force(TimeInForce::IOC),
            )
            .path(path(vec![
                Candle::new(day(0), 100.0, 101.0, 95.0, 100.0, 1.0),
                Candle::new(day(1), 100.0, 101.0, 85.0, 100.0, 1.0),
            ]))
            .build()
            .unwrap();

        assert!(proposal.build_events().is_empty());
    }

    #[test]
    fn test_time_exit_and_custom_exit() {
        let rows = vec![
            Candle::new(day(0), 100.0, 102.0, 99.0, 101.0, 1.0),
            Candle::new(day(1), 101.0, 106.0, 100.0, 105.0, 1.0),
            Candle::new(day(2), 105.0, 105.5, 103.0, 104.0, 1.0),
            Candle::new(day(3), 104.0, 105.0, 94.0, 95.0, 1.0),
        ];

        let timed = long(rows.clone()).max_holding_bars(2).build().unwrap();
        let events = timed.build_events();
        assert_eq!(events[1].ts, day(1));
        assert_eq!(events[1].meta.exit, Some(ExitReason::TimeExit));
        assert_eq!(events[1].price, dec!(105));

        let trailed = long(rows)
            .custom_exit(Arc::new(TrailingStop { pct: 0.02 }))
            .build()
            .unwrap();
        let events = trailed.build_events();
        // Best high 106 before day 2, stop at 103.88
        assert_eq!(events[1].ts, day(2));
        assert_eq!(
            events[1].meta.exit,
            Some(ExitReason::Custom("trailing_stop".into()))
        );
    }

    #[test]
    fn test_dca_leg_waits_for_next_candle() {
        let proposal = long(vec![
            Candle::new(day(0), 100.0, 101.0, 97.0, 100.0, 1.0),
            Candle::new(day(1), 99.0, 100.0, 97.5, 98.0, 1.0),
            Candle::new(day(2), 98.0, 99.0, 97.0, 98.0, 1.0),
        ])
        .dca(2.0)
        .build()
        .unwrap();

        let events = proposal.build_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind, EventKind::Open);
        assert_eq!(events[1].ts, day(1));
        assert_eq!(events[1].price, dec!(98));
        assert_eq!(events[1].meta.leg.as_deref(), Some("DCA"));
        assert_eq!(events[2].qty, dec!(-2));
    }

    #[test]
    fn test_liquidate_and_funding() {
        let proposal = long(vec![
            Candle::new(day(0), 100.0, 101.0, 99.0, 100.0, 1.0),
            Candle::new(day(1), 100.0, 101.0, 99.0, 100.0, 1.0),
        ])
        .build()
        .unwrap();

        let mut cursor = proposal.cursor(dec!(3));
        cursor.step(&proposal);

        let funding = cursor.funding(&proposal, day(0) + 1, dec!(0.01)).unwrap();
        assert_eq!(funding.kind, EventKind::Funding);
        assert_eq!(funding.qty, dec!(3));

        let forced = cursor.liquidate(&proposal, day(0) + 2, dec!(60)).unwrap();
        assert_eq!(forced.kind, EventKind::Liquidate);
        assert_eq!(forced.qty, dec!(-3));
        assert_eq!(forced.meta.exit, Some(ExitReason::Liquidation));
        assert!(cursor.is_done());
        assert_eq!(cursor.next_ts(&proposal), None);
        assert_eq!(funding.meta.ordinal + 1, forced.meta.ordinal);
    }
}
