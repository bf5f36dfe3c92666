//! The single global order of proposals and events.

use std::cmp::Ordering;
use std::sync::Arc;

use backtest_core::types::{ProposalId, TradeEvent};

use crate::TradeProposal;

/// Replay key of one event.
///
/// Ordered by timestamp, then symbol, then event rank
/// (`OPEN < PARTIAL_CLOSE < CLOSE < FUNDING < LIQUIDATE`), then proposal
/// sequence and the event's position in its proposal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimelineKey {
    pub ts: i64,
    pub symbol: String,
    pub rank: u8,
    pub seq: u64,
    pub ordinal: u32,
}

impl TimelineKey {
    pub fn for_event(event: &TradeEvent) -> Self {
        Self {
            ts: event.ts,
            symbol: event.meta.symbol.clone(),
            rank: event.kind.rank(),
            seq: event.meta.proposal_id.0,
            ordinal: event.meta.ordinal,
        }
    }
}

fn proposal_order(a: &TradeProposal, b: &TradeProposal) -> Ordering {
    (a.entry_time(), a.symbol(), a.meta.decision_time, a.direction).cmp(&(
        b.entry_time(),
        b.symbol(),
        b.meta.decision_time,
        b.direction,
    ))
}

/// Every proposal of a run in replay order, plus the global clock.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    proposals: Vec<Arc<TradeProposal>>,
    clock: Vec<i64>,
}

impl Timeline {
    /// Merge worker batches and number the proposals in replay order.
    ///
    /// The result does not depend on how proposals were split into batches.
    pub fn merge(batches: Vec<Vec<TradeProposal>>, clock: Vec<i64>) -> Self {
        let mut proposals: Vec<TradeProposal> = batches.into_iter().flatten().collect();
        proposals.sort_by(proposal_order);

        let proposals = proposals
            .into_iter()
            .enumerate()
            .map(|(seq, mut proposal)| {
                proposal.assign_id(ProposalId(seq as u64));
                Arc::new(proposal)
            })
            .collect();

        Self { proposals, clock }
    }

    pub fn proposals(&self) -> &[Arc<TradeProposal>] {
        &self.proposals
    }

    /// Sorted, de-duplicated bar timestamps.
    pub fn clock(&self) -> &[i64] {
        &self.clock
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CandlePath, TradeProposalBuilder};
    use backtest_core::types::{Candle, Direction, EventKind, EventMeta};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    const DAY: i64 = 86_400_000;

    fn proposal(symbol: &str, decision_day: i64) -> TradeProposal {
        let rows: Vec<Candle> = (0..12)
            .map(|d| Candle::new(d * DAY, 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect();
        let start = (decision_day + 1) as usize;
        TradeProposalBuilder::new(symbol, Direction::Long, decision_day * DAY, 100.0)
            .path(CandlePath::new(Arc::from(rows), start, false))
            .build()
            .unwrap()
    }

    fn event(ts: i64, symbol: &str, kind: EventKind, seq: u64) -> TradeEvent {
        TradeEvent {
            ts,
            price: Decimal::ONE,
            qty: Decimal::ONE,
            kind,
            meta: EventMeta {
                proposal_id: ProposalId(seq),
                symbol: symbol.to_string(),
                ordinal: 0,
                leg: None,
                exit: None,
            },
        }
    }

    #[test]
    fn test_merge_orders_by_entry_then_symbol() {
        let timeline = Timeline::merge(
            vec![
                vec![proposal("ETHUSDT", 1), proposal("ETHUSDT", 0)],
                vec![proposal("BTCUSDT", 1)],
            ],
            vec![0, DAY],
        );

        let order: Vec<(&str, i64, u64)> = timeline
            .proposals()
            .iter()
            .map(|p| (p.symbol(), p.meta.decision_time, p.id.0))
            .collect();
        assert_eq!(
            order,
            vec![("ETHUSDT", 0, 0), ("BTCUSDT", DAY, 1), ("ETHUSDT", DAY, 2)]
        );
        assert_eq!(timeline.clock(), &[0, DAY]);
    }

    #[test]
    fn test_event_key_order() {
        let mut keys = vec![
            TimelineKey::for_event(&event(5, "ETHUSDT", EventKind::Open, 0)),
            TimelineKey::for_event(&event(5, "BTCUSDT", EventKind::Close, 3)),
            TimelineKey::for_event(&event(5, "BTCUSDT", EventKind::Open, 7)),
            TimelineKey::for_event(&event(4, "XRPUSDT", EventKind::Liquidate, 1)),
            TimelineKey::for_event(&event(5, "BTCUSDT", EventKind::Funding, 2)),
        ];
        keys.sort();

        let order: Vec<(i64, &str, u64)> = keys.iter().map(|k| (k.ts, k.symbol.as_str(), k.seq)).collect();
        assert_eq!(
            order,
            vec![
                (4, "XRPUSDT", 1),
                (5, "BTCUSDT", 7),
                (5, "BTCUSDT", 3),
                (5, "BTCUSDT", 2),
                (5, "ETHUSDT", 0),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_merge_independent_of_batching(
            picks in prop::collection::vec((0usize..3, 0i64..10), 1..20),
            split in 0usize..20,
        ) {
            let symbols = ["BTCUSDT", "ETHUSDT", "XRPUSDT"];
            let make = || picks.iter().map(|(s, d)| proposal(symbols[*s], *d)).collect::<Vec<_>>();

            let single = Timeline::merge(vec![make()], Vec::new());

            let mut reversed = make();
            reversed.reverse();
            let cut = split.min(reversed.len());
            let tail = reversed.split_off(cut);
            let batched = Timeline::merge(vec![tail, reversed], Vec::new());

            let metas = |t: &Timeline| t.proposals().iter().map(|p| p.meta.clone()).collect::<Vec<_>>();
            prop_assert_eq!(metas(&single), metas(&batched));
            for (seq, p) in batched.proposals().iter().enumerate() {
                prop_assert_eq!(p.id.0, seq as u64);
            }
        }
    }
}
