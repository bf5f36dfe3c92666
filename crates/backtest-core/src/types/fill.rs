//! Executed fills recorded by the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EventKind, EventMeta};

/// A concrete execution: price after slippage and the fee charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    /// Execution time, unix milliseconds
    pub ts: i64,
    /// Symbol
    pub symbol: String,
    /// Signed quantity (+ buys, - sells)
    pub qty: Decimal,
    /// Execution price after slippage
    pub exec_price: Decimal,
    /// Fee paid, or funding paid for FUNDING records (negative when received)
    pub fee: Decimal,
    /// Kind of the originating event
    pub kind: EventKind,
    /// Metadata of the originating event
    pub meta: EventMeta,
}

impl FillRecord {
    /// Cash effect of this fill.
    pub fn cash_delta(&self) -> Decimal {
        match self.kind {
            EventKind::Funding => -self.fee,
            _ => -self.exec_price * self.qty - self.fee,
        }
    }

    /// Absolute traded value.
    pub fn notional(&self) -> Decimal {
        (self.exec_price * self.qty).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProposalId;
    use rust_decimal_macros::dec;

    fn meta() -> EventMeta {
        EventMeta {
            proposal_id: ProposalId(1),
            symbol: "BTCUSDT".to_string(),
            ordinal: 0,
            leg: None,
            exit: None,
        }
    }

    #[test]
    fn test_buy_cash_delta() {
        let fill = FillRecord {
            ts: 0,
            symbol: "BTCUSDT".to_string(),
            qty: dec!(2),
            exec_price: dec!(100),
            fee: dec!(0.2),
            kind: EventKind::Open,
            meta: meta(),
        };
        assert_eq!(fill.cash_delta(), dec!(-200.2));
        assert_eq!(fill.notional(), dec!(200));
    }

    #[test]
    fn test_sell_and_funding_cash_delta() {
        let mut fill = FillRecord {
            ts: 0,
            symbol: "BTCUSDT".to_string(),
            qty: dec!(-2),
            exec_price: dec!(110),
            fee: dec!(0.22),
            kind: EventKind::Close,
            meta: meta(),
        };
        assert_eq!(fill.cash_delta(), dec!(219.78));

        fill.kind = EventKind::Funding;
        fill.qty = Decimal::ZERO;
        fill.fee = dec!(1.5);
        assert_eq!(fill.cash_delta(), dec!(-1.5));
    }
}
