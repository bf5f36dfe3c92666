//! Net position per symbol.

use num_traits::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Net position in a single symbol, weighted-average cost basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Symbol
    pub symbol: String,
    /// Signed quantity (positive long, negative short)
    pub qty: Decimal,
    /// Average entry price of the open quantity
    pub avg_price: Decimal,
    /// Cost basis of the open quantity (qty * avg_price)
    pub total_cost: Decimal,
    /// Realized profit/loss from reductions, before fees
    pub realized_pnl: Decimal,
}

impl Position {
    /// Create a flat position.
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            qty: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Check if this is a long position.
    pub fn is_long(&self) -> bool {
        self.qty > Decimal::ZERO
    }

    /// Check if this is a short position.
    pub fn is_short(&self) -> bool {
        self.qty < Decimal::ZERO
    }

    /// Check if the position is flat.
    pub fn is_flat(&self) -> bool {
        self.qty == Decimal::ZERO
    }

    /// Value of the open quantity at `mark`.
    pub fn market_value(&self, mark: Decimal) -> Decimal {
        self.qty * mark
    }

    /// Unrealized profit/loss at `mark`.
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        self.qty * mark - self.total_cost
    }

    /// Apply a signed fill.
    /// Returns the realized P&L if the position is being reduced.
    pub fn apply(&mut self, fill_qty: Decimal, price: Decimal) -> Decimal {
        let mut realized = Decimal::ZERO;

        let same_direction = (self.qty > Decimal::ZERO && fill_qty > Decimal::ZERO)
            || (self.qty < Decimal::ZERO && fill_qty < Decimal::ZERO);

        if same_direction || self.qty == Decimal::ZERO {
            let total_cost = self.qty * self.avg_price + fill_qty * price;
            let new_qty = self.qty + fill_qty;

            if new_qty != Decimal::ZERO {
                self.avg_price = total_cost / new_qty;
            }
            self.qty = new_qty;
        } else {
            let close_qty = fill_qty.abs().min(self.qty.abs());

            realized = if self.qty > Decimal::ZERO {
                close_qty * (price - self.avg_price)
            } else {
                close_qty * (self.avg_price - price)
            };
            self.realized_pnl += realized;

            let remaining = fill_qty.abs() - close_qty;
            if remaining > Decimal::ZERO {
                // Flipped through zero: the remainder opens at this price
                self.qty = fill_qty.signum() * remaining;
                self.avg_price = price;
            } else {
                self.qty += fill_qty;
                if self.qty == Decimal::ZERO {
                    self.avg_price = Decimal::ZERO;
                }
            }
        }

        self.total_cost = self.qty * self.avg_price;
        realized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_increase_averages_price() {
        let mut position = Position::flat("BTCUSDT");

        let realized = position.apply(dec!(100), dec!(150));
        assert_eq!(realized, Decimal::ZERO);

        position.apply(dec!(100), dec!(160));
        assert_eq!(position.qty, dec!(200));
        assert_eq!(position.avg_price, dec!(155));
        assert_eq!(position.total_cost, dec!(31000));
    }

    #[test]
    fn test_apply_close_realizes() {
        let mut position = Position::flat("BTCUSDT");
        position.apply(dec!(100), dec!(150));

        let realized = position.apply(dec!(-100), dec!(160));
        assert_eq!(realized, dec!(1000));
        assert!(position.is_flat());
        assert_eq!(position.total_cost, Decimal::ZERO);
    }

    #[test]
    fn test_apply_short_partial_cover() {
        let mut position = Position::flat("ETHUSDT");
        position.apply(dec!(-10), dec!(200));
        assert!(position.is_short());

        let realized = position.apply(dec!(4), dec!(180));
        assert_eq!(realized, dec!(80));
        assert_eq!(position.qty, dec!(-6));
        assert_eq!(position.avg_price, dec!(200));
    }

    #[test]
    fn test_apply_flip() {
        let mut position = Position::flat("ETHUSDT");
        position.apply(dec!(5), dec!(100));

        let realized = position.apply(dec!(-8), dec!(110));
        assert_eq!(realized, dec!(50));
        assert_eq!(position.qty, dec!(-3));
        assert_eq!(position.avg_price, dec!(110));
    }

    #[test]
    fn test_mark_to_market() {
        let mut position = Position::flat("BTCUSDT");
        position.apply(dec!(2), dec!(100));

        assert_eq!(position.market_value(dec!(120)), dec!(240));
        assert_eq!(position.unrealized_pnl(dec!(120)), dec!(40));
    }

    proptest::proptest! {
        #[test]
        fn prop_qty_is_sum_of_fills(fills in proptest::collection::vec((-50i64..50, 1i64..500), 1..20)) {
            let mut position = Position::flat("BTCUSDT");
            let mut expected = Decimal::ZERO;
            for (qty, price) in fills {
                position.apply(Decimal::from(qty), Decimal::from(price));
                expected += Decimal::from(qty);
            }
            proptest::prop_assert_eq!(position.qty, expected);
            if position.is_flat() {
                proptest::prop_assert_eq!(position.total_cost, Decimal::ZERO);
            }
        }
    }
}
