//! Fill policies.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How an event's quantity meets the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillPolicy {
    /// Whole quantity at the event price plus slippage
    #[default]
    AggressiveMarket,
    /// Quantity walks `levels` synthetic depth levels, each `level_step`
    /// further from the event price
    VwapDepth {
        levels: usize,
        #[serde(default = "default_level_step")]
        level_step: Decimal,
    },
}

fn default_level_step() -> Decimal {
    dec!(0.0005)
}

impl FillPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            FillPolicy::AggressiveMarket => "aggressive_market",
            FillPolicy::VwapDepth { .. } => "vwap_depth",
        }
    }

    /// Worst price offset the policy adds on top of slippage.
    pub fn max_offset(&self) -> Decimal {
        match self {
            FillPolicy::AggressiveMarket => Decimal::ZERO,
            FillPolicy::VwapDepth { levels, level_step } => {
                Decimal::from(levels.saturating_sub(1)) * *level_step
            }
        }
    }

    /// Execution price for a signed quantity at `price` with slippage `slip`.
    pub fn execution_price(&self, price: Decimal, qty: Decimal, slip: Decimal) -> Decimal {
        let sign = if qty >= Decimal::ZERO {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };

        match self {
            FillPolicy::AggressiveMarket => price * (Decimal::ONE + sign * slip),
            FillPolicy::VwapDepth { levels, level_step } => {
                let levels = (*levels).max(1);
                let total = qty.abs();
                if total.is_zero() {
                    return price * (Decimal::ONE + sign * slip);
                }

                let slice = (total / Decimal::from(levels))
                    .round_dp_with_strategy(8, RoundingStrategy::ToZero);
                let mut remaining = total;
                let mut cost = Decimal::ZERO;
                for level in 0..levels {
                    // Last level takes the rounding remainder
                    let take = if level + 1 == levels { remaining } else { slice.min(remaining) };
                    let offset = Decimal::from(level) * *level_step;
                    cost += take * price * (Decimal::ONE + sign * (slip + offset));
                    remaining -= take;
                }
                cost / total
            }
        }
    }
}
