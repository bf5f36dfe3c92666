//! Position sizing models.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{AdmissionRequest, PortfolioSnapshot};

/// Decimal places kept on sized quantities.
const QTY_DP: u32 = 8;

/// Position sizing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingModel {
    /// Fixed fraction of available cash per trade
    FixedFraction { fraction: Decimal },
    /// Risk a fraction of equity against `atr_multiple` x ATR
    VolatilityScaled {
        risk_fraction: Decimal,
        atr_multiple: Decimal,
    },
    /// Use the size supplied by the decision
    External,
}

impl Default for SizingModel {
    fn default() -> Self {
        SizingModel::FixedFraction {
            fraction: dec!(0.5),
        }
    }
}

impl SizingModel {
    pub fn name(&self) -> &'static str {
        match self {
            SizingModel::FixedFraction { .. } => "fixed_fraction",
            SizingModel::VolatilityScaled { .. } => "volatility_scaled",
            SizingModel::External => "external",
        }
    }

    /// Calculate the proposal quantity.
    ///
    /// Returns `None` when the model has nothing to size from or the result
    /// is not positive.
    pub fn quantity(
        &self,
        request: &AdmissionRequest<'_>,
        portfolio: &PortfolioSnapshot<'_>,
    ) -> Option<Decimal> {
        if request.entry_price <= Decimal::ZERO {
            return None;
        }

        let qty = match self {
            SizingModel::FixedFraction { fraction } => {
                portfolio.available_cash() * *fraction / request.entry_price
            }
            SizingModel::VolatilityScaled {
                risk_fraction,
                atr_multiple,
            } => {
                let atr = Decimal::try_from(request.atr?).unwrap_or(Decimal::ZERO);
                let risk_per_unit = atr * *atr_multiple;
                if risk_per_unit <= Decimal::ZERO {
                    return None;
                }
                portfolio.equity * *risk_fraction / risk_per_unit
            }
            SizingModel::External => request.decision_size?,
        };

        let qty = qty.round_dp_with_strategy(QTY_DP, RoundingStrategy::ToZero);
        (qty > Decimal::ZERO).then_some(qty)
    }
}
