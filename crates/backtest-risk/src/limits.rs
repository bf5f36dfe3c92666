//! Portfolio risk limits and the cash requirement.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AdmissionRequest, PortfolioSnapshot};

/// Result of a limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    /// Trade allowed
    Allowed,
    /// Trade blocked with reason
    Blocked { reason: String },
}

impl LimitCheck {
    pub fn blocked(reason: impl Into<String>) -> Self {
        LimitCheck::Blocked {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitCheck::Allowed)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LimitCheck::Blocked { .. })
    }
}

/// Worst-case cash needed to fill `notional`.
///
/// Covers the maximum slippage and fee on top of the notional; leverage
/// divides the result.
pub fn cash_required(
    notional: Decimal,
    max_slippage: Decimal,
    fee_rate: Decimal,
    leverage: Decimal,
) -> Decimal {
    let gross = notional.abs() * (Decimal::ONE + max_slippage) * (Decimal::ONE + fee_rate);
    if leverage > Decimal::ONE {
        gross / leverage
    } else {
        gross
    }
}

/// Portfolio-level limits configuration. Unset limits are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum loss at the stop as a fraction of equity
    pub max_risk_per_trade: Option<Decimal>,
    /// Drawdown fraction at which new trades stop
    pub max_drawdown_halt: Option<Decimal>,
    /// Maximum entry notional as a fraction of equity
    pub max_position_fraction: Option<Decimal>,
}

impl RiskLimits {
    /// Check a sized proposal against the limits.
    pub fn check(
        &self,
        request: &AdmissionRequest<'_>,
        qty: Decimal,
        portfolio: &PortfolioSnapshot<'_>,
    ) -> LimitCheck {
        if let Some(halt) = self.max_drawdown_halt {
            let drawdown = portfolio.drawdown();
            if drawdown >= halt {
                return LimitCheck::blocked(format!(
                    "Max drawdown exceeded: {:.4} (limit: {:.4})",
                    drawdown, halt
                ));
            }
        }

        if let (Some(max_risk), Some(stop)) = (self.max_risk_per_trade, request.stop_price) {
            let risk = (request.entry_price - stop).abs() * qty;
            let budget = portfolio.equity * max_risk;
            if risk > budget {
                return LimitCheck::blocked(format!(
                    "Trade risk {:.2} exceeds budget {:.2}",
                    risk, budget
                ));
            }
        }

        if let Some(max_fraction) = self.max_position_fraction {
            let notional = request.entry_price * qty;
            let cap = portfolio.equity * max_fraction;
            if notional > cap {
                return LimitCheck::blocked(format!(
                    "Position notional {:.2} exceeds cap {:.2}",
                    notional, cap
                ));
            }
        }

        LimitCheck::Allowed
    }
}
