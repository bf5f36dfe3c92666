//! Capacity policies.

use serde::{Deserialize, Serialize};

use crate::{AdmissionRequest, LimitCheck, PortfolioSnapshot};

/// Limit on how much concurrent activity the portfolio accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Limit on entry legs of active trades, counting the new proposal
    LegCapacity { max_legs: usize },
    /// Limit on symbols with exposure, counting the new proposal's symbol
    SymbolCapacity { max_symbols: usize },
    /// Limit on concurrently active trades
    PositionCapacity { max_open_positions: usize },
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        CapacityPolicy::LegCapacity { max_legs: 5 }
    }
}

impl CapacityPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            CapacityPolicy::LegCapacity { .. } => "leg_capacity",
            CapacityPolicy::SymbolCapacity { .. } => "symbol_capacity",
            CapacityPolicy::PositionCapacity { .. } => "position_capacity",
        }
    }

    /// Check if the proposal fits.
    pub fn admit(&self, request: &AdmissionRequest<'_>, portfolio: &PortfolioSnapshot<'_>) -> LimitCheck {
        match *self {
            CapacityPolicy::LegCapacity { max_legs } => {
                let legs = portfolio.active_legs + request.legs;
                if legs > max_legs {
                    return LimitCheck::blocked(format!(
                        "Max legs reached: {} (limit: {})",
                        legs, max_legs
                    ));
                }
            }
            CapacityPolicy::SymbolCapacity { max_symbols } => {
                let symbols = portfolio.exposed_symbols.len()
                    + usize::from(!portfolio.exposed_symbols.contains(request.symbol));
                if symbols > max_symbols {
                    return LimitCheck::blocked(format!(
                        "Max symbols reached: {} (limit: {})",
                        symbols, max_symbols
                    ));
                }
            }
            CapacityPolicy::PositionCapacity { max_open_positions } => {
                if portfolio.active_trades >= max_open_positions {
                    return LimitCheck::blocked(format!(
                        "Max positions reached: {} (limit: {})",
                        portfolio.active_trades, max_open_positions
                    ));
                }
            }
        }
        LimitCheck::Allowed
    }
}
