//! Admission inputs and outcome.

use std::collections::BTreeSet;
use std::fmt;

use backtest_core::error::EngineError;
use backtest_core::types::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a proposal asks the portfolio for.
#[derive(Debug, Clone)]
pub struct AdmissionRequest<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    /// Reference entry price
    pub entry_price: Decimal,
    pub stop_price: Option<Decimal>,
    /// Number of entry legs
    pub legs: usize,
    pub atr: Option<f64>,
    /// Externally supplied size, if the decision carried one
    pub decision_size: Option<Decimal>,
}

/// Read-only view of the portfolio at admission time.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot<'a> {
    pub cash: Decimal,
    /// Cash held back for admitted legs that have not filled yet
    pub reserved_cash: Decimal,
    pub equity: Decimal,
    pub peak_equity: Decimal,
    /// Entry legs of admitted trades that have not terminated
    pub active_legs: usize,
    /// Admitted trades that have not terminated
    pub active_trades: usize,
    /// Symbols with an open position or an admitted trade
    pub exposed_symbols: &'a BTreeSet<String>,
}

impl PortfolioSnapshot<'_> {
    /// Cash not yet committed to admitted legs.
    pub fn available_cash(&self) -> Decimal {
        (self.cash - self.reserved_cash).max(Decimal::ZERO)
    }

    /// Current drawdown from the equity peak as a fraction.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity > Decimal::ZERO && self.equity < self.peak_equity {
            (self.peak_equity - self.equity) / self.peak_equity
        } else {
            Decimal::ZERO
        }
    }
}

/// Stage of `try_execute` that produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStage {
    Capacity,
    Sizing,
    Cash,
    Risk,
}

impl fmt::Display for AdmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionStage::Capacity => write!(f, "capacity"),
            AdmissionStage::Sizing => write!(f, "sizing"),
            AdmissionStage::Cash => write!(f, "cash"),
            AdmissionStage::Risk => write!(f, "risk"),
        }
    }
}

/// Outcome of admitting a proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Admitted with the sized quantity
    Accepted { qty: Decimal },
    /// Rejected with reason
    Rejected { stage: AdmissionStage, reason: String },
}

impl Admission {
    pub fn rejected(stage: AdmissionStage, reason: impl Into<String>) -> Self {
        Admission::Rejected {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }

    /// The rejection as an error value, for logging.
    pub fn to_error(&self) -> Option<EngineError> {
        match self {
            Admission::Accepted { .. } => None,
            Admission::Rejected { stage, reason } => Some(EngineError::AdmissionRejected {
                reason: format!("{}: {}", stage, reason),
            }),
        }
    }
}
