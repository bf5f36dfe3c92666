//! Fee models.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fee charged as a fraction of fill notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeModel {
    /// Same rate for every symbol
    Static { rate: Decimal },
    /// Rate per symbol with a fallback
    PerSymbol {
        rates: BTreeMap<String, Decimal>,
        default: Decimal,
    },
}

impl Default for FeeModel {
    fn default() -> Self {
        FeeModel::Static { rate: dec!(0.001) }
    }
}

impl FeeModel {
    /// Per-symbol table with the exchange's standard tiers.
    pub fn standard_per_symbol() -> Self {
        FeeModel::PerSymbol {
            rates: [
                ("BTCUSDT".to_string(), dec!(0.0005)),
                ("ETHUSDT".to_string(), dec!(0.001)),
                ("XRPUSDT".to_string(), dec!(0.0015)),
            ]
            .into(),
            default: dec!(0.001),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeeModel::Static { .. } => "static",
            FeeModel::PerSymbol { .. } => "per_symbol",
        }
    }

    /// Fee rate for a symbol.
    pub fn rate(&self, symbol: &str) -> Decimal {
        match self {
            FeeModel::Static { rate } => *rate,
            FeeModel::PerSymbol { rates, default } => rates.get(symbol).copied().unwrap_or(*default),
        }
    }
}
