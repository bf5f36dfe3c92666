//! Slippage models.

use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Adverse price move applied to every fill, as a fraction of price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlippageModel {
    #[default]
    Zero,
    Fixed {
        #[serde(alias = "pct")]
        rate: Decimal,
    },
    /// Uniform in `[0, max]`, drawn from the ledger's seeded generator
    Random { max: Decimal },
}

impl SlippageModel {
    /// Random slippage up to 0.1%.
    pub fn standard_random() -> Self {
        SlippageModel::Random { max: dec!(0.001) }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlippageModel::Zero => "zero",
            SlippageModel::Fixed { .. } => "fixed",
            SlippageModel::Random { .. } => "random",
        }
    }

    /// Upper bound of any sample.
    pub fn max_slippage(&self) -> Decimal {
        match self {
            SlippageModel::Zero => Decimal::ZERO,
            SlippageModel::Fixed { rate } => *rate,
            SlippageModel::Random { max } => *max,
        }
    }

    /// Draw the slippage for one fill.
    pub fn sample(&self, rng: &mut StdRng) -> Decimal {
        match self {
            SlippageModel::Zero => Decimal::ZERO,
            SlippageModel::Fixed { rate } => *rate,
            SlippageModel::Random { max } => {
                let unit: f64 = rng.gen_range(0.0..1.0);
                let draw = Decimal::try_from(unit).unwrap_or(Decimal::ZERO);
                (*max * draw).round_dp(12)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_is_bounded_and_seeded() {
        let model = SlippageModel::standard_random();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let x = model.sample(&mut a);
            assert!(x >= Decimal::ZERO && x <= dec!(0.001));
            assert_eq!(x, model.sample(&mut b));
        }
    }

    #[test]
    fn test_fixed_accepts_pct_alias() {
        let model: SlippageModel = serde_json::from_str(r#"{"type": "fixed", "pct": 0.002}"#).unwrap();
        assert_eq!(model.max_slippage(), dec!(0.002));
        assert_eq!(model.sample(&mut StdRng::seed_from_u64(0)), dec!(0.002));
    }
}
