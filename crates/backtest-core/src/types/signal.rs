//! Strategy decisions.

use serde::{Deserialize, Serialize};

use super::Direction;
use crate::error::EngineError;

/// Signal emitted by a strategy for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    #[serde(alias = "NONE", alias = "HOLD")]
    No,
}

/// Output of `Strategy::decide`.
///
/// Field names match the JSON payload dynamic strategies return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Decision {
    pub signal: Signal,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub tp_price: Option<f64>,
    #[serde(default)]
    pub sl_price: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Externally supplied size in units, used by the `external` sizing model
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl Decision {
    /// No trade on this bar.
    pub fn no() -> Self {
        Self::default()
    }

    /// Enter long at `entry_price`.
    pub fn buy(entry_price: f64) -> Self {
        Self {
            signal: Signal::Buy,
            entry_price: Some(entry_price),
            ..Default::default()
        }
    }

    /// Enter short at `entry_price`.
    pub fn sell(entry_price: f64) -> Self {
        Self {
            signal: Signal::Sell,
            entry_price: Some(entry_price),
            ..Default::default()
        }
    }

    /// Attach take-profit and stop-loss levels.
    pub fn with_bracket(mut self, tp_price: f64, sl_price: f64) -> Self {
        self.tp_price = Some(tp_price);
        self.sl_price = Some(sl_price);
        self
    }

    /// Attach a confidence score.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach strategy-specific metadata.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// Direction implied by the signal, `None` for NO.
    pub fn direction(&self) -> Option<Direction> {
        match self.signal {
            Signal::Buy => Some(Direction::Long),
            Signal::Sell => Some(Direction::Short),
            Signal::No => None,
        }
    }

    /// Entry reference price, or `close` when the decision leaves it out.
    pub fn entry_or(&self, close: f64) -> f64 {
        self.entry_price.unwrap_or(close)
    }

    /// Check an actionable decision for a usable payload.
    ///
    /// A missing entry price is allowed; brackets are then checked against
    /// the bar close once the proposal is built.
    pub fn validate(&self) -> Result<(), EngineError> {
        let Some(direction) = self.direction() else {
            return Ok(());
        };

        let entry = match self.entry_price {
            None => None,
            Some(p) if p.is_finite() && p > 0.0 => Some(p),
            Some(p) => {
                return Err(EngineError::ProposalInvalid(format!(
                    "entry price must be positive and finite, got {}",
                    p
                )))
            }
        };

        let sign = direction.sign_f64();
        if let Some(tp) = self.tp_price {
            let wrong_side = entry.is_some_and(|entry| (tp - entry) * sign <= 0.0);
            if !tp.is_finite() || tp <= 0.0 || wrong_side {
                return Err(EngineError::ProposalInvalid(format!(
                    "take-profit {} is not beyond entry {:?} for {}",
                    tp, entry, direction
                )));
            }
        }
        if let Some(sl) = self.sl_price {
            let wrong_side = entry.is_some_and(|entry| (entry - sl) * sign <= 0.0);
            if !sl.is_finite() || sl <= 0.0 || wrong_side {
                return Err(EngineError::ProposalInvalid(format!(
                    "stop-loss {} is not behind entry {:?} for {}",
                    sl, entry, direction
                )));
            }
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(EngineError::ProposalInvalid(format!(
                    "confidence {} outside [0, 1]",
                    confidence
                )));
            }
        }
        if let Some(size) = self.size {
            if !size.is_finite() || size <= 0.0 {
                return Err(EngineError::ProposalInvalid(format!(
                    "size must be positive, got {}",
                    size
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signal_is_valid() {
        let decision = Decision::no();
        assert_eq!(decision.direction(), None);
        assert!(decision.validate().is_ok());
    }

    #[test]
    fn test_long_bracket_validation() {
        assert!(Decision::buy(100.0).with_bracket(110.0, 95.0).validate().is_ok());
        assert!(Decision::buy(100.0).with_bracket(90.0, 95.0).validate().is_err());
        assert!(Decision::buy(100.0).with_bracket(110.0, 105.0).validate().is_err());
    }

    #[test]
    fn test_short_bracket_validation() {
        assert!(Decision::sell(100.0).with_bracket(90.0, 105.0).validate().is_ok());
        assert!(Decision::sell(100.0).with_bracket(110.0, 105.0).validate().is_err());
    }

    #[test]
    fn test_invalid_entry() {
        let mut decision = Decision::buy(f64::NAN);
        assert!(decision.validate().is_err());

        decision.entry_price = Some(-1.0);
        assert!(decision.validate().is_err());
    }

    #[test]
    fn test_missing_entry_uses_close() {
        let mut decision = Decision::buy(100.0).with_bracket(110.0, 95.0);
        decision.entry_price = None;
        assert!(decision.validate().is_ok());
        assert_eq!(decision.entry_or(98.0), 98.0);

        decision.sl_price = Some(f64::INFINITY);
        assert!(decision.validate().is_err());
    }

    #[test]
    fn test_payload_parsing() {
        let payload = serde_json::json!({
            "signal": "BUY",
            "entry_price": 100.0,
            "tp_price": 110.0,
            "sl_price": 95.0,
            "confidence": null,
            "meta": {"ema_period": 15}
        });
        let decision: Decision = serde_json::from_value(payload).unwrap();
        assert_eq!(decision.signal, Signal::Buy);
        assert_eq!(decision.confidence, None);
        assert_eq!(decision.meta["ema_period"], 15);

        let payload = serde_json::json!({"signal": "HOLD"});
        let decision: Decision = serde_json::from_value(payload).unwrap();
        assert_eq!(decision.signal, Signal::No);
    }
}
