//! Ensemble Strategy.
//!
//! Runs every member on the same window and takes the first BUY, in member
//! order. SELL signals from members are not acted on. Weights are normalized
//! to sum to one and kept for reporting.

use backtest_core::{
    error::StrategyError,
    traits::{DecisionContext, Strategy, StrategyConfig},
    types::{CandleWindow, Decision, Interval, Signal},
};
use serde::{Deserialize, Serialize};

use crate::StrategyHandle;

fn default_weight() -> f64 {
    1.0
}

/// One member of an ensemble configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleMember {
    /// Built-in strategy token
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Member parameters, `null` for defaults
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Configuration for the Ensemble strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub strategies: Vec<EnsembleMember>,
}

impl StrategyConfig for EnsembleConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.strategies.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "Ensemble strategy requires a 'strategies' list".into(),
            ));
        }
        if let Some(member) = self
            .strategies
            .iter()
            .find(|m| !m.weight.is_finite() || m.weight < 0.0)
        {
            return Err(StrategyError::InvalidConfig(format!(
                "Weight of '{}' must be a non-negative number, got {}",
                member.name, member.weight
            )));
        }
        if self.strategies.iter().map(|m| m.weight).sum::<f64>() <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Ensemble weights must not all be zero".into(),
            ));
        }
        Ok(())
    }
}

/// First-BUY-wins combination of resolved strategies.
#[derive(Debug, Clone)]
pub struct EnsembleStrategy {
    members: Vec<StrategyHandle>,
    weights: Vec<f64>,
}

impl EnsembleStrategy {
    /// Combine `(strategy, weight)` pairs. Weights are normalized by their sum.
    pub fn new(members: Vec<(StrategyHandle, f64)>) -> Self {
        let total: f64 = members.iter().map(|(_, w)| w).sum();
        let (members, weights) = members
            .into_iter()
            .map(|(s, w)| (s, if total > 0.0 { w / total } else { w }))
            .unzip();
        Self { members, weights }
    }

    pub fn members(&self) -> &[StrategyHandle] {
        &self.members
    }

    /// Normalized member weights, in member order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Strategy for EnsembleStrategy {
    fn name(&self) -> &str {
        "ensemble"
    }

    fn description(&self) -> &str {
        "Ensemble of multiple strategies, first BUY wins"
    }

    fn decide(
        &self,
        window: &CandleWindow<'_>,
        interval: Interval,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision, StrategyError> {
        for member in &self.members {
            let decision = member.decide(window, interval, ctx)?;
            if decision.signal == Signal::Buy {
                return Ok(decision);
            }
        }
        Ok(Decision::no())
    }

    fn required_lookback(&self) -> usize {
        self.members
            .iter()
            .map(Strategy::required_lookback)
            .max()
            .unwrap_or(1)
    }
}
