//! Resolved strategy handle.

use std::fmt;
use std::sync::Arc;

use backtest_core::{
    error::StrategyError,
    traits::{DecisionContext, Strategy},
    types::{CandleWindow, Decision, Interval},
};

use crate::{EnsembleStrategy, MACrossoverStrategy, MomentumStrategy, PeakEmaReversalStrategy};

/// Strategy supplied by the host that answers with a raw JSON payload.
///
/// The payload uses the decision field names (`signal`, `entry_price`,
/// `tp_price`, `sl_price`, `confidence`, `size`, `meta`).
pub trait PayloadStrategy: Send + Sync {
    /// Produce a decision payload for the last bar of `window`.
    fn decide(
        &self,
        window: &CandleWindow<'_>,
        interval: Interval,
        ctx: &DecisionContext<'_>,
    ) -> Result<serde_json::Value, StrategyError>;

    /// Number of bars the window must hold.
    fn required_lookback(&self) -> usize;
}

/// A host-registered strategy identified by `{module, class}`.
#[derive(Clone)]
pub struct DynamicStrategy {
    name: String,
    inner: Arc<dyn PayloadStrategy>,
}

impl DynamicStrategy {
    pub fn new(module: &str, class: &str, inner: Arc<dyn PayloadStrategy>) -> Self {
        Self {
            name: format!("{}.{}", module, class),
            inner,
        }
    }
}

impl fmt::Debug for DynamicStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Strategy resolved once at configuration time.
///
/// Built-ins are a closed set; anything else goes through `Dynamic`.
#[derive(Debug, Clone)]
pub enum StrategyHandle {
    PeakEmaReversal(PeakEmaReversalStrategy),
    MaCrossover(MACrossoverStrategy),
    Momentum(MomentumStrategy),
    Ensemble(EnsembleStrategy),
    Dynamic(DynamicStrategy),
}

impl StrategyHandle {
    /// Check if the handle wraps a host-registered strategy.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, StrategyHandle::Dynamic(_))
    }
}

impl Strategy for StrategyHandle {
    fn name(&self) -> &str {
        match self {
            StrategyHandle::PeakEmaReversal(s) => s.name(),
            StrategyHandle::MaCrossover(s) => s.name(),
            StrategyHandle::Momentum(s) => s.name(),
            StrategyHandle::Ensemble(s) => s.name(),
            StrategyHandle::Dynamic(d) => &d.name,
        }
    }

    fn description(&self) -> &str {
        match self {
            StrategyHandle::PeakEmaReversal(s) => s.description(),
            StrategyHandle::MaCrossover(s) => s.description(),
            StrategyHandle::Momentum(s) => s.description(),
            StrategyHandle::Ensemble(s) => s.description(),
            StrategyHandle::Dynamic(_) => "Host-registered strategy",
        }
    }

    fn decide(
        &self,
        window: &CandleWindow<'_>,
        interval: Interval,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision, StrategyError> {
        match self {
            StrategyHandle::PeakEmaReversal(s) => s.decide(window, interval, ctx),
            StrategyHandle::MaCrossover(s) => s.decide(window, interval, ctx),
            StrategyHandle::Momentum(s) => s.decide(window, interval, ctx),
            StrategyHandle::Ensemble(s) => s.decide(window, interval, ctx),
            StrategyHandle::Dynamic(d) => {
                let payload = d.inner.decide(window, interval, ctx)?;
                serde_json::from_value(payload)
                    .map_err(|e| StrategyError::MalformedPayload(format!("{}: {}", d.name, e)))
            }
        }
    }

    fn required_lookback(&self) -> usize {
        match self {
            StrategyHandle::PeakEmaReversal(s) => s.required_lookback(),
            StrategyHandle::MaCrossover(s) => s.required_lookback(),
            StrategyHandle::Momentum(s) => s.required_lookback(),
            StrategyHandle::Ensemble(s) => s.required_lookback(),
            StrategyHandle::Dynamic(d) => d.inner.required_lookback(),
        }
    }
}
