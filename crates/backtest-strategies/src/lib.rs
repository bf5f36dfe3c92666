//! Strategy implementations.
//!
//! This crate provides the built-in strategies and the handle type the
//! engine calls through:
//! - Peak EMA Reversal (default)
//! - Moving Average Crossover
//! - Momentum with RSI confirmation
//! - Ensemble of the above, first BUY wins
//! - Dynamic strategies registered by the host

mod ensemble;
mod handle;
mod ma_crossover;
mod momentum;
mod peak_ema_reversal;
mod registry;

pub use ensemble::{EnsembleConfig, EnsembleMember, EnsembleStrategy};
pub use handle::{DynamicStrategy, PayloadStrategy, StrategyHandle};
pub use ma_crossover::{MACrossoverConfig, MACrossoverStrategy};
pub use momentum::{MomentumConfig, MomentumStrategy};
pub use peak_ema_reversal::{PeakEmaReversalConfig, PeakEmaReversalStrategy};
pub use registry::{DynamicFactory, StrategyInfo, StrategyRegistry};
