//! Technical indicators.
//!
//! This crate provides the indicators used by the built-in strategies and by
//! volatility-scaled sizing:
//! - Moving averages (SMA, EMA, bar-aligned EMA)
//! - Momentum indicators (RSI, rate of change)
//! - Volatility indicators (ATR)

pub mod momentum;
pub mod moving_average;
pub mod volatility;

pub use momentum::{RateOfChange, Rsi};
pub use moving_average::{Ema, Sma};
pub use volatility::Atr;
