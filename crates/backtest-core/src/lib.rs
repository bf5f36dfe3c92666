//! Core types and traits for the backtesting engine.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Candle, CandleWindow, PrefetchedOhlcv)
//! - Entry legs, trade events, fills and positions
//! - Strategy decisions
//! - Core traits for strategies, indicators and data providers
//! - The engine error taxonomy

pub mod error;
pub mod traits;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use traits::*;
pub use types::*;
