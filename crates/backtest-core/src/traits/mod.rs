//! Core traits for the backtesting engine.

mod data_provider;
mod indicator;
mod strategy;

pub use data_provider::{DataProvider, FetchRange};
pub use indicator::Indicator;
pub use strategy::{DecisionContext, Strategy, StrategyConfig};
