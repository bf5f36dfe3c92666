//! Core data types for the backtesting engine.

mod candle;
mod event;
mod fill;
mod interval;
mod order;
mod position;
mod prefetched;
mod signal;

pub use candle::{Candle, CandleWindow};
pub use event::{EventKind, EventMeta, ExitReason, ProposalId, TradeEvent, TradeMeta};
pub use fill::FillRecord;
pub use interval::Interval;
pub use order::{Direction, LegPrice, LegTrigger, OrderLeg, Side, TimeInForce};
pub use position::Position;
pub use prefetched::PrefetchedOhlcv;
pub use signal::{Decision, Signal};
