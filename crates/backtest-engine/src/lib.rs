//! Two-phase event-driven backtesting engine.
//!
//! Phase one asks the strategy for a decision on every bar of every symbol
//! in parallel and turns actionable decisions into immutable
//! [`TradeProposal`]s. Phase two merges them into one [`Timeline`] and
//! replays them on a single thread through the [`PortfolioManager`], which
//! admits proposals, steps their event cursors along the global clock and
//! books every event in the transaction ledger.
//!
//! [`Sandbox::run`] wraps both phases behind a pure function of the run
//! configuration and the prefetched candles.

mod builder;
mod crossing;
mod cursor;
mod exit;
mod generator;
mod perp;
mod portfolio;
mod proposal;
mod report;
mod sandbox;
mod statistics;
mod timeline;

pub use builder::TradeProposalBuilder;
pub use crossing::{proposal_seed, CrossingResolver};
pub use cursor::EventCursor;
pub use exit::{CustomExit, ExitContext, ExitPlan, ExitResolver, TrailingStop};
pub use generator::{generate_parallel, work_units, GeneratorSettings, MarketData, ProposalGenerator};
pub use perp::PerpetualMargin;
pub use portfolio::{PortfolioManager, PortfolioSettings};
pub use proposal::{CandlePath, TradeProposal};
pub use report::{EquityPoint, RejectedProposal, RunReport, TradeLogEntry};
pub use sandbox::{run, run_embedded, RunOutcome, Sandbox};
pub use statistics::{RunStatistics, Summary, SymbolStats};
pub use timeline::{Timeline, TimelineKey};
