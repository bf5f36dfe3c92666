//! Transaction ledger.
//!
//! Converts trade events into fills exactly once, applying the configured
//! fill policy, fee model and slippage model, and keeps positions and the
//! realised cash log.

mod fees;
mod fill_policy;
mod ledger;
mod slippage;

pub use fees::FeeModel;
pub use fill_policy::FillPolicy;
pub use ledger::TransactionLedger;
pub use slippage::SlippageModel;
