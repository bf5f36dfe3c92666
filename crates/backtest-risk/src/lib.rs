//! Admission control for trade proposals.
//!
//! Provides capacity policies, position sizing, the cash requirement and
//! portfolio risk limits. The portfolio manager runs them in that order and
//! reports the outcome as an [`Admission`].

mod admission;
mod capacity;
mod limits;
mod sizing;

pub use admission::{Admission, AdmissionRequest, AdmissionStage, PortfolioSnapshot};
pub use capacity::CapacityPolicy;
pub use limits::{cash_required, LimitCheck, RiskLimits};
pub use sizing::SizingModel;
