//! Logging setup and run reporting for the command-line front end.

mod logging;
mod progress;

pub use logging::{setup_logging, LogGuard};
pub use progress::log_report;
