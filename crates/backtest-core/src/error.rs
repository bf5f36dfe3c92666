//! Error types for the backtesting engine.
//!
//! Per-bar and per-proposal problems (`DataInsufficient`, `ProposalInvalid`)
//! are logged and skipped by the caller. `AdmissionRejected` describes a normal
//! admission outcome and is never returned from a run. Structural problems
//! (`ComponentLoad`, `Config`) abort before any simulation starts and
//! `ReplayInvariantViolation` aborts a run in progress.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient data for {symbol}: need {required} bars, have {available}")]
    DataInsufficient {
        symbol: String,
        required: usize,
        available: usize,
    },

    #[error("Invalid proposal: {0}")]
    ProposalInvalid(String),

    #[error("Admission rejected: {reason}")]
    AdmissionRejected { reason: String },

    #[error("Replay invariant violated: {0}")]
    ReplayInvariantViolation(String),

    #[error("Component load error: {0}")]
    ComponentLoad(#[from] ComponentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Whether the error aborts a run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::DataInsufficient { .. }
                | EngineError::ProposalInvalid(_)
                | EngineError::AdmissionRejected { .. }
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Failures resolving a pluggable component spec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Unknown {kind} component: {name}")]
    UnknownBuiltin { kind: &'static str, name: String },

    #[error("No {kind} registered for module '{module}' class '{class}'")]
    UnknownDynamic {
        kind: &'static str,
        module: String,
        class: String,
    },

    #[error("Invalid parameters for {kind} '{name}': {reason}")]
    InvalidParams {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("Unsupported {kind} spec: {spec}")]
    UnsupportedSpec { kind: &'static str, spec: String },
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Malformed decision payload: {0}")]
    MalformedPayload(String),

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Data source errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(!EngineError::ProposalInvalid("x".into()).is_fatal());
        assert!(!EngineError::AdmissionRejected { reason: "full".into() }.is_fatal());
        assert!(EngineError::ReplayInvariantViolation("close without open".into()).is_fatal());
        assert!(EngineError::Config("bad".into()).is_fatal());
    }

    #[test]
    fn test_component_error_message() {
        let err: EngineError = ComponentError::UnknownBuiltin {
            kind: "fee model",
            name: "bogus".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Component load error: Unknown fee model component: bogus"
        );
    }
}
