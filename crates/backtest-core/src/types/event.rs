//! Trade metadata and the events a proposal realizes during replay.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Direction;

/// Stable identifier of a proposal inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Kind of a trade event.
///
/// The declaration order is the replay rank used to break equal-timestamp,
/// equal-symbol ties: entries before reductions before closes, then cash-only
/// and forced events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Open,
    PartialClose,
    Close,
    Funding,
    Liquidate,
}

impl EventKind {
    /// Replay rank inside one timestamp and symbol.
    pub fn rank(&self) -> u8 {
        match self {
            EventKind::Open => 0,
            EventKind::PartialClose => 1,
            EventKind::Close => 2,
            EventKind::Funding => 3,
            EventKind::Liquidate => 4,
        }
    }

    /// Check if the event adds exposure.
    pub fn is_entry(&self) -> bool {
        matches!(self, EventKind::Open)
    }

    /// Check if the event removes exposure.
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            EventKind::PartialClose | EventKind::Close | EventKind::Liquidate
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Open => "OPEN",
            EventKind::PartialClose => "PARTIAL_CLOSE",
            EventKind::Close => "CLOSE",
            EventKind::Funding => "FUNDING",
            EventKind::Liquidate => "LIQUIDATE",
        };
        write!(f, "{}", s)
    }
}

/// Why a trade (or part of it) was closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "PARTIAL_TP")]
    PartialTakeProfit,
    #[serde(rename = "TIME")]
    TimeExit,
    #[serde(rename = "CUSTOM")]
    Custom(String),
    #[serde(rename = "END_OF_DATA")]
    EndOfData,
    #[serde(rename = "LIQUIDATION")]
    Liquidation,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "TP"),
            ExitReason::StopLoss => write!(f, "SL"),
            ExitReason::PartialTakeProfit => write!(f, "PARTIAL_TP"),
            ExitReason::TimeExit => write!(f, "TIME"),
            ExitReason::Custom(label) => write!(f, "CUSTOM:{}", label),
            ExitReason::EndOfData => write!(f, "END_OF_DATA"),
            ExitReason::Liquidation => write!(f, "LIQUIDATION"),
        }
    }
}

/// Immutable per-trade metadata fixed when the proposal is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMeta {
    /// Symbol
    pub symbol: String,
    /// Long or short
    pub direction: Direction,
    /// Open time of the bar the decision was taken on
    pub decision_time: i64,
    /// Earliest time the first leg can fill
    pub entry_time: i64,
    /// Entry reference price from the decision
    pub entry_price: f64,
    /// Take-profit level
    pub tp_price: Option<f64>,
    /// Stop-loss level
    pub sl_price: Option<f64>,
    /// Total unsized quantity across legs
    pub size: Decimal,
    /// ATR of the decision window, when computed
    pub atr: Option<f64>,
    /// Strategy confidence in [0, 1]
    pub confidence: f64,
    /// Name of the strategy that produced the proposal
    pub strategy: String,
}

/// Extra data carried by every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Owning proposal
    pub proposal_id: ProposalId,
    /// Symbol
    pub symbol: String,
    /// Position of the event in its proposal's event list
    pub ordinal: u32,
    /// Entry leg label for OPEN events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leg: Option<String>,
    /// Exit reason for reducing events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitReason>,
}

/// One realized event of a trade, before costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Event time, unix milliseconds
    pub ts: i64,
    /// Raw price (fill policy and cost model are applied by the ledger)
    pub price: Decimal,
    /// Signed quantity (+ buys, - sells); zero for funding
    pub qty: Decimal,
    /// Event kind
    pub kind: EventKind,
    /// Metadata
    pub meta: EventMeta,
}

impl TradeEvent {
    /// Symbol of the event.
    pub fn symbol(&self) -> &str {
        &self.meta.symbol
    }

    /// Check if the event adds exposure.
    pub fn is_entry(&self) -> bool {
        self.kind.is_entry()
    }
}
