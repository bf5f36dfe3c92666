//! Trade direction, order sides and entry legs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Side that opens a position in this direction.
    pub fn entry_side(&self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Side that closes a position in this direction.
    pub fn exit_side(&self) -> Side {
        self.entry_side().opposite()
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> Decimal {
        self.entry_side().sign()
    }

    /// +1.0 for long, -1.0 for short.
    pub fn sign_f64(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Get the sign for position calculations (+1 for buy, -1 for sell).
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Time in force for entry legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    /// Good til canceled: waits until triggered or the trade exits
    #[default]
    #[serde(rename = "gtc")]
    GTC,
    /// Immediate or cancel: only valid on the first tradable candle
    #[serde(rename = "ioc")]
    IOC,
    /// Fill or kill: only valid on the first tradable candle
    #[serde(rename = "fok")]
    FOK,
}

impl TimeInForce {
    /// Whether the leg expires after the first tradable candle.
    pub fn expires_after_first_candle(&self) -> bool {
        matches!(self, TimeInForce::IOC | TimeInForce::FOK)
    }
}

/// Price a leg fills at once triggered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum LegPrice {
    /// The proposal's entry reference, improved by the candle open
    Market,
    /// A fixed level
    Limit { price: f64 },
    /// A percentage beyond the first filled entry (DCA add)
    OffsetFromFill { pct: f64 },
}

/// Condition that releases a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegTrigger {
    /// Fills on the first tradable candle
    Immediate,
    /// Fills once a candle's low reaches the leg price
    AtOrBelow,
    /// Fills once a candle's high reaches the leg price
    AtOrAbove,
}

/// One tranche of a trade's entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    /// Quantity in units of the unsized proposal (always positive)
    pub qty: Decimal,
    /// Buy or sell
    pub side: Side,
    /// Fill price or resolver
    pub price: LegPrice,
    /// Trigger condition
    pub trigger: LegTrigger,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Free-form label carried into event meta ("INIT", "SCALE_2", "DCA")
    pub comment: String,
}

impl OrderLeg {
    /// The leg that fills on the first tradable candle.
    pub fn immediate(side: Side, qty: Decimal, comment: impl Into<String>) -> Self {
        Self {
            qty,
            side,
            price: LegPrice::Market,
            trigger: LegTrigger::Immediate,
            time_in_force: TimeInForce::GTC,
            comment: comment.into(),
        }
    }

    /// A resting leg that fills once price trades through `price`.
    pub fn resting(side: Side, qty: Decimal, price: LegPrice, comment: impl Into<String>) -> Self {
        let trigger = match side {
            Side::Buy => LegTrigger::AtOrBelow,
            Side::Sell => LegTrigger::AtOrAbove,
        };
        Self {
            qty,
            side,
            price,
            trigger,
            time_in_force: TimeInForce::GTC,
            comment: comment.into(),
        }
    }

    /// Set the time in force.
    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    /// Signed quantity (+ for buys).
    pub fn signed_qty(&self) -> Decimal {
        self.side.sign() * self.qty
    }

    /// Check if the leg fills on the first tradable candle.
    pub fn is_immediate(&self) -> bool {
        self.trigger == LegTrigger::Immediate
    }
}
