//! OHLCV candles and the bounded look-back window handed to strategies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV candle.
/// Uses f64 for fast indicator calculations; accounting converts to Decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, unix milliseconds
    #[serde(alias = "open_time", alias = "timestamp")]
    pub ts: i64,
    /// Opening price
    #[serde(alias = "o")]
    pub open: f64,
    /// Highest price
    #[serde(alias = "h")]
    pub high: f64,
    /// Lowest price
    #[serde(alias = "l")]
    pub low: f64,
    /// Closing price
    #[serde(alias = "c")]
    pub close: f64,
    /// Traded volume
    #[serde(alias = "v", default)]
    pub volume: f64,
}

impl Candle {
    /// Create a new candle.
    pub fn new(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Calculate the bar's range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check if the candle is bullish (close > open).
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if the candle is bearish (close < open).
    #[inline]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Get the open time as a DateTime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }

    /// True range against the previous close (used for ATR).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => {
                let hl = self.high - self.low;
                let hc = (self.high - pc).abs();
                let lc = (self.low - pc).abs();
                hl.max(hc).max(lc)
            }
            None => self.high - self.low,
        }
    }

    /// A candle is usable when every price is finite and positive and the
    /// high/low envelope contains open and close.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// Read-only look-back window ending at the bar being decided on.
///
/// The generator builds it by slicing the candle series up to and including
/// the current index, so rows after the current bar are not reachable
/// through this type at all.
#[derive(Debug, Clone, Copy)]
pub struct CandleWindow<'a> {
    symbol: &'a str,
    rows: &'a [Candle],
}

impl<'a> CandleWindow<'a> {
    /// Wrap a slice whose last element is the current bar.
    pub fn new(symbol: &'a str, rows: &'a [Candle]) -> Self {
        Self { symbol, rows }
    }

    /// Symbol the window belongs to.
    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    /// Number of rows in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the window is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The current (most recent) bar.
    pub fn current(&self) -> Option<&'a Candle> {
        self.rows.last()
    }

    /// All rows, oldest first.
    pub fn rows(&self) -> &'a [Candle] {
        self.rows
    }

    /// Get a row by index (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&'a Candle> {
        self.rows.get(index)
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> &'a [Candle] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// Extract close prices.
    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|c| c.close).collect()
    }

    /// Extract open prices.
    pub fn opens(&self) -> Vec<f64> {
        self.rows.iter().map(|c| c.open).collect()
    }

    /// Extract high prices.
    pub fn highs(&self) -> Vec<f64> {
        self.rows.iter().map(|c| c.high).collect()
    }

    /// Extract low prices.
    pub fn lows(&self) -> Vec<f64> {
        self.rows.iter().map(|c| c.low).collect()
    }
}
