//! Historical data provider interface.
//!
//! Providers are used by the host before a run starts; nothing inside the
//! engine calls them.

use crate::error::DataError;
use crate::types::{Candle, Interval};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Inclusive time range of a fetch. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl FetchRange {
    /// Unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// Check if a unix-millisecond timestamp lies in the range.
    pub fn contains(&self, ts: i64) -> bool {
        let after_start = self.start.map_or(true, |s| ts >= s.timestamp_millis());
        let before_end = self.end.map_or(true, |e| ts <= e.timestamp_millis());
        after_start && before_end
    }
}

/// Trait for historical OHLCV providers.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch candles for a symbol, ordered from oldest to newest.
    async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        range: FetchRange,
    ) -> Result<Vec<Candle>, DataError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl DataProvider for FixedProvider {
        async fn fetch(
            &self,
            _symbol: &str,
            _interval: Interval,
            range: FetchRange,
        ) -> Result<Vec<Candle>, DataError> {
            Ok(self
                .candles
                .iter()
                .filter(|c| range.contains(c.ts))
                .copied()
                .collect())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_range_contains() {
        let range = FetchRange {
            start: DateTime::from_timestamp_millis(1_000),
            end: DateTime::from_timestamp_millis(2_000),
        };
        assert!(!range.contains(999));
        assert!(range.contains(1_000));
        assert!(range.contains(2_000));
        assert!(!range.contains(2_001));
        assert!(FetchRange::all().contains(i64::MIN));
    }

    #[tokio::test]
    async fn test_provider_filters_range() {
        let provider = FixedProvider {
            candles: (0..5)
                .map(|i| Candle::new(i * 1_000, 1.0, 1.0, 1.0, 1.0, 1.0))
                .collect(),
        };
        let range = FetchRange {
            start: DateTime::from_timestamp_millis(1_000),
            end: DateTime::from_timestamp_millis(3_000),
        };

        let candles = provider.fetch("X", Interval::Daily, range).await.unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(provider.name(), "fixed");
    }
}
