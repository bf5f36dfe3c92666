//! Historical OHLCV sources for the backtest host.
//!
//! Nothing here is used inside a run: the host fetches candles through a
//! [`DataProvider`] and hands the engine a finished [`PrefetchedOhlcv`].

mod csv_source;
mod prefetch;

pub use csv_source::CsvDataSource;
pub use prefetch::prefetch;

use backtest_core::error::DataError;
use backtest_core::types::{Candle, Interval, PrefetchedOhlcv};
use backtest_core::{DataProvider, FetchRange};
use tracing::warn;

/// Load every candle of one symbol from a CSV directory.
pub async fn load_csv(dir: &str, symbol: &str, interval: Interval) -> Result<Vec<Candle>, DataError> {
    let source = CsvDataSource::new(dir)?;
    source.fetch(symbol, interval, FetchRange::all()).await
}

/// Read a prefetched JSON document from disk.
pub async fn load_prefetched(path: &str) -> Result<PrefetchedOhlcv, DataError> {
    let text = tokio::fs::read_to_string(path).await?;
    let mut data: PrefetchedOhlcv =
        serde_json::from_str(&text).map_err(|e| DataError::ParseError(e.to_string()))?;

    let dropped = data.sanitize();
    if dropped > 0 {
        warn!(path, dropped, "Dropped malformed or duplicate rows");
    }
    Ok(data)
}
