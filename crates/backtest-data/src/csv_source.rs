//! CSV data source.

use async_trait::async_trait;
use backtest_core::error::DataError;
use backtest_core::types::{Candle, Interval};
use backtest_core::{DataProvider, FetchRange};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(
        alias = "Date",
        alias = "date",
        alias = "timestamp",
        alias = "Timestamp",
        alias = "open_time",
        alias = "ts"
    )]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Directory of per-symbol CSV files.
///
/// A symbol resolves to `<dir>/<SYMBOL>_<interval>.csv`, falling back to
/// `<dir>/<SYMBOL>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    dir: PathBuf,
}

impl CsvDataSource {
    /// Create a new CSV data source.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// File holding a symbol's candles, if one exists.
    pub fn path_for(&self, symbol: &str, interval: Interval) -> Option<PathBuf> {
        [
            self.dir.join(format!("{}_{}.csv", symbol, interval)),
            self.dir.join(format!("{}.csv", symbol)),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }

    /// Parse candles from CSV text.
    fn parse(&self, text: &str) -> Result<Vec<Candle>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut candles = Vec::new();

        for result in reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;

            let ts = self.parse_timestamp(&record.date)?;

            candles.push(Candle::new(
                ts,
                record.open,
                record.high,
                record.low,
                record.close,
                record.volume,
            ));
        }

        candles.sort_by_key(|c| c.ts);

        Ok(candles)
    }

    /// Parse various timestamp formats into unix milliseconds.
    fn parse_timestamp(&self, date_str: &str) -> Result<i64, DataError> {
        let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M"];
        for format in datetime_formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
                return Ok(dt.and_utc().timestamp_millis());
            }
        }

        let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
        for format in date_formats {
            if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
                if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                    return Ok(dt.and_utc().timestamp_millis());
                }
            }
        }

        if let Ok(ts) = date_str.parse::<i64>() {
            // Assume milliseconds if > 10 digits
            if ts > 10_000_000_000 {
                return Ok(ts);
            } else {
                return Ok(ts * 1000);
            }
        }

        Err(DataError::ParseError(format!(
            "Could not parse date: {}",
            date_str
        )))
    }
}

#[async_trait]
impl DataProvider for CsvDataSource {
    async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        range: FetchRange,
    ) -> Result<Vec<Candle>, DataError> {
        let path = self
            .path_for(symbol, interval)
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

        let text = tokio::fs::read_to_string(&path).await?;
        let mut candles = self.parse(&text)?;
        candles.retain(|c| range.contains(c.ts));

        debug!(
            symbol,
            interval = %interval,
            path = %path.display(),
            rows = candles.len(),
            "Loaded CSV candles"
        );
        Ok(candles)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
