//! Host-side prefetch of every series a run needs.

use backtest_core::error::DataError;
use backtest_core::types::{Interval, PrefetchedOhlcv};
use backtest_core::{DataProvider, FetchRange};
use tracing::{info, warn};

/// Fetch the main series of every symbol, plus detail candles when asked.
///
/// A missing main series is an error. A missing detail series is logged and
/// skipped; the engine then resolves fills on the main candles.
pub async fn prefetch<P>(
    provider: &P,
    symbols: &[String],
    interval: Interval,
    range: FetchRange,
    with_detail: bool,
) -> Result<PrefetchedOhlcv, DataError>
where
    P: DataProvider + ?Sized,
{
    let mut data = PrefetchedOhlcv::new();

    for symbol in symbols {
        let main = provider.fetch(symbol, interval, range).await?;
        if main.is_empty() {
            return Err(DataError::NoDataAvailable);
        }
        data.main.insert(symbol.clone(), main);

        if with_detail && interval.detail() != interval {
            match provider.fetch(symbol, interval.detail(), range).await {
                Ok(detail) if !detail.is_empty() => {
                    data.detailed.insert(symbol.clone(), detail);
                }
                Ok(_) | Err(DataError::SymbolNotFound(_)) => {
                    warn!(symbol = %symbol, interval = %interval.detail(), "No detail candles");
                }
                Err(e) => return Err(e),
            }
        }
    }

    let dropped = data.sanitize();
    info!(
        provider = provider.name(),
        symbols = symbols.len(),
        detailed = data.detailed.len(),
        dropped,
        "Prefetched OHLCV"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_source::tests::scratch_dir;
    use crate::CsvDataSource;

    const ROWS: &str = "date,open,high,low,close,volume\n\
                        2024-01-01,1,2,0.5,1.5,10\n\
                        2024-01-02,2,3,1,2.5,10\n";

    #[tokio::test]
    async fn test_prefetch_main_and_detail() {
        let dir = scratch_dir("prefetch");
        std::fs::write(dir.join("BTCUSDT_1d.csv"), ROWS).unwrap();
        std::fs::write(dir.join("BTCUSDT_1h.csv"), ROWS).unwrap();
        std::fs::write(dir.join("ETHUSDT.csv"), ROWS).unwrap();

        let source = CsvDataSource::new(&dir).unwrap();
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let data = prefetch(&source, &symbols, Interval::Daily, FetchRange::all(), true)
            .await
            .unwrap();

        assert_eq!(data.series("BTCUSDT").unwrap().len(), 2);
        assert_eq!(data.series("ETHUSDT").unwrap().len(), 2);
        assert!(data.detail("BTCUSDT").is_some());
        // ETHUSDT.csv is also picked up for the detail interval
        assert!(data.detail("ETHUSDT").is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_prefetch_missing_symbol_fails() {
        let dir = scratch_dir("prefetch-missing");
        let source = CsvDataSource::new(&dir).unwrap();
        let result = prefetch(
            &source,
            &["XRPUSDT".to_string()],
            Interval::Daily,
            FetchRange::all(),
            false,
        )
        .await;
        assert!(matches!(result, Err(DataError::SymbolNotFound(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
