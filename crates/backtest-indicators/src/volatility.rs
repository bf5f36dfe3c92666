//! Volatility indicators.

use backtest_core::traits::Indicator;
use backtest_core::types::Candle;

/// Average True Range (ATR).
///
/// Measures market volatility by decomposing the entire range
/// of an asset price for that period.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
}

impl Atr {
    /// Create a new ATR indicator.
    ///
    /// Common period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }

    /// Calculate ATR from OHLC data.
    pub fn calculate_ohlc(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
        let len = high.len().min(low.len()).min(close.len());
        if len < self.period + 1 {
            return vec![];
        }

        let tr: Vec<f64> = (1..len)
            .map(|i| {
                let high_low = high[i] - low[i];
                let high_close = (high[i] - close[i - 1]).abs();
                let low_close = (low[i] - close[i - 1]).abs();
                high_low.max(high_close).max(low_close)
            })
            .collect();

        Self::wilder(&tr, self.period)
    }

    /// Most recent ATR over a candle slice, if there are enough candles.
    pub fn latest_from_candles(&self, candles: &[Candle]) -> Option<f64> {
        if candles.len() < self.period + 1 {
            return None;
        }
        let tr: Vec<f64> = candles
            .windows(2)
            .map(|pair| pair[1].true_range(Some(pair[0].close)))
            .collect();
        Self::wilder(&tr, self.period).pop()
    }

    // Initial value is the SMA of the first `period` ranges, then Wilder's smoothing
    fn wilder(tr: &[f64], period: usize) -> Vec<f64> {
        if tr.len() < period {
            return vec![];
        }

        let period_f64 = period as f64;
        let mut result = Vec::with_capacity(tr.len() - period + 1);

        let mut atr: f64 = tr[..period].iter().sum::<f64>() / period_f64;
        result.push(atr);

        for &tr_val in &tr[period..] {
            atr = (atr * (period_f64 - 1.0) + tr_val) / period_f64;
            result.push(atr);
        }

        result
    }
}

impl Indicator for Atr {
    type Output = f64;

    /// Calculate using close prices only (close-to-close ranges).
    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period + 1 {
            return vec![];
        }

        let tr: Vec<f64> = data.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        Self::wilder(&tr, self.period)
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "ATR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atr_ohlc() {
        let atr = Atr::new(2);
        let high = vec![10.0, 12.0, 11.0, 13.0];
        let low = vec![9.0, 10.0, 9.5, 11.0];
        let close = vec![9.5, 11.0, 10.0, 12.5];

        let result = atr.calculate_ohlc(&high, &low, &close);
        // TR: max(2, 2.5, 0.5)=2.5, max(1.5, 0, 1.5)=1.5, max(2, 3, 1)=3
        assert_eq!(result.len(), 2);
        assert!((result[0] - 2.0).abs() < 1e-10);
        assert!((result[1] - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_atr_from_candles_matches_ohlc() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                Candle::new(i, base, base + 2.0, base - 1.5, base + 0.5, 10.0)
            })
            .collect();
        let atr = Atr::new(14);

        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let expected = *atr.calculate_ohlc(&highs, &lows, &closes).last().unwrap();

        let latest = atr.latest_from_candles(&candles).unwrap();
        assert!((latest - expected).abs() < 1e-10);
        assert!(atr.latest_from_candles(&candles[..14]).is_none());
    }

    #[test]
    fn test_atr_close_only() {
        let atr = Atr::new(3);
        let data = vec![1.0, 2.0, 4.0, 3.0, 5.0];
        let result = atr.calculate(&data);

        // Ranges: 1, 2, 1, 2 -> first = 4/3, then (4/3*2 + 2)/3
        assert_eq!(result.len(), 2);
        assert!((result[0] - 4.0 / 3.0).abs() < 1e-10);
        assert!((result[1] - (8.0 / 3.0 + 2.0) / 3.0).abs() < 1e-10);
        assert_eq!(atr.period(), 4);
    }
}
