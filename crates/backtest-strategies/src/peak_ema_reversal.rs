//! Peak EMA Reversal Strategy.
//!
//! Looks for a single dominant price peak in the recent bars, followed by a
//! mostly bearish pullback that dips under an EMA. When the pattern holds it
//! buys at the EMA value:
//! 1. The highest high of the last `total_window` bars is unique, sits in the
//!    last `recent_window` bars and is at least `peak_ratio` x EMA15.
//! 2. The bars after the peak are all bearish (EMA15) or all but one (EMA33).
//! 3. The current low is under that EMA.

use backtest_core::{
    error::StrategyError,
    traits::{DecisionContext, Strategy, StrategyConfig},
    types::{Candle, CandleWindow, Decision, Interval},
};
use backtest_indicators::Ema;
use serde::{Deserialize, Serialize};

/// Configuration for the Peak EMA Reversal strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakEmaReversalConfig {
    /// EMA used for the peak test and for an all-bearish pullback
    pub peak_ema_period: usize,
    /// EMA used when exactly one pullback bar is bullish
    pub alt_ema_period: usize,
    /// Minimum peak high as a multiple of the EMA at the peak
    pub peak_ratio: f64,
    /// Number of bars after the peak checked for bearishness
    pub pattern_window: usize,
    /// High-over-open tolerance before a red bar counts as bullish (daily)
    pub daily_buffer: f64,
    /// High-over-open tolerance before a red bar counts as bullish (weekly)
    pub weekly_buffer: f64,
}

impl Default for PeakEmaReversalConfig {
    fn default() -> Self {
        Self {
            peak_ema_period: 15,
            alt_ema_period: 33,
            peak_ratio: 1.2,
            pattern_window: 7,
            daily_buffer: 0.1,
            weekly_buffer: 0.2,
        }
    }
}

impl StrategyConfig for PeakEmaReversalConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.peak_ema_period == 0 || self.alt_ema_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "EMA periods must be greater than 0".into(),
            ));
        }
        if self.pattern_window == 0 {
            return Err(StrategyError::InvalidConfig(
                "Pattern window must be greater than 0".into(),
            ));
        }
        if self.peak_ratio.is_nan()
            || self.peak_ratio <= 0.0
            || self.daily_buffer < 0.0
            || self.weekly_buffer < 0.0
        {
            return Err(StrategyError::InvalidConfig(
                "Peak ratio must be positive and buffers non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Pullback shape after the peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    AllBearish,
    AllButOne,
    Mixed,
}

/// Peak search windows for an interval.
#[derive(Debug, Clone, Copy)]
struct PeakWindows {
    recent: usize,
    total: usize,
    buffer: f64,
}

const MIN_LOOKBACK: usize = 35;
// Bars required before the recent section
const PEAK_MARGIN: usize = 7;

/// Peak EMA Reversal Strategy (long only).
#[derive(Debug, Clone)]
pub struct PeakEmaReversalStrategy {
    config: PeakEmaReversalConfig,
}

impl PeakEmaReversalStrategy {
    /// Create a new Peak EMA Reversal strategy.
    pub fn new(config: PeakEmaReversalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakEmaReversalConfig {
        &self.config
    }

    fn windows(&self, interval: Interval) -> PeakWindows {
        match interval {
            Interval::Weekly => PeakWindows {
                recent: 5,
                total: 52,
                buffer: self.config.weekly_buffer,
            },
            _ => PeakWindows {
                recent: 7,
                total: 200,
                buffer: self.config.daily_buffer,
            },
        }
    }

    /// Index of the single peak in `rows`, if the peak conditions hold.
    fn find_single_peak(&self, rows: &[Candle], windows: PeakWindows) -> Option<usize> {
        let PeakWindows { recent, total, .. } = windows;
        if rows.len() < recent + PEAK_MARGIN || total < recent + PEAK_MARGIN {
            return None;
        }

        let span = rows.len().min(total);
        let offset = rows.len() - span;
        let subset = &rows[offset..];

        let max_high = subset.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let mut peaks = subset.iter().enumerate().filter(|(_, c)| c.high == max_high);
        let (peak_loc, peak) = peaks.next()?;
        if peaks.next().is_some() {
            return None;
        }
        if peak_loc < span - recent {
            return None;
        }

        // EMA over the subset only, as of the peak bar
        let closes: Vec<f64> = subset.iter().map(|c| c.close).collect();
        let ema_at_peak = Ema::new(self.config.peak_ema_period)
            .aligned(&closes[..=peak_loc])
            .pop()
            .flatten()?;
        if peak.high < self.config.peak_ratio * ema_at_peak {
            return None;
        }

        // A recent close must break above everything before the recent section
        let split = span - recent - 1;
        let max_earlier_high = max_high_of(&subset[..split]);
        if !closes[span - recent - 1..].iter().any(|&c| c > max_earlier_high) {
            return None;
        }

        // The peak bar or the one before it closes above all prior highs
        if peak_loc > 0 {
            let max_prev_high = max_high_of(&subset[..peak_loc - 1]);
            if closes[peak_loc] <= max_prev_high && closes[peak_loc - 1] <= max_prev_high {
                return None;
            }
        }

        Some(offset + peak_loc)
    }

    /// Classify the bars after the peak.
    ///
    /// When the peak is the last row the last `pattern_window` rows are used
    /// and the first of them counts as bearish.
    fn bearish_pattern(&self, rows: &[Candle], start: usize, buffer: f64) -> Pattern {
        let window = self.config.pattern_window;
        let (sub, anchor) = if start < rows.len() {
            let end = (start + window).min(rows.len());
            (&rows[start..end], (start > 0).then(|| &rows[start - 1]))
        } else {
            (&rows[rows.len().saturating_sub(window)..], None)
        };
        if sub.is_empty() {
            return Pattern::Mixed;
        }

        let is_bullish = |curr: &Candle, prev: &Candle| {
            curr.high > prev.high || curr.close > curr.open || curr.high > (1.0 + buffer) * curr.open
        };

        let mut bearish = match anchor {
            Some(prev) if is_bullish(&sub[0], prev) => 0,
            _ => 1,
        };
        bearish += sub
            .windows(2)
            .filter(|pair| !is_bullish(&pair[1], &pair[0]))
            .count();

        if bearish == sub.len() {
            Pattern::AllBearish
        } else if bearish + 1 == sub.len() {
            Pattern::AllButOne
        } else {
            Pattern::Mixed
        }
    }
}

fn max_high_of(rows: &[Candle]) -> f64 {
    rows.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max)
}

impl Strategy for PeakEmaReversalStrategy {
    fn name(&self) -> &str {
        "peak_ema_reversal"
    }

    fn description(&self) -> &str {
        "Single-peak detection with EMA pullback"
    }

    fn decide(
        &self,
        window: &CandleWindow<'_>,
        interval: Interval,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision, StrategyError> {
        let rows = window.rows();
        let current = window.current().ok_or(StrategyError::InsufficientData {
            required: self.required_lookback(),
            available: 0,
        })?;
        let windows = self.windows(interval);

        let Some(peak) = self.find_single_peak(rows, windows) else {
            return Ok(Decision::no());
        };

        let ema_period = match self.bearish_pattern(rows, peak + 1, windows.buffer) {
            Pattern::AllBearish => self.config.peak_ema_period,
            Pattern::AllButOne => self.config.alt_ema_period,
            Pattern::Mixed => return Ok(Decision::no()),
        };

        let Some(entry) = Ema::new(ema_period).aligned_last(&window.closes()) else {
            return Ok(Decision::no());
        };
        if current.low >= entry {
            return Ok(Decision::no());
        }

        Ok(Decision::buy(entry)
            .with_bracket(ctx.take_profit(entry, 1.0), ctx.stop_loss(entry, 1.0))
            .with_meta(serde_json::json!({
                "ema_period": ema_period,
                "peak_time": rows[peak].ts,
                "decision": format!("YES_{}", ema_period),
            })))
    }

    fn required_lookback(&self) -> usize {
        self.config
            .peak_ema_period
            .max(self.config.alt_ema_period)
            .max(MIN_LOOKBACK)
            .max(self.config.pattern_window + PEAK_MARGIN)
    }
}
