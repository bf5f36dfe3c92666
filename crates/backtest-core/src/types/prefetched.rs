//! Historical data embedded in a run by the host.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Candle;

/// OHLCV rows fetched by the host before the run.
///
/// Accepts either a flat `{SYMBOL: [rows]}` document or the split
/// `{main: {SYMBOL: [rows]}, detailed: {SYMBOL: [rows]}}` form, where
/// `detailed` holds optional higher-resolution candles used to resolve
/// fills after entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "PrefetchedRepr")]
pub struct PrefetchedOhlcv {
    pub main: BTreeMap<String, Vec<Candle>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detailed: BTreeMap<String, Vec<Candle>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrefetchedRepr {
    Split {
        main: BTreeMap<String, Vec<Candle>>,
        #[serde(default)]
        detailed: BTreeMap<String, Vec<Candle>>,
    },
    Flat(BTreeMap<String, Vec<Candle>>),
}

impl From<PrefetchedRepr> for PrefetchedOhlcv {
    fn from(repr: PrefetchedRepr) -> Self {
        match repr {
            PrefetchedRepr::Split { main, detailed } => Self { main, detailed },
            PrefetchedRepr::Flat(main) => Self {
                main,
                detailed: BTreeMap::new(),
            },
        }
    }
}

impl PrefetchedOhlcv {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the main series of a symbol.
    pub fn with_series(mut self, symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.main.insert(symbol.into(), candles);
        self
    }

    /// Add (or replace) the detail series of a symbol.
    pub fn with_detail(mut self, symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.detailed.insert(symbol.into(), candles);
        self
    }

    /// Main candles of a symbol.
    pub fn series(&self, symbol: &str) -> Option<&[Candle]> {
        self.main.get(symbol).map(Vec::as_slice)
    }

    /// Detail candles of a symbol, if any were supplied.
    pub fn detail(&self, symbol: &str) -> Option<&[Candle]> {
        self.detailed
            .get(symbol)
            .map(Vec::as_slice)
            .filter(|rows| !rows.is_empty())
    }

    /// Symbols with main data.
    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.main.keys()
    }

    /// Sort every series by time, keep the last row per timestamp and drop
    /// malformed rows. Returns the number of rows removed.
    pub fn sanitize(&mut self) -> usize {
        self.main
            .values_mut()
            .chain(self.detailed.values_mut())
            .map(sanitize_series)
            .sum()
    }
}

fn sanitize_series(rows: &mut Vec<Candle>) -> usize {
    let before = rows.len();
    rows.retain(Candle::is_well_formed);
    // Stable sort keeps input order among equal timestamps, so the
    // reverse-dedup below keeps the last supplied row
    rows.sort_by_key(|c| c.ts);
    rows.reverse();
    rows.dedup_by_key(|c| c.ts);
    rows.reverse();
    before - rows.len()
}
