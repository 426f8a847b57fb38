//! Per-symbol OHLCV frames and the batch result that holds them.

use crate::domain::{NormalizedSymbol, OhlcvBar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One OHLCV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
    ];

    /// Column header as providers spell it.
    pub fn header(&self) -> &'static str {
        match self {
            Field::Open => "Open",
            Field::High => "High",
            Field::Low => "Low",
            Field::Close => "Close",
            Field::Volume => "Volume",
        }
    }

    /// Parse a column header, case-insensitively. Unknown headers
    /// ("Adj Close", "Dividends") yield `None`.
    pub fn from_header(header: &str) -> Option<Field> {
        let h = header.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.header().eq_ignore_ascii_case(h))
    }

    /// Read this field from a bar.
    pub fn value(&self, bar: &OhlcvBar) -> Option<f64> {
        match self {
            Field::Open => bar.open,
            Field::High => bar.high,
            Field::Low => bar.low,
            Field::Close => bar.close,
            Field::Volume => bar.volume,
        }
    }

    /// Write this field on a bar.
    pub fn set(&self, bar: &mut OhlcvBar, value: Option<f64>) {
        match self {
            Field::Open => bar.open = value,
            Field::High => bar.high = value,
            Field::Low => bar.low = value,
            Field::Close => bar.close = value,
            Field::Volume => bar.volume = value,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Daily bars of one symbol, sorted by date ascending.
///
/// `fields` records which columns the provider actually delivered; a column
/// the provider never sent reads as null on every bar.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvFrame {
    pub symbol: NormalizedSymbol,
    pub fields: BTreeSet<Field>,
    pub bars: Vec<OhlcvBar>,
}

impl OhlcvFrame {
    /// Frame carrying the full OHLCV field set.
    pub fn new(symbol: NormalizedSymbol, bars: Vec<OhlcvBar>) -> Self {
        Self::with_fields(symbol, Field::ALL.into_iter().collect(), bars)
    }

    /// Frame carrying only some fields. Bars are sorted by date.
    pub fn with_fields(symbol: NormalizedSymbol, fields: BTreeSet<Field>, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self {
            symbol,
            fields,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn has_full_field_set(&self) -> bool {
        Field::ALL.iter().all(|f| self.fields.contains(f))
    }

    /// Copy of this frame without void (all-null) rows.
    pub fn without_void_rows(&self) -> OhlcvFrame {
        OhlcvFrame {
            symbol: self.symbol.clone(),
            fields: self.fields.clone(),
            bars: self.bars.iter().filter(|b| !b.is_void()).cloned().collect(),
        }
    }

    /// Last non-null close.
    pub fn last_close(&self) -> Option<f64> {
        self.bars.iter().rev().find_map(|b| b.close)
    }

    /// The trailing `n` bars.
    pub fn tail(&self, n: usize) -> &[OhlcvBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }
}

/// Frames for every symbol a batch request resolved.
///
/// Symbols the provider had no data for are simply absent. Whatever column
/// layout the provider produced, it is normalized into this shape at the
/// provider boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    frames: BTreeMap<NormalizedSymbol, OhlcvFrame>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: OhlcvFrame) {
        self.frames.insert(frame.symbol.clone(), frame);
    }

    pub fn get(&self, symbol: &NormalizedSymbol) -> Option<&OhlcvFrame> {
        self.frames.get(symbol)
    }

    pub fn contains(&self, symbol: &NormalizedSymbol) -> bool {
        self.frames.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &NormalizedSymbol> {
        self.frames.keys()
    }

    /// Keep only the requested symbols.
    pub fn retain_requested(&mut self, requested: &[NormalizedSymbol]) {
        self.frames.retain(|sym, _| requested.contains(sym));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FromIterator<OhlcvFrame> for BatchResult {
    fn from_iter<I: IntoIterator<Item = OhlcvFrame>>(iter: I) -> Self {
        let mut batch = BatchResult::new();
        for frame in iter {
            batch.insert(frame);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalize;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn field_header_parsing() {
        assert_eq!(Field::from_header("close"), Some(Field::Close));
        assert_eq!(Field::from_header(" Volume "), Some(Field::Volume));
        assert_eq!(Field::from_header("Adj Close"), None);
    }

    #[test]
    fn frame_sorts_bars_and_finds_last_close() {
        let mut late = OhlcvBar::void(day(5));
        late.open = Some(10.0);
        let frame = OhlcvFrame::new(
            normalize("TCS"),
            vec![late, OhlcvBar::new(day(4), 1.0, 2.0, 0.5, 9.0, 10.0)],
        );
        assert_eq!(frame.bars[0].date, day(4));
        // The last bar has no close, so the previous close wins.
        assert_eq!(frame.last_close(), Some(9.0));
    }

    #[test]
    fn void_rows_are_dropped() {
        let frame = OhlcvFrame::new(
            normalize("TCS"),
            vec![
                OhlcvBar::void(day(1)),
                OhlcvBar::new(day(4), 1.0, 2.0, 0.5, 1.5, 10.0),
            ],
        );
        let cleaned = frame.without_void_rows();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.bars[0].date, day(4));
    }

    #[test]
    fn partial_field_set_is_reported() {
        let fields: BTreeSet<Field> = [Field::Close].into_iter().collect();
        let frame = OhlcvFrame::with_fields(normalize("TCS"), fields, vec![]);
        assert!(!frame.has_full_field_set());
        assert!(OhlcvFrame::new(normalize("TCS"), vec![]).has_full_field_set());
    }

    #[test]
    fn batch_retains_only_requested() {
        let mut batch: BatchResult = ["TCS", "INFY", "^NSEI"]
            .iter()
            .map(|s| OhlcvFrame::new(normalize(s), vec![]))
            .collect();
        batch.retain_requested(&[normalize("TCS"), normalize("^NSEI")]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.contains(&normalize("INFY")));
    }

    #[test]
    fn tail_is_bounded() {
        let bars: Vec<OhlcvBar> = (1..=5)
            .map(|d| OhlcvBar::new(day(d), 1.0, 1.0, 1.0, d as f64, 1.0))
            .collect();
        let frame = OhlcvFrame::new(normalize("TCS"), bars);
        assert_eq!(frame.tail(2).len(), 2);
        assert_eq!(frame.tail(2)[1].close, Some(5.0));
        assert_eq!(frame.tail(50).len(), 5);
    }
}
