//! Wide tabular provider results.
//!
//! Tabular sources deliver one shared date index with one column per
//! (field, symbol) pair. A single-symbol response usually drops the symbol
//! level and carries flat `Open/High/Low/Close/Volume` columns instead.
//! [`WideTable::into_batch`] folds both layouts into a [`BatchResult`], so
//! nothing downstream ever has to care how many symbols were requested.

use super::frame::{BatchResult, Field, OhlcvFrame};
use super::provider::DataError;
use crate::domain::{NormalizedSymbol, OhlcvBar};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Column address: a field, plus the symbol level when the table has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnKey {
    pub field: Field,
    pub symbol: Option<String>,
}

impl ColumnKey {
    pub fn flat(field: Field) -> Self {
        Self {
            field,
            symbol: None,
        }
    }

    pub fn multi(field: Field, symbol: impl Into<String>) -> Self {
        Self {
            field,
            symbol: Some(symbol.into()),
        }
    }
}

/// A wide table on a shared date index.
#[derive(Debug, Clone, Default)]
pub struct WideTable {
    pub index: Vec<NaiveDate>,
    pub columns: Vec<(ColumnKey, Vec<Option<f64>>)>,
}

impl WideTable {
    pub fn new(index: Vec<NaiveDate>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn push_column(&mut self, key: ColumnKey, values: Vec<Option<f64>>) {
        self.columns.push((key, values));
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// True if any column carries a symbol level.
    pub fn is_multi_level(&self) -> bool {
        self.columns.iter().any(|(k, _)| k.symbol.is_some())
    }

    /// Keep only rows whose date is on or after `start`.
    pub fn since(mut self, start: NaiveDate) -> Self {
        let keep: Vec<bool> = self.index.iter().map(|d| *d >= start).collect();
        self.index = filter_by(&self.index, &keep);
        for (_, values) in &mut self.columns {
            *values = filter_by(values, &keep);
        }
        self
    }

    /// Split the table into one frame per symbol.
    ///
    /// Flat columns belong to the only requested symbol; a flat table
    /// answering a multi-symbol request cannot be attributed and is rejected.
    /// Symbols in the table that were not requested are dropped.
    pub fn into_batch(self, requested: &[NormalizedSymbol]) -> Result<BatchResult, DataError> {
        if self.is_empty() {
            return Ok(BatchResult::new());
        }

        let n = self.index.len();
        if let Some((key, values)) = self.columns.iter().find(|(_, v)| v.len() != n) {
            return Err(DataError::ResponseFormatChanged(format!(
                "column {} has {} rows, index has {n}",
                key.field,
                values.len()
            )));
        }

        let flat_owner = if self.is_multi_level() {
            None
        } else {
            match requested {
                [only] => Some(only.clone()),
                _ => {
                    return Err(DataError::ResponseFormatChanged(format!(
                        "flat columns cannot be attributed across {} symbols",
                        requested.len()
                    )))
                }
            }
        };

        // Group columns per symbol.
        let mut grouped: BTreeMap<NormalizedSymbol, Vec<(Field, Vec<Option<f64>>)>> =
            BTreeMap::new();
        for (key, values) in self.columns {
            let symbol = match (&key.symbol, &flat_owner) {
                (Some(s), _) => NormalizedSymbol::from_provider(s.trim().to_uppercase()),
                (None, Some(owner)) => owner.clone(),
                // Flat column inside a multi-level table: no owner.
                (None, None) => continue,
            };
            grouped.entry(symbol).or_default().push((key.field, values));
        }

        let mut batch = BatchResult::new();
        for (symbol, columns) in grouped {
            if !requested.contains(&symbol) {
                continue;
            }
            let fields: BTreeSet<Field> = columns.iter().map(|(f, _)| *f).collect();
            let mut bars: Vec<OhlcvBar> = self.index.iter().map(|d| OhlcvBar::void(*d)).collect();
            for (field, values) in &columns {
                for (bar, value) in bars.iter_mut().zip(values) {
                    field.set(bar, *value);
                }
            }
            batch.insert(OhlcvFrame::with_fields(symbol, fields, bars));
        }

        Ok(batch)
    }
}

fn filter_by<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(v, _)| v.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalize;

    fn dates() -> Vec<NaiveDate> {
        vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ]
    }

    fn full_columns(table: &mut WideTable, symbol: Option<&str>, base: f64) {
        for field in Field::ALL {
            let key = ColumnKey {
                field,
                symbol: symbol.map(String::from),
            };
            table.push_column(key, vec![Some(base), Some(base + 1.0)]);
        }
    }

    #[test]
    fn flat_table_belongs_to_single_requested_symbol() {
        let mut table = WideTable::new(dates());
        full_columns(&mut table, None, 100.0);

        let batch = table.into_batch(&[normalize("TCS")]).unwrap();
        let frame = batch.get(&normalize("TCS")).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.bars[1].close, Some(101.0));
        assert!(frame.has_full_field_set());
    }

    #[test]
    fn flat_table_with_many_requested_is_rejected() {
        let mut table = WideTable::new(dates());
        full_columns(&mut table, None, 100.0);

        let result = table.into_batch(&[normalize("TCS"), normalize("INFY")]);
        assert!(matches!(result, Err(DataError::ResponseFormatChanged(_))));
    }

    #[test]
    fn multi_level_table_splits_per_symbol() {
        let mut table = WideTable::new(dates());
        full_columns(&mut table, Some("TCS.NS"), 100.0);
        full_columns(&mut table, Some("^NSEI"), 20_000.0);
        full_columns(&mut table, Some("UNASKED.NS"), 1.0);

        let batch = table
            .into_batch(&[normalize("TCS"), normalize("^NSEI"), normalize("FAKE")])
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(&normalize("^NSEI")).unwrap().bars[0].open, Some(20_000.0));
        assert!(!batch.contains(&normalize("FAKE")));
    }

    #[test]
    fn single_symbol_multi_level_matches_flat_shape() {
        let mut flat = WideTable::new(dates());
        full_columns(&mut flat, None, 50.0);
        let mut multi = WideTable::new(dates());
        full_columns(&mut multi, Some("TCS.NS"), 50.0);

        let requested = [normalize("TCS")];
        assert_eq!(
            flat.into_batch(&requested).unwrap(),
            multi.into_batch(&requested).unwrap()
        );
    }

    #[test]
    fn missing_columns_read_as_null() {
        let mut table = WideTable::new(dates());
        table.push_column(ColumnKey::multi(Field::Close, "TCS.NS"), vec![Some(1.0), None]);

        let batch = table.into_batch(&[normalize("TCS")]).unwrap();
        let frame = batch.get(&normalize("TCS")).unwrap();
        assert!(!frame.has_full_field_set());
        assert_eq!(frame.bars[0].open, None);
        assert!(frame.bars[1].is_void());
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let mut table = WideTable::new(dates());
        table.push_column(ColumnKey::flat(Field::Close), vec![Some(1.0)]);
        assert!(table.into_batch(&[normalize("TCS")]).is_err());
    }

    #[test]
    fn empty_table_yields_empty_batch() {
        let batch = WideTable::default().into_batch(&[normalize("TCS")]).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn since_filters_rows() {
        let mut table = WideTable::new(dates());
        full_columns(&mut table, None, 10.0);
        let table = table.since(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(table.index.len(), 1);
        assert_eq!(table.columns[0].1, vec![Some(11.0)]);
    }
}
