//! Offline provider backed by a wide CSV export.
//!
//! Two layouts are accepted, the same ones a batch download tool writes:
//!
//! ```text
//! Price,Close,High,...        Date,Open,High,Low,Close,Volume
//! Ticker,TCS.NS,TCS.NS,...    2024-01-02,3800,3850,3780,3820,1200000
//! Date,,,...
//! 2024-01-02,3820,3850,...
//! ```
//!
//! The left one carries a ticker level and may hold any number of symbols;
//! the right one is flat and belongs to whichever single symbol was asked for.

use super::frame::{BatchResult, Field};
use super::provider::{DataError, DataSource, Interval, MarketDataProvider, Period};
use super::table::{ColumnKey, WideTable};
use crate::domain::NormalizedSymbol;
use chrono::{Duration, NaiveDate};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Provider that answers every batch from one CSV file.
///
/// The file is re-read on every call so an external refresh is picked up.
/// Rows are cut to the requested period, counted back from the file's last
/// date.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MarketDataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn source(&self) -> DataSource {
        DataSource::CsvImport
    }

    fn download(
        &self,
        symbols: &[NormalizedSymbol],
        period: Period,
        interval: Interval,
    ) -> Result<BatchResult, DataError> {
        if !interval.is_daily() {
            return Err(DataError::UnsupportedInterval {
                provider: self.name().to_string(),
                interval,
            });
        }

        let file = std::fs::File::open(&self.path)?;
        let table = read_wide_csv(file)?;
        let Some(last) = table.index.iter().max().copied() else {
            return Ok(BatchResult::new());
        };
        let start = last - Duration::days(period.calendar_days() - 1);

        tracing::debug!(
            path = %self.path.display(),
            rows = table.index.len(),
            %start,
            "read wide CSV"
        );
        table.since(start).into_batch(symbols)
    }
}

/// Parse a wide CSV (multi-level or flat header) into a [`WideTable`].
///
/// Columns whose header is not an OHLCV field (`Adj Close`, `Dividends`) are
/// ignored. Empty cells read as null.
pub fn read_wide_csv<R: Read>(reader: R) -> Result<WideTable, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = rdr.records();

    let Some(first) = records.next().transpose()? else {
        return Ok(WideTable::default());
    };
    let label = first.get(0).unwrap_or("").trim();

    let columns: Vec<Option<ColumnKey>> = if label.eq_ignore_ascii_case("price") {
        let tickers = records.next().transpose()?.ok_or_else(|| {
            DataError::ResponseFormatChanged("multi-level CSV is missing its ticker row".into())
        })?;
        first
            .iter()
            .enumerate()
            .skip(1)
            .map(|(j, header)| {
                let field = Field::from_header(header)?;
                let symbol = tickers.get(j).map(str::trim).filter(|s| !s.is_empty())?;
                Some(ColumnKey::multi(field, symbol))
            })
            .collect()
    } else if label.eq_ignore_ascii_case("date") {
        first
            .iter()
            .skip(1)
            .map(|header| Field::from_header(header).map(ColumnKey::flat))
            .collect()
    } else {
        return Err(DataError::ResponseFormatChanged(format!(
            "unrecognized CSV header starting with '{label}'"
        )));
    };

    let mut index = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];

    for (line, record) in records.enumerate() {
        let record = record?;
        let first_cell = record.get(0).unwrap_or("").trim();
        // The optional "Date" label row under the ticker row.
        if first_cell.eq_ignore_ascii_case("date") || first_cell.is_empty() {
            continue;
        }
        index.push(parse_date(first_cell).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!(
                "row {}: invalid date '{first_cell}'",
                line + 1
            ))
        })?);
        for (j, column) in values.iter_mut().enumerate() {
            let raw = record.get(j + 1).unwrap_or("").trim();
            let value = if raw.is_empty() {
                None
            } else {
                Some(raw.parse::<f64>().map_err(|_| {
                    DataError::ResponseFormatChanged(format!(
                        "row {}: invalid number '{raw}'",
                        line + 1
                    ))
                })?)
            };
            column.push(value.filter(|v| v.is_finite()));
        }
    }

    let mut table = WideTable::new(index);
    for (key, column) in columns.into_iter().zip(values) {
        if let Some(key) = key {
            table.push_column(key, column);
        }
    }
    Ok(table)
}

/// Dates may carry a time part ("2024-01-02 00:00:00+05:30"); only the
/// calendar date is kept.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
