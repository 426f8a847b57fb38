//! History export to Parquet or CSV.
//!
//! Layout: one row per daily bar, columns `date, open, high, low, close,
//! volume`. Null cells stay null in Parquet and empty in CSV.

use crate::data::OhlcvFrame;
use crate::domain::{NormalizedSymbol, OhlcvBar};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export extension for {0} (use .parquet or .csv)")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Parquet,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("parquet") | Some("pq") => Ok(ExportFormat::Parquet),
            Some("csv") => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Write `frame` to `path`, picking the format from the extension.
pub fn write_frame(frame: &OhlcvFrame, path: &Path) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    match format {
        ExportFormat::Parquet => write_parquet(frame, path)?,
        ExportFormat::Csv => write_csv(frame, path)?,
    }
    tracing::info!(
        symbol = %frame.symbol,
        rows = frame.len(),
        path = %path.display(),
        ?format,
        "history exported"
    );
    Ok(format)
}

fn frame_to_dataframe(frame: &OhlcvFrame) -> Result<DataFrame, ExportError> {
    let bars = &frame.bars;
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| b.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    let column = |f: fn(&OhlcvBar) -> Option<f64>| -> Vec<Option<f64>> { bars.iter().map(f).collect() };

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| ExportError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), column(|b| b.open)),
        Column::new("high".into(), column(|b| b.high)),
        Column::new("low".into(), column(|b| b.low)),
        Column::new("close".into(), column(|b| b.close)),
        Column::new("volume".into(), column(|b| b.volume)),
    ])
    .map_err(|e| ExportError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(frame: &OhlcvFrame, path: &Path) -> Result<(), ExportError> {
    let mut df = frame_to_dataframe(frame)?;
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| ExportError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn write_csv(frame: &OhlcvFrame, path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["date", "open", "high", "low", "close", "volume"])?;
    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for b in &frame.bars {
        wtr.write_record([
            b.date.to_string(),
            cell(b.open),
            cell(b.high),
            cell(b.low),
            cell(b.close),
            cell(b.volume),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read back a Parquet export.
pub fn read_parquet(path: &Path, symbol: NormalizedSymbol) -> Result<OhlcvFrame, ExportError> {
    let map_err = |e: PolarsError| ExportError::Parquet(format!("read: {e}"));
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file).finish().map_err(map_err)?;

    let dates = df.column("date").map_err(map_err)?.date().map_err(map_err)?;
    let mut columns = Vec::with_capacity(5);
    for name in ["open", "high", "low", "close", "volume"] {
        columns.push(df.column(name).map_err(map_err)?.f64().map_err(map_err)?.clone());
    }

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = dates
            .get(i)
            .ok_or_else(|| ExportError::Parquet(format!("null date at row {i}")))?;
        let date = NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .ok_or_else(|| ExportError::Parquet(format!("date out of range at row {i}")))?;
        bars.push(OhlcvBar {
            date,
            open: columns[0].get(i),
            high: columns[1].get(i),
            low: columns[2].get(i),
            close: columns[3].get(i),
            volume: columns[4].get(i),
        });
    }
    Ok(OhlcvFrame::new(symbol, bars))
}
