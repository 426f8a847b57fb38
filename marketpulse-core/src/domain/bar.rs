//! Bars: the daily and monthly market data units.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single symbol.
///
/// Every price field is optional: providers emit nulls for trading holidays
/// and for dates before a symbol was listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl OhlcvBar {
    /// A bar with every field populated.
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }

    /// A bar with every field null.
    pub fn void(date: NaiveDate) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    /// Returns true if every OHLCV field is null.
    pub fn is_void(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
    }
}

/// Calendar-month roll-up of daily bars.
///
/// `month` is the first day of the month formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBar {
    pub month: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn void_bar_detected() {
        assert!(OhlcvBar::void(day(2)).is_void());
        assert!(!OhlcvBar::new(day(2), 1.0, 2.0, 0.5, 1.5, 100.0).is_void());
    }

    #[test]
    fn partially_null_bar_is_not_void() {
        let mut bar = OhlcvBar::void(day(3));
        bar.volume = Some(0.0);
        assert!(!bar.is_void());
    }

    #[test]
    fn bar_serializes_nulls_and_iso_date() {
        let mut bar = OhlcvBar::new(day(2), 100.0, 105.0, 98.0, 103.0, 5000.0);
        bar.open = None;
        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["date"], "2024-01-02");
        assert!(json["open"].is_null());
        assert_eq!(json["close"], 103.0);
    }
}
