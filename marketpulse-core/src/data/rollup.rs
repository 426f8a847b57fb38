//! Calendar-month roll-up of daily bars.
//!
//! Per month: open is the first open, high the max high, low the min low,
//! close the last close and volume the sum of volumes. Null cells are
//! skipped; a month that cannot supply every field is dropped, so no emitted
//! [`MonthlyBar`] ever carries a gap.

use super::frame::OhlcvFrame;
use crate::domain::{MonthlyBar, OhlcvBar};
use chrono::{Datelike, NaiveDate};

/// Number of trailing months kept by default.
pub const DEFAULT_MONTHS: usize = 6;

/// Roll a daily frame into at most `months` monthly bars, oldest first.
///
/// A frame missing any of the OHLCV columns yields an empty list.
pub fn rollup(frame: &OhlcvFrame, months: usize) -> Vec<MonthlyBar> {
    if !frame.has_full_field_set() || months == 0 {
        return Vec::new();
    }

    let mut out: Vec<MonthlyBar> = Vec::new();
    let mut bucket: Option<MonthBucket> = None;

    for bar in &frame.bars {
        let key = (bar.date.year(), bar.date.month());
        match bucket.as_mut() {
            Some(b) if b.key == key => b.push(bar),
            _ => {
                if let Some(done) = bucket.take().and_then(MonthBucket::finish) {
                    out.push(done);
                }
                let mut b = MonthBucket::new(key);
                b.push(bar);
                bucket = Some(b);
            }
        }
    }
    if let Some(done) = bucket.and_then(MonthBucket::finish) {
        out.push(done);
    }

    let start = out.len().saturating_sub(months);
    out.split_off(start)
}

struct MonthBucket {
    key: (i32, u32),
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl MonthBucket {
    fn new(key: (i32, u32)) -> Self {
        Self {
            key,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    fn push(&mut self, bar: &OhlcvBar) {
        if self.open.is_none() {
            self.open = bar.open;
        }
        if let Some(h) = bar.high {
            self.high = Some(self.high.map_or(h, |cur| cur.max(h)));
        }
        if let Some(l) = bar.low {
            self.low = Some(self.low.map_or(l, |cur| cur.min(l)));
        }
        if bar.close.is_some() {
            self.close = bar.close;
        }
        if let Some(v) = bar.volume {
            self.volume = Some(self.volume.unwrap_or(0.0) + v);
        }
    }

    fn finish(self) -> Option<MonthlyBar> {
        let (year, month) = self.key;
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(MonthlyBar {
            month: first.format("%Y-%m-%d").to_string(),
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
            volume: self.volume?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Field;
    use crate::domain::normalize;
    use std::collections::BTreeSet;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn frame(bars: Vec<OhlcvBar>) -> OhlcvFrame {
        OhlcvFrame::new(normalize("TCS"), bars)
    }

    #[test]
    fn aggregates_one_month() {
        let f = frame(vec![
            OhlcvBar::new(d(1, 2), 10.0, 12.0, 9.0, 11.0, 100.0),
            OhlcvBar::new(d(1, 3), 11.0, 15.0, 10.0, 14.0, 200.0),
            OhlcvBar::new(d(1, 31), 14.0, 14.5, 8.0, 9.5, 50.0),
        ]);
        let bars = rollup(&f, DEFAULT_MONTHS);
        assert_eq!(
            bars,
            vec![MonthlyBar {
                month: "2024-01-01".into(),
                open: 10.0,
                high: 15.0,
                low: 8.0,
                close: 9.5,
                volume: 350.0,
            }]
        );
    }

    #[test]
    fn keeps_trailing_months_oldest_first() {
        let bars: Vec<OhlcvBar> = (1..=8)
            .map(|m| OhlcvBar::new(d(m, 10), m as f64, m as f64, m as f64, m as f64, 1.0))
            .collect();
        let out = rollup(&frame(bars), DEFAULT_MONTHS);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0].month, "2024-03-01");
        assert_eq!(out[5].month, "2024-08-01");
    }

    #[test]
    fn null_cells_are_skipped() {
        let mut first = OhlcvBar::new(d(2, 1), 0.0, 5.0, 4.0, 4.5, 10.0);
        first.open = None;
        let mut last = OhlcvBar::new(d(2, 2), 4.6, 6.0, 3.0, 0.0, 10.0);
        last.close = None;
        let out = rollup(&frame(vec![first, last]), DEFAULT_MONTHS);
        assert_eq!(out[0].open, 4.6);
        assert_eq!(out[0].close, 4.5);
        assert_eq!(out[0].low, 3.0);
    }

    #[test]
    fn empty_and_void_months_are_dropped() {
        let f = frame(vec![
            OhlcvBar::new(d(1, 5), 1.0, 1.0, 1.0, 1.0, 1.0),
            OhlcvBar::void(d(2, 5)),
            OhlcvBar::new(d(4, 5), 2.0, 2.0, 2.0, 2.0, 2.0),
        ]);
        let out = rollup(&f, DEFAULT_MONTHS);
        let months: Vec<&str> = out.iter().map(|b| b.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01-01", "2024-04-01"]);
    }

    #[test]
    fn partial_field_set_yields_nothing() {
        let fields: BTreeSet<Field> = [Field::Open, Field::Close].into_iter().collect();
        let f = OhlcvFrame::with_fields(
            normalize("TCS"),
            fields,
            vec![OhlcvBar::new(d(1, 5), 1.0, 1.0, 1.0, 1.0, 1.0)],
        );
        assert!(rollup(&f, DEFAULT_MONTHS).is_empty());
    }

    #[test]
    fn empty_frame_yields_nothing() {
        assert!(rollup(&frame(vec![]), DEFAULT_MONTHS).is_empty());
    }
}
