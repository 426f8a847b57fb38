//! Trailing high/low ranges.

use crate::cache::{composite_key, Namespace};
use crate::data::{reshape, Interval, OhlcvFrame, Period};
use crate::service::{MarketService, QuoteError};
use crate::validation::{clamp_window_days, validate_tickers};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// High, low and current price over a trailing window of trading days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub current: Option<f64>,
    /// Trading days actually covered; 0 when the ticker had no data.
    pub window_days: usize,
}

impl PriceRange {
    pub fn empty() -> Self {
        Self {
            high: None,
            low: None,
            current: None,
            window_days: 0,
        }
    }

    /// Range over the last `window` bars of `frame`.
    pub fn over(frame: &OhlcvFrame, window: usize) -> Self {
        let recent = frame.tail(window);
        let high = recent.iter().filter_map(|b| b.high).reduce(f64::max);
        let low = recent.iter().filter_map(|b| b.low).reduce(f64::min);
        let current = recent.iter().rev().find_map(|b| b.close);
        Self {
            high,
            low,
            current,
            window_days: recent.len(),
        }
    }
}

/// Uppercased ticker to its range.
pub type RangeMap = BTreeMap<String, PriceRange>;

/// Windows longer than this need a year of history.
const SIX_MONTH_WINDOW_LIMIT: usize = 180;

impl MarketService {
    /// Price range of each ticker over its last `window_days` trading days
    /// (clamped to 1..=1095).
    pub fn price_ranges<S: AsRef<str>>(&self, tickers: &[S], window_days: i64) -> Result<RangeMap, QuoteError> {
        validate_tickers(tickers)?;
        let window = clamp_window_days(window_days);

        let mut parts: Vec<String> = tickers.iter().map(|t| format!("t={}", t.as_ref())).collect();
        parts.push(format!("w={window}"));
        let key = Namespace::Ranges.key(&composite_key(&parts));
        if let Some(hit) = self.caches.ranges.get(&key, self.config.quotes_ttl()) {
            tracing::debug!(%key, "price ranges cache hit");
            return Ok(hit);
        }

        let period = if window > SIX_MONTH_WINDOW_LIMIT {
            Period::OneYear
        } else {
            Period::SixMonths
        };
        let symbols = self.rules.batch_normalize(tickers);
        let batch = self.fetcher.fetch(&symbols, period, Interval::OneDay)?;

        let mut out = RangeMap::new();
        for ticker in tickers {
            let ticker = ticker.as_ref();
            let range = match reshape::extract(&batch, &self.rules.normalize(ticker)) {
                Some(frame) => PriceRange::over(&frame, window),
                None => PriceRange::empty(),
            };
            out.insert(ticker.to_uppercase(), range);
        }

        self.caches.ranges.set(&key, out.clone());
        Ok(out)
    }
}
