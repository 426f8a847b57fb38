//! Deterministic synthetic quotes for demos and offline runs.

use super::frame::{BatchResult, OhlcvFrame};
use super::provider::{DataError, DataSource, Interval, MarketDataProvider, Period};
use crate::domain::{NormalizedSymbol, OhlcvBar};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Symbols with this prefix are unknown to the synthetic market.
pub const UNKNOWN_PREFIX: &str = "FAKE";

/// Random-walk provider seeded by the symbol name.
///
/// The same symbol always produces the same series for a given `as_of`
/// date, and a shorter period is always a suffix of a longer one.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    as_of: NaiveDate,
}

impl SyntheticProvider {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Series ending today.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    fn series(&self, symbol: &NormalizedSymbol, period: Period) -> Vec<OhlcvBar> {
        let longest = Period::OneYear.calendar_days();
        let first = self.as_of - Duration::days(longest - 1);
        let cut = self.as_of - Duration::days(period.calendar_days() - 1);
        generate_bars(symbol.as_str(), first, self.as_of)
            .into_iter()
            .filter(|b| b.date >= cut)
            .collect()
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
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

        Ok(symbols
            .iter()
            .filter(|s| !s.as_str().starts_with(UNKNOWN_PREFIX))
            .map(|s| OhlcvFrame::new(s.clone(), self.series(s, period)))
            .collect())
    }
}

/// Weekday bars between `start` and `end`, inclusive.
fn generate_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<OhlcvBar> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    // Indices trade in the tens of thousands, equities in the hundreds.
    let mut price = if symbol.starts_with('^') {
        rng.gen_range(15_000.0..75_000.0)
    } else {
        rng.gen_range(100.0..4_000.0)
    };

    let mut bars = Vec::new();
    let mut current = start;
    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(OhlcvBar::new(current, open, high, low, close, volume));
        price = close;
        current += Duration::days(1);
    }

    bars
}
