//! Latest-row quote snapshots.

use crate::cache::{composite_key, Namespace};
use crate::data::{reshape, Interval, OhlcvFrame, Period};
use crate::service::{MarketService, QuoteError};
use crate::validation::{validate_fields, validate_tickers, QuoteField};
use std::collections::BTreeMap;

/// Requested field name to value.
pub type FieldQuoteRow = BTreeMap<String, Option<f64>>;

/// Uppercased ticker to its snapshot row.
pub type FieldQuoteMap = BTreeMap<String, FieldQuoteRow>;

const SNAPSHOT_PERIOD: Period = Period::FiveDays;

impl MarketService {
    /// Snapshot the requested fields of each ticker's latest daily bar.
    ///
    /// Unknown fields are dropped; an empty selection means close,
    /// previousClose and volume. A ticker the provider does not know gets
    /// every field null.
    pub fn field_quotes<S, F>(&self, tickers: &[S], fields: &[F]) -> Result<FieldQuoteMap, QuoteError>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        validate_tickers(tickers)?;
        let fields = validate_fields(fields);

        let key = Namespace::Fields.key(&request_key(tickers, &fields));
        let ttl = self.config.quotes_ttl();
        if let Some(hit) = self.caches.fields.get(&key, ttl) {
            tracing::debug!(%key, "field quotes cache hit");
            return Ok(hit);
        }

        let symbols = self.rules.batch_normalize(tickers);
        let batch = self.fetcher.fetch(&symbols, SNAPSHOT_PERIOD, Interval::OneDay)?;

        let mut out = FieldQuoteMap::new();
        for ticker in tickers {
            let ticker = ticker.as_ref();
            let frame = reshape::extract(&batch, &self.rules.normalize(ticker));
            out.insert(ticker.to_uppercase(), snapshot(frame.as_ref(), &fields));
        }

        self.caches.fields.set(&key, out.clone());
        Ok(out)
    }
}

fn request_key<S: AsRef<str>>(tickers: &[S], fields: &[QuoteField]) -> String {
    let mut parts: Vec<String> = tickers.iter().map(|t| format!("t={}", t.as_ref())).collect();
    parts.extend(fields.iter().map(|f| format!("f={f}")));
    composite_key(&parts)
}

fn snapshot(frame: Option<&OhlcvFrame>, fields: &[QuoteField]) -> FieldQuoteRow {
    let (last, prev) = match frame.map(|f| f.tail(2)) {
        Some([prev, last]) => (Some(last), Some(prev)),
        Some([last]) => (Some(last), None),
        _ => (None, None),
    };
    fields
        .iter()
        .map(|f| {
            let value = match f {
                QuoteField::Close => last.and_then(|b| b.close),
                QuoteField::PreviousClose => prev.and_then(|b| b.close),
                QuoteField::Open => last.and_then(|b| b.open),
                QuoteField::High => last.and_then(|b| b.high),
                QuoteField::Low => last.and_then(|b| b.low),
                QuoteField::Volume => last.and_then(|b| b.volume),
            };
            (f.as_str().to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{normalize, OhlcvBar};
    use chrono::NaiveDate;

    fn frame(closes: &[f64]) -> OhlcvFrame {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 2 + i as u32).unwrap();
                OhlcvBar::new(date, c - 1.0, c + 1.0, c - 2.0, *c, 1000.0)
            })
            .collect();
        OhlcvFrame::new(normalize("TCS"), bars)
    }

    #[test]
    fn snapshot_reads_last_two_rows() {
        let f = frame(&[10.0, 11.0, 12.0]);
        let row = snapshot(Some(&f), &QuoteField::ALL);
        assert_eq!(row["close"], Some(12.0));
        assert_eq!(row["previousClose"], Some(11.0));
        assert_eq!(row["open"], Some(11.0));
        assert_eq!(row["volume"], Some(1000.0));
    }

    #[test]
    fn single_row_has_no_previous_close() {
        let row = snapshot(Some(&frame(&[10.0])), &QuoteField::DEFAULT);
        assert_eq!(row["close"], Some(10.0));
        assert_eq!(row["previousClose"], None);
    }

    #[test]
    fn missing_frame_is_all_null() {
        let row = snapshot(None, &QuoteField::DEFAULT);
        assert_eq!(row.len(), 3);
        assert!(row.values().all(Option::is_none));
    }

    #[test]
    fn request_key_is_order_insensitive() {
        let fields = [QuoteField::Close, QuoteField::Volume];
        let reversed = [QuoteField::Volume, QuoteField::Close];
        assert_eq!(request_key(&["TCS", "INFY"], &fields), request_key(&["INFY", "TCS"], &reversed));
        assert_ne!(request_key(&["TCS"], &fields), request_key(&["TCS"], &QuoteField::DEFAULT));
    }
}
