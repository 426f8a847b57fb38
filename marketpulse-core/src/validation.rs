//! Request validation and lenient parameter parsing.

use crate::data::{Interval, Period};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_WINDOW_DAYS: usize = 252;
pub const MAX_WINDOW_DAYS: i64 = 1095;
pub const FALLBACK_PERIOD: Period = Period::FiveDays;
pub const FALLBACK_INTERVAL: Interval = Interval::FiveMinutes;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tickers must be a non-empty list")]
    EmptyTickers,

    #[error("ticker at position {index} is blank")]
    BlankTicker { index: usize },
}

/// Reject an empty ticker list or any blank entry.
pub fn validate_tickers<S: AsRef<str>>(tickers: &[S]) -> Result<(), ValidationError> {
    if tickers.is_empty() {
        return Err(ValidationError::EmptyTickers);
    }
    match tickers.iter().position(|t| t.as_ref().trim().is_empty()) {
        Some(index) => Err(ValidationError::BlankTicker { index }),
        None => Ok(()),
    }
}

/// A field of a quote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuoteField {
    Close,
    PreviousClose,
    Open,
    High,
    Low,
    Volume,
}

impl QuoteField {
    pub const ALL: [QuoteField; 6] = [
        QuoteField::Close,
        QuoteField::PreviousClose,
        QuoteField::Open,
        QuoteField::High,
        QuoteField::Low,
        QuoteField::Volume,
    ];

    pub const DEFAULT: [QuoteField; 3] =
        [QuoteField::Close, QuoteField::PreviousClose, QuoteField::Volume];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteField::Close => "close",
            QuoteField::PreviousClose => "previousClose",
            QuoteField::Open => "open",
            QuoteField::High => "high",
            QuoteField::Low => "low",
            QuoteField::Volume => "volume",
        }
    }

    pub fn parse(s: &str) -> Option<QuoteField> {
        QuoteField::ALL.into_iter().find(|f| f.as_str() == s.trim())
    }
}

impl fmt::Display for QuoteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep the known fields, deduplicated in request order. Nothing known
/// (including an empty request) means the default snapshot.
pub fn validate_fields<S: AsRef<str>>(fields: &[S]) -> Vec<QuoteField> {
    let mut out = Vec::new();
    for f in fields.iter().filter_map(|f| QuoteField::parse(f.as_ref())) {
        if !out.contains(&f) {
            out.push(f);
        }
    }
    if out.is_empty() {
        out.extend(QuoteField::DEFAULT);
    }
    out
}

/// Parse a period, falling back to 5d.
pub fn validate_period(raw: &str) -> Period {
    raw.trim().parse().unwrap_or(FALLBACK_PERIOD)
}

/// Parse an interval, falling back to 5m.
pub fn validate_interval(raw: &str) -> Interval {
    raw.trim().parse().unwrap_or(FALLBACK_INTERVAL)
}

pub fn clamp_window_days(n: i64) -> usize {
    n.clamp(1, MAX_WINDOW_DAYS) as usize
}

/// Clamp a textual window; anything unparseable is the default 252.
pub fn parse_window_days(raw: &str) -> usize {
    raw.trim()
        .parse::<i64>()
        .map(clamp_window_days)
        .unwrap_or(DEFAULT_WINDOW_DAYS)
}
