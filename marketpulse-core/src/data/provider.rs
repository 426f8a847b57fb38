//! Market data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over data sources (Yahoo Finance,
//! wide CSV import, synthetic bars) so we can swap implementations and mock
//! for tests. Providers answer one batch per call: every requested symbol,
//! one (period, interval) window.

use super::frame::BatchResult;
use crate::domain::NormalizedSymbol;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structured error types for data operations.
///
/// A failed batch is failed as a whole. A symbol the provider does not know
/// is not an error: it is simply absent from the [`BatchResult`].
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("upstream fetch timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{provider} does not support interval {interval}")]
    UnsupportedInterval { provider: String, interval: Interval },

    #[error("invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("invalid interval '{0}'")]
    InvalidInterval(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Lookback window of a batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::SixMonths,
        Period::OneYear,
    ];

    /// Provider spelling ("1mo", "6mo", ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
        }
    }

    /// Calendar days covered, for providers that filter by date.
    pub fn calendar_days(&self) -> i64 {
        match self {
            Period::OneDay => 1,
            Period::FiveDays => 5,
            Period::OneMonth => 31,
            Period::SixMonths => 183,
            Period::OneYear => 366,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DataError::InvalidPeriod(s.to_string()))
    }
}

/// Bar size of a batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub const ALL: [Interval; 4] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneDay => "1d",
        }
    }

    pub fn is_daily(&self) -> bool {
        matches!(self, Interval::OneDay)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| DataError::InvalidInterval(s.to_string()))
    }
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Synthetic,
}

/// Trait for market data providers (Yahoo Finance, CSV import, etc).
///
/// Implementations handle the specifics of one source and return a
/// [`BatchResult`] that is already keyed by symbol, whatever shape the source
/// delivers. The cache layer sits above this trait: providers don't know
/// about it.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Which kind of source this is.
    fn source(&self) -> DataSource;

    /// Fetch one window of bars for every symbol in a single batch.
    fn download(
        &self,
        symbols: &[NormalizedSymbol],
        period: Period,
        interval: Interval,
    ) -> Result<BatchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
