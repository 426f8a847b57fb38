//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. The chart API answers
//! one symbol per request, so a batch is fanned out over the rayon pool and
//! merged back into a single [`BatchResult`]. Any failing symbol fails the
//! whole batch; a symbol Yahoo does not know is simply left out.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! The CSV import path is the offline fallback when Yahoo is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::frame::{BatchResult, OhlcvFrame};
use super::provider::{DataError, DataSource, Interval, MarketDataProvider, Period};
use crate::domain::{NormalizedSymbol, OhlcvBar};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    /// Build a provider whose HTTP client gives up after `timeout`.
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    fn chart_url(symbol: &NormalizedSymbol, period: Period, interval: Interval) -> String {
        format!(
            "{CHART_BASE}/{symbol}?range={}&interval={}&includePrePost=false",
            period.as_str(),
            interval.as_str()
        )
    }

    /// Parse one chart response. `Ok(None)` means Yahoo has no data for the
    /// symbol.
    fn parse_response(
        symbol: &NormalizedSymbol,
        resp: ChartResponse,
    ) -> Result<Option<OhlcvFrame>, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => return Ok(None),
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(None);
        };
        // Listed but no trading in the window.
        let Some(timestamps) = data.timestamp else {
            return Ok(None);
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let offset = data.meta.gmtoffset;
        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = exchange_date(ts, offset).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            bars.push(OhlcvBar {
                date,
                open: cell(&quote.open, i),
                high: cell(&quote.high, i),
                low: cell(&quote.low, i),
                close: cell(&quote.close, i),
                volume: cell(&quote.volume, i),
            });
        }

        Ok(Some(OhlcvFrame::new(symbol.clone(), bars)))
    }

    /// Fetch one symbol with retry and circuit breaker logic.
    fn fetch_symbol(
        &self,
        symbol: &NormalizedSymbol,
        period: Period,
        interval: Interval,
    ) -> Result<Option<OhlcvFrame>, DataError> {
        let url = Self::chart_url(symbol, period, interval);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                tracing::debug!(%symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                self.circuit_breaker.record_success();
                return Ok(None);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;
            let frame = Self::parse_response(symbol, chart)?;
            self.circuit_breaker.record_success();
            return Ok(frame);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

fn cell(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}

/// Calendar date of a bar in the exchange's own time zone.
fn exchange_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn source(&self) -> DataSource {
        DataSource::YahooFinance
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

        let frames = symbols
            .par_iter()
            .map(|s| self.fetch_symbol(s, period, interval))
            .collect::<Result<Vec<_>, DataError>>()?;

        Ok(frames.into_iter().flatten().collect())
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
