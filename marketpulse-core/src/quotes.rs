//! Quote aggregation.
//!
//! A request runs two batch fetches side by side:
//!
//! - the short window (default 1mo) for every symbol without a fresh
//!   `quotes` entry. Its failure fails the request.
//! - the long window (default 6mo) for every symbol without a fresh
//!   `monthly` entry. Its failure is logged and the response simply carries
//!   no `monthly_ohlc`.
//!
//! Benchmarks ride along in both and always appear in the result under their
//! display keys.

use crate::cache::Namespace;
use crate::data::{reshape, rollup, BatchResult, DataError, Interval};
use crate::domain::{MonthlyBar, NormalizedSymbol, QuoteMap, TickerPayload};
use crate::service::{MarketService, QuoteError};
use crate::validation::validate_tickers;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

type Rollups = BTreeMap<NormalizedSymbol, Option<Vec<MonthlyBar>>>;

impl MarketService {
    /// Aggregate quotes for `tickers` plus the configured benchmarks.
    ///
    /// Every distinct ticker appears uppercased as a key; benchmarks appear
    /// under their display keys (`NSEI`, `BSESN`).
    pub fn aggregate<S: AsRef<str>>(&self, tickers: &[S]) -> Result<QuoteMap, QuoteError> {
        validate_tickers(tickers)?;
        let started = Instant::now();

        let mut seen = HashSet::new();
        let unique: Vec<&str> = tickers
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| seen.insert(*t))
            .collect();
        let symbols = self.rules.with_benchmarks(&unique, &self.benchmarks);

        let ttl = self.config.quotes_ttl();
        let mut payloads: BTreeMap<NormalizedSymbol, TickerPayload> = BTreeMap::new();
        let mut quote_misses = Vec::new();
        let mut rollups = Rollups::new();
        let mut rollup_misses = Vec::new();
        for sym in &symbols {
            match self.caches.quotes.get(&Namespace::Quotes.key(sym.as_str()), ttl) {
                Some(p) => {
                    payloads.insert(sym.clone(), p);
                }
                None => quote_misses.push(sym.clone()),
            }
            match self.caches.monthly.get(&Namespace::Monthly.key(sym.as_str()), ttl) {
                Some(m) => {
                    rollups.insert(sym.clone(), m);
                }
                None => rollup_misses.push(sym.clone()),
            }
        }
        tracing::debug!(
            quote_hits = payloads.len(),
            quote_misses = quote_misses.len(),
            rollup_hits = rollups.len(),
            rollup_misses = rollup_misses.len(),
            "cache lookup"
        );

        let (short, long) = rayon::join(
            || self.fetch_short_window(&quote_misses),
            || self.fetch_long_window(&rollup_misses),
        );

        // Roll-ups are cached before the short window can fail the request,
        // so finished work still serves the next caller.
        let rollups = match long {
            Ok(batch) => {
                rollups.extend(self.compute_rollups(&batch, &rollup_misses));
                Some(rollups)
            }
            Err(e) => {
                tracing::warn!(error = %e, "monthly roll-up skipped");
                None
            }
        };

        let batch = short?;
        let fresh: Vec<(NormalizedSymbol, TickerPayload)> = quote_misses
            .par_iter()
            .map(|sym| (sym.clone(), self.build_payload(&batch, sym)))
            .collect();
        for (sym, payload) in fresh {
            self.caches.quotes.set(&Namespace::Quotes.key(sym.as_str()), payload.clone());
            payloads.insert(sym, payload);
        }

        let currency = &self.config.market.currency;
        let mut result = QuoteMap::new();
        for ticker in &unique {
            let sym = self.rules.normalize(ticker);
            let payload = payloads
                .get(&sym)
                .cloned()
                .unwrap_or_else(|| TickerPayload::unresolved(&sym, currency));
            result.insert(ticker.to_uppercase(), payload);
        }
        for bench in &self.benchmarks {
            let payload = payloads
                .get(bench)
                .cloned()
                .unwrap_or_else(|| TickerPayload::unresolved(bench, currency));
            let key = self.result_key(&result, bench);
            result.entry(key).or_insert(payload);
        }

        if let Some(rollups) = rollups {
            self.attach_rollups(&mut result, &symbols, &rollups);
        }

        tracing::info!(
            tickers = unique.len(),
            fetched = quote_misses.len(),
            keys = result.len(),
            resolved = result.values().filter(|p| p.is_resolved()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "quotes aggregated"
        );
        Ok(result)
    }

    fn fetch_short_window(&self, symbols: &[NormalizedSymbol]) -> Result<BatchResult, DataError> {
        let fetch = &self.config.fetch;
        self.fetcher.fetch_with_retry(
            symbols,
            fetch.short_period,
            Interval::OneDay,
            fetch.short_window_retries,
            self.config.retry_backoff(),
        )
    }

    fn fetch_long_window(&self, symbols: &[NormalizedSymbol]) -> Result<BatchResult, DataError> {
        self.fetcher
            .fetch(symbols, self.config.fetch.long_period, Interval::OneDay)
    }

    /// Quote and short-window bars of one symbol; the unresolved default if
    /// the batch has nothing usable for it.
    fn build_payload(&self, batch: &BatchResult, sym: &NormalizedSymbol) -> TickerPayload {
        let currency = &self.config.market.currency;
        match reshape::extract(batch, sym) {
            Some(frame) => TickerPayload {
                raw_ticker: sym.to_string(),
                currency: currency.clone(),
                last_price: frame.last_close(),
                ohlcv: frame.bars,
                monthly_ohlc: None,
            },
            None => {
                tracing::debug!(symbol = %sym, "no short-window data");
                TickerPayload::unresolved(sym, currency)
            }
        }
    }

    /// Roll up every symbol of the long-window batch and cache the result.
    /// A symbol absent from the batch is cached as `None`.
    fn compute_rollups(&self, batch: &BatchResult, symbols: &[NormalizedSymbol]) -> Rollups {
        let months = self.config.fetch.monthly_bars;
        let computed: Vec<(NormalizedSymbol, Option<Vec<MonthlyBar>>)> = symbols
            .par_iter()
            .map(|sym| {
                let monthly = reshape::extract(batch, sym).map(|f| rollup(&f, months));
                (sym.clone(), monthly)
            })
            .collect();

        for (sym, monthly) in &computed {
            self.caches
                .monthly
                .set(&Namespace::Monthly.key(sym.as_str()), monthly.clone());
        }
        computed.into_iter().collect()
    }

    /// Key of `sym` in the result: its display key, unless a payload for a
    /// different symbol already holds it, then the symbol itself
    /// (`NSEI` taken by `NSEI.NS` puts the index under `^NSEI`).
    fn result_key(&self, result: &QuoteMap, sym: &NormalizedSymbol) -> String {
        let key = self.rules.display_key(sym);
        match result.get(&key) {
            Some(held) if held.raw_ticker != sym.as_str() => sym.to_string(),
            _ => key,
        }
    }

    /// Attach each symbol's roll-up to the payload under its result key,
    /// inserting a minimal payload when that key is missing.
    fn attach_rollups(&self, result: &mut QuoteMap, symbols: &[NormalizedSymbol], rollups: &Rollups) {
        let currency = &self.config.market.currency;
        for sym in symbols {
            let Some(Some(monthly)) = rollups.get(sym) else {
                continue;
            };
            let key = self.result_key(result, sym);
            result
                .entry(key)
                .and_modify(|p| p.monthly_ohlc = Some(monthly.clone()))
                .or_insert_with(|| TickerPayload::monthly_only(sym, currency, monthly.clone()));
        }
    }
}
