//! The shared market service: provider, caches and configuration.
//!
//! One `MarketService` is built at startup and shared by every request.
//! The operations themselves live next to their logic: quote aggregation in
//! [`crate::quotes`], snapshots and ranges in [`crate::services`].

use crate::cache::CacheStore;
use crate::config::MarketConfig;
use crate::data::{reshape, BatchFetcher, DataError, Interval, MarketDataProvider, OhlcvFrame, Period};
use crate::domain::{NormalizedSymbol, SymbolRules};
use crate::validation::ValidationError;
use std::sync::Arc;
use thiserror::Error;

/// Errors a caller of the market service can see.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("upstream fetch failed: {0}")]
    Upstream(DataError),

    #[error("upstream fetch timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl QuoteError {
    /// HTTP status an API layer should answer with.
    pub fn status_hint(&self) -> u16 {
        match self {
            QuoteError::Validation(_) => 400,
            QuoteError::Upstream(_) => 502,
            QuoteError::Timeout { .. } => 504,
        }
    }
}

impl From<DataError> for QuoteError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Timeout { secs } => QuoteError::Timeout { secs },
            other => QuoteError::Upstream(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketService {
    pub(crate) fetcher: BatchFetcher,
    pub(crate) caches: CacheStore,
    pub(crate) config: MarketConfig,
    pub(crate) rules: SymbolRules,
    pub(crate) benchmarks: Vec<NormalizedSymbol>,
}

impl MarketService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, caches: CacheStore, config: MarketConfig) -> Self {
        let fetcher = BatchFetcher::new(provider, config.fetch_timeout());
        let rules = config.symbol_rules();
        let benchmarks = config.benchmark_symbols();
        tracing::debug!(
            provider = fetcher.provider_name(),
            benchmarks = ?benchmarks,
            ttl_secs = config.cache.ttl_quotes_secs,
            "market service ready"
        );
        Self {
            fetcher,
            caches,
            config,
            rules,
            benchmarks,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn rules(&self) -> &SymbolRules {
        &self.rules
    }

    pub fn benchmarks(&self) -> &[NormalizedSymbol] {
        &self.benchmarks
    }

    pub fn caches(&self) -> &CacheStore {
        &self.caches
    }

    /// Admin cache clear. `None` drops everything.
    pub fn clear_cache(&self, prefix: Option<&str>) -> usize {
        self.caches.clear(prefix)
    }

    /// Daily history of one ticker, uncached. `None` if the provider has no
    /// data for it.
    pub fn history(&self, ticker: &str, period: Period) -> Result<Option<OhlcvFrame>, QuoteError> {
        crate::validation::validate_tickers(&[ticker])?;
        let symbol = self.rules.normalize(ticker);
        let batch = self
            .fetcher
            .fetch(std::slice::from_ref(&symbol), period, Interval::OneDay)?;
        Ok(reshape::extract(&batch, &symbol))
    }
}
