//! Timeout-bounded batch fetching.
//!
//! Provider clients are blocking and may hang past any reasonable deadline.
//! Each batch runs on its own thread; the caller waits at most `timeout` and
//! then walks away. An abandoned call keeps running and its result is
//! dropped, so nothing it does can corrupt the caller's state.

use super::frame::BatchResult;
use super::provider::{DataError, Interval, MarketDataProvider, Period};
use crate::domain::NormalizedSymbol;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Issues one provider call per batch, bounded by a timeout.
#[derive(Clone)]
pub struct BatchFetcher {
    provider: Arc<dyn MarketDataProvider>,
    timeout: Duration,
}

impl BatchFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch one window for every symbol in a single provider call.
    ///
    /// The batch fails as a whole: on error or timeout nothing is returned.
    /// Frames for symbols that were not requested are discarded.
    pub fn fetch(
        &self,
        symbols: &[NormalizedSymbol],
        period: Period,
        interval: Interval,
    ) -> Result<BatchResult, DataError> {
        if symbols.is_empty() {
            return Ok(BatchResult::new());
        }

        let started = Instant::now();
        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let requested = symbols.to_vec();
        std::thread::Builder::new()
            .name(format!("fetch-{period}"))
            .spawn(move || {
                let result = provider.download(&requested, period, interval);
                // The receiver is gone if the caller timed out.
                let _ = tx.send(result);
            })?;

        let mut batch = match rx.recv_timeout(self.timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    %period,
                    symbols = symbols.len(),
                    timeout_secs = self.timeout.as_secs(),
                    "batch fetch timed out"
                );
                return Err(DataError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(DataError::Other("fetch worker exited without a result".into()))
            }
        };

        batch.retain_requested(symbols);
        tracing::info!(
            provider = self.provider.name(),
            %period,
            %interval,
            requested = symbols.len(),
            resolved = batch.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch fetched"
        );
        Ok(batch)
    }

    /// [`fetch`](Self::fetch) with up to `retries` extra attempts, sleeping
    /// `backoff * 2^n` between them.
    pub fn fetch_with_retry(
        &self,
        symbols: &[NormalizedSymbol],
        period: Period,
        interval: Interval,
        retries: u32,
        backoff: Duration,
    ) -> Result<BatchResult, DataError> {
        let mut attempt = 0;
        loop {
            match self.fetch(symbols, period, interval) {
                Ok(batch) => return Ok(batch),
                Err(DataError::CircuitBreakerTripped) => return Err(DataError::CircuitBreakerTripped),
                Err(e) if attempt < retries => {
                    let delay = backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, ?delay, %period, "retrying batch fetch");
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for BatchFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchFetcher")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::OhlcvFrame;
    use crate::data::provider::DataSource;
    use crate::domain::normalize;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers with empty frames after an optional delay, failing the first
    /// `failures` calls.
    struct Stub {
        delay: Duration,
        failures: u32,
        calls: AtomicU32,
    }

    impl Stub {
        fn new(delay: Duration, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                delay,
                failures,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl MarketDataProvider for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn source(&self) -> DataSource {
            DataSource::Synthetic
        }

        fn download(
            &self,
            symbols: &[NormalizedSymbol],
            _period: Period,
            _interval: Interval,
        ) -> Result<BatchResult, DataError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if n < self.failures {
                return Err(DataError::NetworkUnreachable("stub".into()));
            }
            let mut batch: BatchResult = symbols
                .iter()
                .map(|s| OhlcvFrame::new(s.clone(), vec![]))
                .collect();
            batch.insert(OhlcvFrame::new(normalize("EXTRA"), vec![]));
            Ok(batch)
        }
    }

    #[test]
    fn drops_unrequested_frames() {
        let fetcher = BatchFetcher::new(Stub::new(Duration::ZERO, 0), Duration::from_secs(5));
        let batch = fetcher
            .fetch(&[normalize("TCS")], Period::OneMonth, Interval::OneDay)
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch.contains(&normalize("TCS")));
    }

    #[test]
    fn empty_request_skips_provider() {
        let stub = Stub::new(Duration::ZERO, 0);
        let fetcher = BatchFetcher::new(stub.clone(), Duration::from_secs(5));
        assert!(fetcher.fetch(&[], Period::OneMonth, Interval::OneDay).unwrap().is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn slow_provider_times_out() {
        let fetcher = BatchFetcher::new(
            Stub::new(Duration::from_millis(500), 0),
            Duration::from_millis(20),
        );
        let err = fetcher
            .fetch(&[normalize("TCS")], Period::OneMonth, Interval::OneDay)
            .unwrap_err();
        assert!(matches!(err, DataError::Timeout { .. }));
    }

    #[test]
    fn retry_recovers_from_one_failure() {
        let stub = Stub::new(Duration::ZERO, 1);
        let fetcher = BatchFetcher::new(stub.clone(), Duration::from_secs(5));
        let batch = fetcher
            .fetch_with_retry(&[normalize("TCS")], Period::OneMonth, Interval::OneDay, 1, Duration::ZERO)
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let stub = Stub::new(Duration::ZERO, 5);
        let fetcher = BatchFetcher::new(stub.clone(), Duration::from_secs(5));
        let result =
            fetcher.fetch_with_retry(&[normalize("TCS")], Period::OneMonth, Interval::OneDay, 2, Duration::ZERO);
        assert!(result.is_err());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }
}
