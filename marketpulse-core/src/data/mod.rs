//! Market data: providers, batch fetching, reshaping and monthly roll-up.

pub mod circuit_breaker;
pub mod csv_import;
pub mod fetch;
pub mod frame;
pub mod provider;
pub mod reshape;
pub mod rollup;
pub mod synthetic;
pub mod table;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_import::CsvProvider;
pub use fetch::BatchFetcher;
pub use frame::{BatchResult, Field, OhlcvFrame};
pub use provider::{DataError, DataSource, Interval, MarketDataProvider, Period};
pub use rollup::rollup;
pub use synthetic::SyntheticProvider;
pub use table::{ColumnKey, WideTable};
pub use yahoo::YahooProvider;
