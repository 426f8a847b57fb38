//! MarketPulse Core: quote aggregation over a batch market-data provider.
//!
//! This crate contains:
//! - Domain types (symbols, daily and monthly bars, ticker payloads)
//! - Ticker normalization and display keys
//! - A process-wide TTL cache behind a trait seam
//! - Providers (Yahoo Finance, wide CSV, synthetic) and a timeout-bounded batch fetcher
//! - Batch reshaping and the calendar-month roll-up
//! - The quote aggregation pipeline with benchmark backfill
//! - Field snapshots, price ranges and history export

pub mod cache;
pub mod config;
pub mod data;
pub mod domain;
pub mod export;
pub mod quotes;
pub mod service;
pub mod services;
pub mod validation;

pub use cache::{Cache, CacheStore, Namespace, TtlCache};
pub use config::{ConfigError, MarketConfig};
pub use service::{MarketService, QuoteError};
