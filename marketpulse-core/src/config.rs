//! Runtime configuration.
//!
//! Loaded from a TOML file where every field is optional, then patched from
//! the environment:
//!
//! ```toml
//! [market]
//! default_suffix = ".NS"
//! benchmarks = ["^NSEI", "^BSESN"]
//!
//! [cache]
//! ttl_quotes_secs = 60
//!
//! [fetch]
//! timeout_secs = 20
//! ```

use crate::data::Period;
use crate::domain::{NormalizedSymbol, SymbolRules};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_TTL_QUOTES: &str = "CACHE_TTL_QUOTES";
pub const ENV_FETCH_TIMEOUT: &str = "MARKETPULSE_FETCH_TIMEOUT";

/// Upper bound on configured retry counts.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {name}='{value}' is not a valid number")]
    BadEnv { name: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSection {
    pub default_suffix: String,
    pub index_marker: char,
    pub separator: char,
    pub currency: String,
    pub benchmarks: Vec<String>,
}

impl Default for MarketSection {
    fn default() -> Self {
        let rules = SymbolRules::default();
        Self {
            default_suffix: rules.default_suffix,
            index_marker: rules.index_marker,
            separator: rules.separator,
            currency: "INR".into(),
            benchmarks: vec!["^NSEI".into(), "^BSESN".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_quotes_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { ttl_quotes_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_secs: u64,
    /// Extra attempts for the short-window batch only.
    pub short_window_retries: u32,
    pub retry_backoff_ms: u64,
    pub short_period: Period,
    pub long_period: Period,
    pub monthly_bars: usize,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            short_window_retries: 1,
            retry_backoff_ms: 500,
            short_period: Period::OneMonth,
            long_period: Period::SixMonths,
            monthly_bars: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub circuit_breaker_cooldown_secs: u64,
    pub circuit_breaker_threshold: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            circuit_breaker_cooldown_secs: 30 * 60,
            circuit_breaker_threshold: 3,
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub market: MarketSection,
    pub cache: CacheSection,
    pub fetch: FetchSection,
    pub provider: ProviderSection,
}

impl MarketConfig {
    /// Load from a TOML file. Does not read the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = parse_env(&lookup, ENV_TTL_QUOTES)? {
            self.cache.ttl_quotes_secs = secs;
        }
        if let Some(secs) = parse_env(&lookup, ENV_FETCH_TIMEOUT)? {
            self.fetch.timeout_secs = secs;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.market;
        if m.default_suffix.is_empty() {
            return Err(ConfigError::Invalid("market.default_suffix is empty".into()));
        }
        // Without the separator, a suffixed symbol would be suffixed again.
        if !m.default_suffix.contains(m.separator) {
            return Err(ConfigError::Invalid(format!(
                "market.default_suffix '{}' must contain separator '{}'",
                m.default_suffix, m.separator
            )));
        }
        if m.benchmarks.iter().all(|b| b.trim().is_empty()) {
            return Err(ConfigError::Invalid("market.benchmarks is empty".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be positive".into()));
        }
        if self.fetch.monthly_bars == 0 {
            return Err(ConfigError::Invalid("fetch.monthly_bars must be positive".into()));
        }
        if self.provider.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "provider.max_retries must be at most {MAX_RETRIES}"
            )));
        }
        if self.fetch.short_window_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "fetch.short_window_retries must be at most {MAX_RETRIES}"
            )));
        }
        Ok(())
    }

    pub fn symbol_rules(&self) -> SymbolRules {
        SymbolRules {
            default_suffix: self.market.default_suffix.clone(),
            index_marker: self.market.index_marker,
            separator: self.market.separator,
        }
    }

    /// Benchmarks in provider form, blanks and duplicates dropped.
    pub fn benchmark_symbols(&self) -> Vec<NormalizedSymbol> {
        let names: Vec<&str> = self
            .market
            .benchmarks
            .iter()
            .map(String::as_str)
            .filter(|b| !b.trim().is_empty())
            .collect();
        self.symbol_rules().batch_normalize(&names)
    }

    pub fn quotes_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_quotes_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.fetch.retry_backoff_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.provider.circuit_breaker_cooldown_secs)
    }

    pub fn provider_base_delay(&self) -> Duration {
        Duration::from_millis(self.provider.base_delay_ms)
    }
}

fn parse_env<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::BadEnv { name, value }),
    }
}
