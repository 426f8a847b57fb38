//! Ticker normalization.
//!
//! Maps a free-form ticker typed by a user onto the identifier the upstream
//! provider expects. Index symbols (`^NSEI`) pass through untouched, symbols
//! that already carry an exchange suffix (`INFY.BO`) pass through untouched,
//! everything else gets the default exchange suffix (`TCS` -> `TCS.NS`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A provider-ready symbol produced by [`SymbolRules::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedSymbol(String);

impl NormalizedSymbol {
    /// Wrap a symbol that is already in provider form (e.g. read back from a
    /// provider response). No normalization is applied.
    pub fn from_provider(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NormalizedSymbol {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NormalizedSymbol {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Exchange conventions used for normalization and display keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRules {
    /// Suffix appended to bare equity tickers, separator included (".NS").
    pub default_suffix: String,
    /// Leading marker of index symbols ('^').
    pub index_marker: char,
    /// Separator between a ticker and its exchange suffix ('.').
    pub separator: char,
}

impl Default for SymbolRules {
    fn default() -> Self {
        Self {
            default_suffix: ".NS".into(),
            index_marker: '^',
            separator: '.',
        }
    }
}

impl SymbolRules {
    /// Normalize one ticker: trim, uppercase, then suffix unless it is an
    /// index or already suffixed.
    ///
    /// Idempotent as long as `default_suffix` contains `separator`, which
    /// `MarketConfig::validate` enforces.
    pub fn normalize(&self, ticker: &str) -> NormalizedSymbol {
        let t = ticker.trim().to_uppercase();
        if t.starts_with(self.index_marker) || t.contains(self.separator) {
            return NormalizedSymbol(t);
        }
        NormalizedSymbol(format!("{t}{}", self.default_suffix.to_uppercase()))
    }

    /// Normalize a list, dropping duplicates while keeping first-seen order.
    pub fn batch_normalize<S: AsRef<str>>(&self, tickers: &[S]) -> Vec<NormalizedSymbol> {
        let mut seen = HashSet::new();
        tickers
            .iter()
            .map(|t| self.normalize(t.as_ref()))
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    /// Normalize a list and append any benchmark not already present.
    pub fn with_benchmarks<S: AsRef<str>>(
        &self,
        tickers: &[S],
        benchmarks: &[NormalizedSymbol],
    ) -> Vec<NormalizedSymbol> {
        let mut out = self.batch_normalize(tickers);
        for b in benchmarks {
            if !out.contains(b) {
                out.push(b.clone());
            }
        }
        out
    }

    pub fn is_index(&self, symbol: &NormalizedSymbol) -> bool {
        symbol.as_str().starts_with(self.index_marker)
    }

    /// Key under which a symbol appears in caller-facing maps: the index
    /// marker is stripped from index symbols, the exchange suffix from
    /// equities (`^NSEI` -> `NSEI`, `TCS.NS` -> `TCS`).
    pub fn display_key(&self, symbol: &NormalizedSymbol) -> String {
        let s = symbol.as_str();
        if let Some(stripped) = s.strip_prefix(self.index_marker) {
            return stripped.to_string();
        }
        match s.split_once(self.separator) {
            Some((base, _)) => base.to_string(),
            None => s.to_string(),
        }
    }
}

/// Normalize with the default NSE conventions.
pub fn normalize(ticker: &str) -> NormalizedSymbol {
    SymbolRules::default().normalize(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ticker_gets_default_suffix() {
        assert_eq!(normalize("tcs"), "TCS.NS");
        assert_eq!(normalize("  reliance "), "RELIANCE.NS");
    }

    #[test]
    fn index_symbols_pass_through() {
        assert_eq!(normalize("^nsei"), "^NSEI");
        assert_eq!(normalize("^BSESN"), "^BSESN");
    }

    #[test]
    fn explicit_exchange_suffix_is_kept() {
        assert_eq!(normalize("infy.bo"), "INFY.BO");
        assert_eq!(normalize("TCS.NS"), "TCS.NS");
    }

    #[test]
    fn normalize_is_idempotent() {
        for t in ["tcs", "^nsei", "infy.bo", " hdfcbank "] {
            let once = normalize(t);
            assert_eq!(normalize(once.as_str()), once);
        }
    }

    #[test]
    fn batch_normalize_dedupes_in_order() {
        let rules = SymbolRules::default();
        let out = rules.batch_normalize(&["TCS", "infy", "tcs", "TCS.NS"]);
        assert_eq!(out, vec![normalize("TCS"), normalize("INFY")]);
    }

    #[test]
    fn benchmarks_appended_once() {
        let rules = SymbolRules::default();
        let benches = vec![normalize("^NSEI"), normalize("^BSESN")];
        let out = rules.with_benchmarks(&["^nsei", "TCS"], &benches);
        assert_eq!(out, vec![normalize("^NSEI"), normalize("TCS"), normalize("^BSESN")]);
    }

    #[test]
    fn display_keys() {
        let rules = SymbolRules::default();
        assert_eq!(rules.display_key(&normalize("^NSEI")), "NSEI");
        assert_eq!(rules.display_key(&normalize("TCS")), "TCS");
        assert_eq!(rules.display_key(&normalize("infy.bo")), "INFY");
        assert!(rules.is_index(&normalize("^BSESN")));
        assert!(!rules.is_index(&normalize("TCS")));
    }

    #[test]
    fn custom_suffix() {
        let rules = SymbolRules {
            default_suffix: ".bo".into(),
            ..SymbolRules::default()
        };
        assert_eq!(rules.normalize("infy"), "INFY.BO");
    }
}
