//! Caller-facing per-ticker payload.

use super::bar::{MonthlyBar, OhlcvBar};
use super::symbol::NormalizedSymbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result map returned by quote aggregation, keyed by display key.
pub type QuoteMap = BTreeMap<String, TickerPayload>;

/// Quote, short-window history and (optionally) the monthly roll-up for one
/// symbol.
///
/// `monthly_ohlc` is an enhancement filled in by a best-effort step. It is
/// left out of the serialized payload entirely when that step did not run
/// or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPayload {
    pub raw_ticker: String,
    pub currency: String,
    pub last_price: Option<f64>,
    pub ohlcv: Vec<OhlcvBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_ohlc: Option<Vec<MonthlyBar>>,
}

impl TickerPayload {
    /// Payload for a symbol the provider had no data for.
    pub fn unresolved(symbol: &NormalizedSymbol, currency: &str) -> Self {
        Self {
            raw_ticker: symbol.to_string(),
            currency: currency.to_string(),
            last_price: None,
            ohlcv: Vec::new(),
            monthly_ohlc: None,
        }
    }

    /// Payload carrying only a monthly roll-up, used when a symbol's display
    /// key has no entry of its own yet.
    pub fn monthly_only(symbol: &NormalizedSymbol, currency: &str, monthly: Vec<MonthlyBar>) -> Self {
        Self {
            monthly_ohlc: Some(monthly),
            ..Self::unresolved(symbol, currency)
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.last_price.is_some()
    }
}
