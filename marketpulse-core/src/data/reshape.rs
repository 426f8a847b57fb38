//! Single-symbol extraction from a batch result.

use super::frame::{BatchResult, OhlcvFrame};
use crate::domain::NormalizedSymbol;

/// Pull one symbol's bars out of a batch, without void rows.
///
/// Returns `None` when the provider had no data for the symbol, or when
/// every row it sent was void. Neither case is an error.
pub fn extract(batch: &BatchResult, symbol: &NormalizedSymbol) -> Option<OhlcvFrame> {
    let frame = batch.get(symbol)?.without_void_rows();
    if frame.is_empty() {
        None
    } else {
        Some(frame)
    }
}

/// Last non-null close of an extracted frame.
pub fn last_price(frame: Option<&OhlcvFrame>) -> Option<f64> {
    frame.and_then(OhlcvFrame::last_close)
}
