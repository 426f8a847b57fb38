//! Request-level services built on the batch fetcher: quote field
//! snapshots and trailing price ranges. Both cache whole responses.

pub mod field_quotes;
pub mod ranges;

pub use field_quotes::{FieldQuoteMap, FieldQuoteRow};
pub use ranges::{PriceRange, RangeMap};
