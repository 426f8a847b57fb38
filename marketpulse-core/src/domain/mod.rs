//! Domain types for MarketPulse

pub mod bar;
pub mod payload;
pub mod symbol;

pub use bar::{MonthlyBar, OhlcvBar};
pub use payload::{QuoteMap, TickerPayload};
pub use symbol::{normalize, NormalizedSymbol, SymbolRules};
