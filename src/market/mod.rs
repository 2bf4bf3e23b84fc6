pub mod types;
pub mod validation;

pub use types::{Candle, MarketDataUpdate, OrderBook, OrderBookLevel, OrderBookUpdate};
