pub mod engine;
pub mod moving_average;
pub mod order_book;
pub mod oscillators;
pub mod volatility;

pub use engine::{
    Indicator, IndicatorConfig, IndicatorEngine, ENGINE_FEATURE_COUNT, ORDER_BOOK_FEATURES,
};
pub use moving_average::{Ema, Sma};
pub use order_book::OrderBookMetrics;
pub use oscillators::{Macd, Rsi};
pub use volatility::{Atr, BollingerBands};
