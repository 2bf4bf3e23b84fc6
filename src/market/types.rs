use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp: Utc::now(),
        }
    }

    /// A flat bar for a single trade print.
    pub fn from_price(price: f64, volume: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            timestamp,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl OrderBookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Bids best-first (descending), asks best-first (ascending).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    pub fn new(bids: Vec<OrderBookLevel>, asks: Vec<OrderBookLevel>) -> Self {
        Self { bids, asks }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn bid_volume(&self) -> f64 {
        self.bids.iter().map(|l| l.quantity).sum()
    }

    pub fn ask_volume(&self) -> f64 {
        self.asks.iter().map(|l| l.quantity).sum()
    }
}

/// A single tick from a feed adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataUpdate {
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub confidence: f64,
    /// Present when the feed delivers full bars rather than trade prints.
    #[serde(default)]
    pub bar: Option<Candle>,
}

impl MarketDataUpdate {
    pub fn new(source: impl Into<String>, price: f64, volume: f64, confidence: f64) -> Self {
        Self {
            price,
            volume,
            timestamp: Utc::now(),
            source: source.into(),
            confidence,
            bar: None,
        }
    }

    pub fn from_candle(source: impl Into<String>, candle: Candle, confidence: f64) -> Self {
        Self {
            price: candle.close,
            volume: candle.volume,
            timestamp: candle.timestamp,
            source: source.into(),
            confidence,
            bar: Some(candle),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        if let Some(bar) = self.bar.as_mut() {
            bar.timestamp = timestamp;
        }
        self
    }

    /// The bar fed to the indicator engine.
    pub fn candle(&self) -> Candle {
        self.bar
            .unwrap_or_else(|| Candle::from_price(self.price, self.volume, self.timestamp))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUpdate {
    pub book: OrderBook,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub confidence: f64,
}

impl OrderBookUpdate {
    pub fn new(
        source: impl Into<String>,
        bids: Vec<OrderBookLevel>,
        asks: Vec<OrderBookLevel>,
        confidence: f64,
    ) -> Self {
        Self {
            book: OrderBook::new(bids, asks),
            timestamp: Utc::now(),
            source: source.into(),
            confidence,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_becomes_flat_candle() {
        let update = MarketDataUpdate::new("Binance", 50_000.0, 1.5, 0.9);
        let candle = update.candle();
        assert_eq!(candle.open, 50_000.0);
        assert_eq!(candle.high, 50_000.0);
        assert_eq!(candle.low, 50_000.0);
        assert_eq!(candle.close, 50_000.0);
        assert_eq!(candle.volume, 1.5);
        assert_eq!(candle.timestamp, update.timestamp);
    }

    #[test]
    fn test_bar_update_keeps_range() {
        let bar = Candle::new(100.0, 110.0, 95.0, 105.0, 42.0);
        let update = MarketDataUpdate::from_candle("Binance", bar, 1.0);
        assert_eq!(update.price, 105.0);
        assert_eq!(update.volume, 42.0);
        assert_eq!(update.candle().high, 110.0);
        assert_eq!(update.candle().low, 95.0);
    }

    #[test]
    fn test_order_book_aggregates() {
        let book = OrderBook::new(
            vec![OrderBookLevel::new(99.0, 2.0), OrderBookLevel::new(98.0, 3.0)],
            vec![OrderBookLevel::new(101.0, 1.0)],
        );
        assert_eq!(book.best_bid(), Some(99.0));
        assert_eq!(book.best_ask(), Some(101.0));
        assert_eq!(book.bid_volume(), 5.0);
        assert_eq!(book.ask_volume(), 1.0);
    }
}
