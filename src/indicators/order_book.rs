use serde::{Deserialize, Serialize};

use crate::market::OrderBook;

/// Microstructure figures for the most recent accepted book. Not windowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    pub spread: f64,
    /// (bid volume - ask volume) / total volume, in [-1, 1].
    pub imbalance: f64,
    pub slippage_estimate: f64,
}

impl OrderBookMetrics {
    pub fn from_book(book: &OrderBook) -> Self {
        let (best_bid, best_ask) = match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => return Self::default(),
        };

        let spread = best_ask - best_bid;

        let bid_volume = book.bid_volume();
        let ask_volume = book.ask_volume();
        let total = bid_volume + ask_volume;
        let imbalance = if total > 0.0 {
            (bid_volume - ask_volume) / total
        } else {
            0.0
        };

        Self {
            spread,
            imbalance,
            slippage_estimate: spread * (1.0 + imbalance.abs()),
        }
    }
}
