//! Ingestion-boundary checks. Every function is pure; the caller decides what
//! to record when a check fails.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::types::{Candle, MarketDataUpdate, OrderBook, OrderBookUpdate};
use crate::error::RejectReason;

/// Trims surrounding whitespace; identifiers are otherwise case-sensitive.
pub fn normalize_source(raw: &str) -> Result<String, RejectReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RejectReason::EmptySource);
    }
    Ok(trimmed.to_string())
}

/// Returns the sample latency. Timestamps slightly in the future count as zero latency.
pub fn check_freshness(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<Duration, RejectReason> {
    let age_ms = (now - timestamp).num_milliseconds();
    let max_age_ms = max_age.as_millis() as i64;

    if age_ms > max_age_ms {
        return Err(RejectReason::Stale { age_ms, max_age_ms });
    }
    Ok(Duration::from_millis(age_ms.max(0) as u64))
}

pub fn check_confidence(confidence: f64) -> Result<(), RejectReason> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(RejectReason::ConfidenceOutOfRange(confidence))
    }
}

pub fn validate_candle(candle: &Candle) -> Result<(), RejectReason> {
    let prices = [candle.open, candle.high, candle.low, candle.close];
    if prices.iter().any(|p| !(*p > 0.0)) {
        return Err(RejectReason::InvalidCandle("prices must be > 0"));
    }
    if !(candle.volume >= 0.0) {
        return Err(RejectReason::InvalidCandle("volume must be >= 0"));
    }
    if candle.high < candle.open.max(candle.close).max(candle.low) {
        return Err(RejectReason::InvalidCandle("high below open/close/low"));
    }
    if candle.low > candle.open.min(candle.close).min(candle.high) {
        return Err(RejectReason::InvalidCandle("low above open/close/high"));
    }
    Ok(())
}

pub fn validate_market_data(
    update: &MarketDataUpdate,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<Duration, RejectReason> {
    let latency = check_freshness(update.timestamp, now, max_age)?;

    if !(update.price > 0.0) {
        return Err(RejectReason::NonPositivePrice(update.price));
    }
    if !(update.volume >= 0.0) {
        return Err(RejectReason::NegativeVolume(update.volume));
    }
    check_confidence(update.confidence)?;

    if let Some(bar) = &update.bar {
        validate_candle(bar)?;
    }

    Ok(latency)
}

pub fn validate_order_book(book: &OrderBook) -> Result<(), RejectReason> {
    if book.bids.is_empty() {
        return Err(RejectReason::EmptyBookSide("bid"));
    }
    if book.asks.is_empty() {
        return Err(RejectReason::EmptyBookSide("ask"));
    }

    for (side, levels) in [("bid", &book.bids), ("ask", &book.asks)] {
        if let Some(index) = levels
            .iter()
            .position(|l| !(l.price > 0.0) || !(l.quantity > 0.0))
        {
            return Err(RejectReason::NonPositiveLevel { side, index });
        }
    }

    if let Some(i) = book.bids.windows(2).position(|w| w[1].price >= w[0].price) {
        return Err(RejectReason::BidsNotDescending(i + 1));
    }
    if let Some(i) = book.asks.windows(2).position(|w| w[1].price <= w[0].price) {
        return Err(RejectReason::AsksNotAscending(i + 1));
    }

    let best_bid = book.bids[0].price;
    let best_ask = book.asks[0].price;
    if best_bid >= best_ask {
        return Err(RejectReason::CrossedBook { best_bid, best_ask });
    }

    Ok(())
}

pub fn validate_order_book_update(
    update: &OrderBookUpdate,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<Duration, RejectReason> {
    let latency = check_freshness(update.timestamp, now, max_age)?;
    check_confidence(update.confidence)?;
    validate_order_book(&update.book)?;
    Ok(latency)
}

pub fn validate_sentiment_score(score: f64) -> Result<(), RejectReason> {
    if (-1.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(RejectReason::SentimentOutOfRange(score))
    }
}
