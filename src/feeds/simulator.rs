use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::market::{Candle, MarketDataUpdate, OrderBookLevel, OrderBookUpdate};
use crate::pipeline::MarketDataPipeline;
use crate::sentiment::{SentimentData, SentimentSource};

const HEADLINES: [&str; 6] = [
    "Exchange inflows spike as traders reposition",
    "Analysts split on near-term direction",
    "Large wallet moves coins to cold storage",
    "Funding rates flip after volatile session",
    "Regulator comments on spot ETF applications",
    "Miners report record hashrate",
];

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub source: String,
    pub base_price: f64,
    pub base_volume: f64,
    /// Standard deviation of the per-tick relative price move.
    pub price_volatility: f64,
    pub volume_volatility: f64,
    pub book_depth: usize,
    /// Relative distance between adjacent book levels.
    pub level_step: f64,
    pub tick: Duration,
    /// Push one sentiment sample every N ticks; 0 disables sentiment.
    pub sentiment_every: u64,
}

impl FeedSettings {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            base_price: 50_000.0,
            base_volume: 100.0,
            price_volatility: 0.001,
            volume_volatility: 0.2,
            book_depth: 10,
            level_step: 0.001,
            tick: Duration::from_millis(100),
            sentiment_every: 10,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Random-walk feed adapter. Each tick pushes one bar and one book, plus a
/// sentiment sample every few ticks.
pub struct FeedSimulator {
    settings: FeedSettings,
    price: f64,
    rng: StdRng,
    stats: FeedStats,
}

impl FeedSimulator {
    pub fn new(settings: FeedSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn with_seed(settings: FeedSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: FeedSettings, rng: StdRng) -> Self {
        Self {
            price: settings.base_price,
            settings,
            rng,
            stats: FeedStats::default(),
        }
    }

    pub fn source(&self) -> &str {
        &self.settings.source
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    fn gaussian(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    fn confidence(&mut self) -> f64 {
        self.rng.gen_range(0.8..=1.0)
    }

    fn jittered_volume(&mut self) -> f64 {
        let z = self.gaussian();
        (self.settings.base_volume * (1.0 + z * self.settings.volume_volatility)).max(0.01)
    }

    pub fn next_candle(&mut self) -> Candle {
        let vol = self.settings.price_volatility;
        let open = self.price;
        let close = (open * (1.0 + self.gaussian() * vol)).max(f64::MIN_POSITIVE);
        let high = open.max(close) * (1.0 + self.gaussian().abs() * vol * 0.5);
        let low = open.min(close) * (1.0 - (self.gaussian().abs() * vol * 0.5).min(0.5));
        let volume = self.jittered_volume();

        self.price = close;
        Candle::new(open, high, low, close, volume)
    }

    pub fn next_market_data(&mut self) -> MarketDataUpdate {
        let candle = self.next_candle();
        let confidence = self.confidence();
        MarketDataUpdate::from_candle(self.settings.source.clone(), candle, confidence)
    }

    /// Levels start one step away from the last price on each side.
    pub fn next_order_book(&mut self) -> OrderBookUpdate {
        let price = self.price;
        let step = price * self.settings.level_step;
        let depth = self.settings.book_depth.max(1);

        let bids = (1..=depth)
            .map(|i| OrderBookLevel::new(price - step * i as f64, self.jittered_volume()))
            .collect();
        let asks = (1..=depth)
            .map(|i| OrderBookLevel::new(price + step * i as f64, self.jittered_volume()))
            .collect();

        let confidence = self.confidence();
        OrderBookUpdate::new(self.settings.source.clone(), bids, asks, confidence)
    }

    pub fn next_sentiment(&mut self) -> SentimentData {
        let channel = SentimentSource::ALL[self.rng.gen_range(0..SentimentSource::ALL.len())];
        let drift = (self.price / self.settings.base_price - 1.0) * 50.0;
        let score = (drift + self.gaussian() * 0.3).tanh();
        let text = HEADLINES[self.rng.gen_range(0..HEADLINES.len())];
        let confidence = self.confidence();
        SentimentData::new(channel, text, score, confidence)
    }

    pub fn tick(&mut self, pipeline: &MarketDataPipeline) -> FeedStats {
        self.stats.ticks += 1;

        let market = self.next_market_data();
        let book = self.next_order_book();
        let results = [pipeline.push_market_data(market), pipeline.push_order_book(book)];

        let sentiment_due = self.settings.sentiment_every > 0
            && self.stats.ticks % self.settings.sentiment_every == 0;
        let sentiment = if sentiment_due {
            let data = self.next_sentiment();
            Some(pipeline.push_sentiment(
                &data.source.to_string(),
                &data.text,
                data.score,
                data.confidence,
            ))
        } else {
            None
        };

        for result in results.into_iter().chain(sentiment) {
            match result {
                Ok(()) => self.stats.accepted += 1,
                Err(e) => {
                    debug!("{} feed sample refused: {}", self.settings.source, e);
                    self.stats.rejected += 1;
                }
            }
        }

        self.stats
    }

    /// Ticks on `settings.tick` until `shutdown` flips to true or its sender is dropped.
    pub async fn run(
        mut self,
        pipeline: Arc<MarketDataPipeline>,
        mut shutdown: watch::Receiver<bool>,
    ) -> FeedStats {
        let mut interval = tokio::time::interval(self.settings.tick.max(Duration::from_millis(1)));
        info!("📡 Feed {} started (tick {:?})", self.settings.source, self.settings.tick);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(&pipeline);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            "Feed {} stopped: {} ticks, {} accepted, {} rejected",
            self.settings.source, self.stats.ticks, self.stats.accepted, self.stats.rejected
        );
        self.stats
    }
}
