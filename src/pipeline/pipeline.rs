use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::events::{EventBus, PipelineEvent, StreamKind};
use super::metrics::PipelineMetrics;
use super::queue::{BoundedQueue, Wakeup};
use super::snapshot::{NamedFeature, PipelineSnapshot};
use crate::app::PipelineConfig;
use crate::error::{PipelineError, RejectReason, Result};
use crate::indicators::IndicatorEngine;
use crate::market::validation;
use crate::market::{MarketDataUpdate, OrderBookUpdate};
use crate::quality::{DataQualityMetrics, DataQualityTracker};
use crate::sentiment::{SentimentAggregator, SentimentData, SentimentSource, SENTIMENT_FEATURES};

/// Feature vector layout for the default indicator configuration.
pub const FEATURE_NAMES: [&str; 21] = [
    "RSI",
    "MACD",
    "MACD_SIGNAL",
    "MACD_HIST",
    "BB_UPPER",
    "BB_MIDDLE",
    "BB_LOWER",
    "ATR",
    "SMA20",
    "SMA50",
    "SMA200",
    "EMA12",
    "EMA26",
    "SPREAD",
    "IMBALANCE",
    "SLIPPAGE",
    "SENTIMENT_TWITTER",
    "SENTIMENT_REDDIT",
    "SENTIMENT_NEWS",
    "SENTIMENT_AGGREGATE",
    "SENTIMENT_MOMENTUM",
];

pub const PRICE_ACCURACY_THRESHOLD: f64 = 0.95;
pub const VOLUME_ACCURACY_THRESHOLD: f64 = 0.90;
pub const ORDER_BOOK_ACCURACY_THRESHOLD: f64 = 0.95;

const CONSUMER_THREAD_NAME: &str = "market-data-consumer";

pub type MarketDataCallback = Arc<dyn Fn(&MarketDataUpdate) + Send + Sync>;
pub type OrderBookCallback = Arc<dyn Fn(&OrderBookUpdate) + Send + Sync>;
pub type SentimentCallback = Arc<dyn Fn(&str, f64) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    market_data: Option<MarketDataCallback>,
    order_book: Option<OrderBookCallback>,
    sentiment: Option<SentimentCallback>,
}

#[derive(Default)]
struct LatestState {
    market_data: Option<MarketDataUpdate>,
    order_book: Option<OrderBookUpdate>,
    features: Vec<f64>,
}

/// State shared between producers and the consumer thread.
///
/// Lock order when more than one is held: engine, sentiment, latest.
/// No data lock is held while a callback runs; only `pass` is.
struct Shared {
    running: AtomicBool,
    /// Held for a whole consumer pass so two passes never interleave.
    pass: Mutex<()>,
    poll_interval_ms: AtomicU64,
    max_sample_age: Duration,
    sentiment_retention: Duration,

    market_queue: BoundedQueue<MarketDataUpdate>,
    order_book_queue: BoundedQueue<OrderBookUpdate>,
    wakeup: Wakeup,

    engine: Mutex<IndicatorEngine>,
    sentiment: Mutex<SentimentAggregator>,
    latest_sentiment: Mutex<HashMap<String, f64>>,
    latest: Mutex<LatestState>,
    quality: DataQualityTracker,

    callbacks: RwLock<Callbacks>,
    metrics: PipelineMetrics,
    events: EventBus,
    feature_names: Vec<String>,
}

impl Shared {
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::Relaxed))
    }

    fn reject(&self, source: &str, stream: StreamKind, reason: RejectReason) -> PipelineError {
        warn!("⚠️ Rejected {} sample from '{}': {}", stream, source, reason);

        // An empty identifier cannot be attributed to any source.
        if reason != RejectReason::EmptySource {
            self.quality.record_data_point(source, false);
        }
        self.metrics.record_rejected(stream);
        self.events.publish(PipelineEvent::SampleRejected {
            source: source.to_string(),
            stream,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });

        PipelineError::rejected(source, reason)
    }

    fn accept(&self, source: &str, stream: StreamKind, latency: Option<Duration>) {
        if let Some(latency) = latency {
            self.quality.record_latency(source, latency);
        }
        self.quality.record_data_point(source, true);
        self.metrics.record_accepted(stream);
    }

    fn note_eviction(&self, stream: StreamKind, capacity: usize) {
        debug!("{} queue full ({}), evicted oldest sample", stream, capacity);
        self.metrics.record_eviction(stream);
        self.events
            .publish(PipelineEvent::QueueOverflow { stream, capacity });
    }

    fn invoke_callback(&self, stream: StreamKind, call: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(call)) {
            let message = panic_message(&*payload);
            error!("💥 {} callback panicked: {}", stream, message);
            self.metrics.record_callback_fault(stream);
            self.events
                .publish(PipelineEvent::CallbackFault { stream, message });
        }
    }

    fn refresh_features(&self) {
        let mut features = self.engine.lock().feature_vector();
        features.extend(self.sentiment.lock().sentiment_features());
        self.latest.lock().features = features;
    }

    /// One consumer pass: drain, publish, recompute features, prune sentiment.
    /// Publishing stops early once `active` is cleared. The caller holds `pass`.
    /// Returns how many queued samples were processed.
    fn process_batch(&self, active: &AtomicBool) -> usize {
        let market_items = self.market_queue.drain();
        let book_items = self.order_book_queue.drain();
        self.metrics
            .set_queue_depth(StreamKind::MarketData, self.market_queue.len());
        self.metrics
            .set_queue_depth(StreamKind::OrderBook, self.order_book_queue.len());

        let mut processed = 0;

        if !market_items.is_empty() {
            let callback = self.callbacks.read().market_data.clone();
            for update in market_items {
                if !active.load(Ordering::Acquire) {
                    break;
                }
                processed += 1;
                self.engine.lock().update(&update.candle());
                self.latest.lock().market_data = Some(update.clone());

                if let Some(callback) = &callback {
                    self.invoke_callback(StreamKind::MarketData, || callback(&update));
                }

                self.quality.record_price_accuracy(
                    &update.source,
                    update.confidence >= PRICE_ACCURACY_THRESHOLD,
                );
                self.quality.record_volume_accuracy(
                    &update.source,
                    update.confidence >= VOLUME_ACCURACY_THRESHOLD,
                );
            }
        }

        if !book_items.is_empty() {
            let callback = self.callbacks.read().order_book.clone();
            for update in book_items {
                if !active.load(Ordering::Acquire) {
                    break;
                }
                processed += 1;
                self.engine.lock().update_order_book(&update.book);
                self.latest.lock().order_book = Some(update.clone());

                if let Some(callback) = &callback {
                    self.invoke_callback(StreamKind::OrderBook, || callback(&update));
                }

                self.quality.record_order_book_accuracy(
                    &update.source,
                    update.confidence >= ORDER_BOOK_ACCURACY_THRESHOLD,
                );
            }
        }

        self.refresh_features();

        let pruned = self
            .sentiment
            .lock()
            .clear_old_data(self.sentiment_retention);
        if pruned > 0 {
            debug!("Pruned {} expired sentiment entries", pruned);
        }

        self.metrics.record_iteration();
        processed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// `active` belongs to this run only; a later `start()` never sets it again.
fn run_consumer(shared: Arc<Shared>, active: Arc<AtomicBool>) {
    info!("🔄 Consumer loop started");

    while active.load(Ordering::Acquire) {
        shared
            .wakeup
            .wait_unless(shared.poll_interval(), || !active.load(Ordering::Acquire));

        let _pass = shared.pass.lock();
        if !active.load(Ordering::Acquire) {
            break;
        }

        let processed = shared.process_batch(&active);
        if processed > 0 {
            debug!("Consumer processed {} samples", processed);
        }
    }

    info!("Consumer loop exited");
}

struct Consumer {
    handle: JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl Consumer {
    fn is_current_thread(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }

    fn join(self) {
        if self.handle.join().is_err() {
            error!("Consumer thread panicked");
        }
    }
}

/// Validates samples from any number of producer threads, queues them, and
/// publishes indicator and sentiment features from one consumer thread.
pub struct MarketDataPipeline {
    shared: Arc<Shared>,
    consumer: Mutex<Option<Consumer>>,
}

impl MarketDataPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let engine = IndicatorEngine::new(&config.indicators);
        let feature_names: Vec<String> = engine
            .feature_names()
            .into_iter()
            .chain(SENTIMENT_FEATURES.iter().map(|n| n.to_string()))
            .collect();

        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            pass: Mutex::new(()),
            poll_interval_ms: AtomicU64::new(duration_ms(config.poll_interval)),
            max_sample_age: config.max_sample_age,
            sentiment_retention: config.sentiment_retention,
            market_queue: BoundedQueue::new(config.max_queue_size),
            order_book_queue: BoundedQueue::new(config.max_queue_size),
            wakeup: Wakeup::new(),
            engine: Mutex::new(engine),
            sentiment: Mutex::new(SentimentAggregator::new()),
            latest_sentiment: Mutex::new(HashMap::new()),
            latest: Mutex::new(LatestState::default()),
            quality: DataQualityTracker::with_source_limit(
                config.quality_history_size,
                config.max_tracked_sources,
            ),
            callbacks: RwLock::new(Callbacks::default()),
            metrics: PipelineMetrics::new()?,
            events: EventBus::default(),
            feature_names,
        });
        shared.refresh_features();

        Ok(Self {
            shared,
            consumer: Mutex::new(None),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(PipelineConfig::default())
    }

    /// Spawns the consumer thread. Calling it while running does nothing.
    ///
    /// A consumer left over from a `stop()` issued inside a callback is joined
    /// first, so at most one consumer loop ever publishes.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.consumer.lock();
        if self.shared.running.load(Ordering::Acquire) {
            debug!("Pipeline already running");
            return Ok(());
        }

        if let Some(previous) = slot.take() {
            if previous.is_current_thread() {
                // Restarted from a callback: the old loop exits once this pass
                // ends, and the new one waits for the pass lock.
                debug!("start() called on the retiring consumer thread");
            } else {
                previous.join();
            }
        }

        let active = Arc::new(AtomicBool::new(true));
        let shared = self.shared.clone();
        let run = active.clone();
        let handle = thread::Builder::new()
            .name(CONSUMER_THREAD_NAME.to_string())
            .spawn(move || run_consumer(shared, run))?;

        *slot = Some(Consumer { handle, active });
        self.shared.running.store(true, Ordering::Release);
        info!(
            "🚀 Market data pipeline started (poll interval {:?}, queue size {})",
            self.shared.poll_interval(),
            self.shared.market_queue.capacity()
        );
        Ok(())
    }

    /// Stops and joins the consumer; queued samples are discarded.
    /// Safe to call repeatedly, concurrently with `start()`, and from inside a
    /// callback.
    pub fn stop(&self) {
        // Also keeps a callback from blocking on the slot while `start()` joins it.
        if !self.shared.running.load(Ordering::Acquire) {
            return;
        }

        let mut slot = self.consumer.lock();
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let consumer = slot.take();
        if let Some(consumer) = &consumer {
            consumer.active.store(false, Ordering::Release);
        }
        self.shared.wakeup.notify();

        let discarded = self.shared.market_queue.clear() + self.shared.order_book_queue.clear();
        self.shared.metrics.set_queue_depth(StreamKind::MarketData, 0);
        self.shared.metrics.set_queue_depth(StreamKind::OrderBook, 0);

        match consumer {
            Some(consumer) if consumer.is_current_thread() => {
                debug!("stop() called on the consumer thread; it exits after this pass");
                // The next start() joins it.
                *slot = Some(consumer);
                drop(slot);
            }
            Some(consumer) => {
                drop(slot);
                consumer.join();
            }
            None => drop(slot),
        }

        info!(
            "🛑 Market data pipeline stopped ({} queued samples discarded)",
            discarded
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Runs one consumer pass on the calling thread. Does nothing while the
    /// consumer thread is running or still finishing a pass; meant for replays
    /// and deterministic tests.
    pub fn process_pending(&self) -> usize {
        if self.is_running() {
            return 0;
        }
        let Some(_pass) = self.shared.pass.try_lock() else {
            return 0;
        };
        self.shared.process_batch(&AtomicBool::new(true))
    }

    pub fn push_market_data(&self, mut update: MarketDataUpdate) -> Result<()> {
        let shared = &self.shared;
        let stream = StreamKind::MarketData;

        update.source = validation::normalize_source(&update.source)
            .map_err(|reason| shared.reject(&update.source, stream, reason))?;

        let latency =
            validation::validate_market_data(&update, Utc::now(), shared.max_sample_age)
                .map_err(|reason| shared.reject(&update.source, stream, reason))?;

        shared.accept(&update.source, stream, Some(latency));

        if shared.market_queue.push(update).is_some() {
            shared.note_eviction(stream, shared.market_queue.capacity());
        }
        shared.metrics.set_queue_depth(stream, shared.market_queue.len());
        shared.wakeup.notify();
        Ok(())
    }

    pub fn push_order_book(&self, mut update: OrderBookUpdate) -> Result<()> {
        let shared = &self.shared;
        let stream = StreamKind::OrderBook;

        update.source = validation::normalize_source(&update.source)
            .map_err(|reason| shared.reject(&update.source, stream, reason))?;

        let latency =
            validation::validate_order_book_update(&update, Utc::now(), shared.max_sample_age)
                .map_err(|reason| shared.reject(&update.source, stream, reason))?;

        shared.accept(&update.source, stream, Some(latency));

        if shared.order_book_queue.push(update).is_some() {
            shared.note_eviction(stream, shared.order_book_queue.capacity());
        }
        shared
            .metrics
            .set_queue_depth(stream, shared.order_book_queue.len());
        shared.wakeup.notify();
        Ok(())
    }

    /// Score only, full confidence, no text.
    pub fn push_sentiment_data(&self, source: &str, score: f64) -> Result<()> {
        self.push_sentiment(source, "", score, 1.0)
    }

    /// Not queued. Twitter/Reddit/News sources also feed the aggregator. The
    /// sentiment callback runs on the calling thread before this returns.
    pub fn push_sentiment(&self, source: &str, text: &str, score: f64, confidence: f64) -> Result<()> {
        let shared = &self.shared;
        let stream = StreamKind::Sentiment;

        let source = validation::normalize_source(source)
            .map_err(|reason| shared.reject(source, stream, reason))?;

        validation::validate_sentiment_score(score)
            .and_then(|_| validation::check_confidence(confidence))
            .map_err(|reason| shared.reject(&source, stream, reason))?;

        if let Some(channel) = SentimentSource::parse(&source) {
            shared
                .sentiment
                .lock()
                .add(SentimentData::new(channel, text, score, confidence));
        }
        shared.latest_sentiment.lock().insert(source.clone(), score);
        shared.accept(&source, stream, None);

        let callback = shared.callbacks.read().sentiment.clone();
        if let Some(callback) = callback {
            shared.invoke_callback(stream, || callback(&source, score));
        }
        Ok(())
    }

    /// Empty only if the indicator configuration produces no features.
    pub fn latest_features(&self) -> Vec<f64> {
        self.shared.latest.lock().features.clone()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.shared.feature_names
    }

    pub fn latest_market_data(&self) -> Option<MarketDataUpdate> {
        self.shared.latest.lock().market_data.clone()
    }

    pub fn latest_order_book(&self) -> Option<OrderBookUpdate> {
        self.shared.latest.lock().order_book.clone()
    }

    pub fn latest_sentiment(&self, source: &str) -> Option<f64> {
        self.shared.latest_sentiment.lock().get(source.trim()).copied()
    }

    pub fn aggregate_sentiment(&self) -> f64 {
        self.shared.sentiment.lock().aggregate_sentiment()
    }

    pub fn weighted_sentiment(&self, source: SentimentSource) -> f64 {
        self.shared.sentiment.lock().weighted_sentiment(source)
    }

    /// Newest first.
    pub fn recent_sentiments(&self, count: usize) -> Vec<SentimentData> {
        self.shared.sentiment.lock().recent_sentiments(count)
    }

    pub fn indicator_value(&self, name: &str) -> Option<f64> {
        self.shared.engine.lock().indicator_value(name)
    }

    pub fn on_market_data<F>(&self, callback: F)
    where
        F: Fn(&MarketDataUpdate) + Send + Sync + 'static,
    {
        self.shared.callbacks.write().market_data = Some(Arc::new(callback));
    }

    pub fn on_order_book<F>(&self, callback: F)
    where
        F: Fn(&OrderBookUpdate) + Send + Sync + 'static,
    {
        self.shared.callbacks.write().order_book = Some(Arc::new(callback));
    }

    pub fn on_sentiment<F>(&self, callback: F)
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.shared.callbacks.write().sentiment = Some(Arc::new(callback));
    }

    pub fn clear_callbacks(&self) {
        *self.shared.callbacks.write() = Callbacks::default();
    }

    /// Takes effect at the consumer's next wait.
    pub fn set_update_interval(&self, interval: Duration) {
        self.shared
            .poll_interval_ms
            .store(duration_ms(interval), Ordering::Relaxed);
    }

    pub fn update_interval(&self) -> Duration {
        self.shared.poll_interval()
    }

    /// Applies to both queues; shrinking evicts the oldest queued samples.
    pub fn set_max_queue_size(&self, size: usize) {
        for (stream, evicted) in [
            (StreamKind::MarketData, self.shared.market_queue.set_capacity(size)),
            (StreamKind::OrderBook, self.shared.order_book_queue.set_capacity(size)),
        ] {
            for _ in 0..evicted {
                self.shared.metrics.record_eviction(stream);
            }
        }
    }

    pub fn max_queue_size(&self) -> usize {
        self.shared.market_queue.capacity()
    }

    pub fn market_queue_len(&self) -> usize {
        self.shared.market_queue.len()
    }

    pub fn order_book_queue_len(&self) -> usize {
        self.shared.order_book_queue.len()
    }

    pub fn data_quality_metrics(&self, source: &str) -> Option<DataQualityMetrics> {
        self.shared.quality.latest_metrics(source)
    }

    pub fn quality_history(&self, source: &str) -> Vec<DataQualityMetrics> {
        self.shared.quality.metrics_history(source)
    }

    pub fn source_reliability(&self, source: &str) -> f64 {
        self.shared.quality.source_reliability(source)
    }

    pub fn quality_sources(&self) -> Vec<String> {
        self.shared.quality.sources()
    }

    pub fn generate_data_quality_report(&self, source: &str) -> String {
        self.shared.quality.generate_quality_report(source)
    }

    pub fn generate_summary_report(&self) -> String {
        self.shared.quality.generate_summary_report()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.shared.metrics
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let shared = &self.shared;
        let aggregate_sentiment = shared.sentiment.lock().aggregate_sentiment();
        let (market_data, order_book, values) = {
            let latest = shared.latest.lock();
            (
                latest.market_data.clone(),
                latest.order_book.clone(),
                latest.features.clone(),
            )
        };
        let sentiment: BTreeMap<String, f64> = shared
            .latest_sentiment
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        PipelineSnapshot {
            taken_at: Utc::now(),
            running: self.is_running(),
            market_data,
            order_book,
            features: shared
                .feature_names
                .iter()
                .zip(values)
                .map(|(name, value)| NamedFeature {
                    name: name.clone(),
                    value,
                })
                .collect(),
            sentiment,
            aggregate_sentiment,
            market_queue_depth: shared.market_queue.len(),
            order_book_queue_depth: shared.order_book_queue.len(),
        }
    }
}

impl Drop for MarketDataPipeline {
    fn drop(&mut self) {
        self.stop();
        if let Some(consumer) = self.consumer.get_mut().take() {
            if !consumer.is_current_thread() {
                consumer.join();
            }
        }
    }
}

fn duration_ms(interval: Duration) -> u64 {
    (interval.as_millis() as u64).max(1)
}
