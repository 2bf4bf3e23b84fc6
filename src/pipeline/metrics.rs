use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::time::Instant;

use super::events::StreamKind;

const ACCEPTED: &str = "accepted";
const REJECTED: &str = "rejected";

/// Prometheus counters for one pipeline, kept in a private registry so several
/// pipelines can live in the same process.
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: Registry,
    samples_total: IntCounterVec,
    queue_evictions_total: IntCounterVec,
    callback_faults_total: IntCounterVec,
    queue_depth: IntGaugeVec,
    consumer_iterations_total: IntCounter,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let samples_total = IntCounterVec::new(
            Opts::new(
                "pipeline_samples_total",
                "Samples pushed into the pipeline by stream and outcome",
            ),
            &["stream", "outcome"],
        )?;
        registry.register(Box::new(samples_total.clone()))?;

        let queue_evictions_total = IntCounterVec::new(
            Opts::new(
                "pipeline_queue_evictions_total",
                "Queued samples dropped because the queue was full",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(queue_evictions_total.clone()))?;

        let callback_faults_total = IntCounterVec::new(
            Opts::new(
                "pipeline_callback_faults_total",
                "Subscriber callbacks that panicked",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(callback_faults_total.clone()))?;

        let queue_depth = IntGaugeVec::new(
            Opts::new("pipeline_queue_depth", "Items waiting in each ingestion queue"),
            &["stream"],
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let consumer_iterations_total = IntCounter::with_opts(Opts::new(
            "pipeline_consumer_iterations_total",
            "Consumer loop iterations that processed the queues",
        ))?;
        registry.register(Box::new(consumer_iterations_total.clone()))?;

        Ok(Self {
            registry,
            samples_total,
            queue_evictions_total,
            callback_faults_total,
            queue_depth,
            consumer_iterations_total,
            start_time: Instant::now(),
        })
    }

    pub fn record_accepted(&self, stream: StreamKind) {
        self.samples_total
            .with_label_values(&[stream.as_str(), ACCEPTED])
            .inc();
    }

    pub fn record_rejected(&self, stream: StreamKind) {
        self.samples_total
            .with_label_values(&[stream.as_str(), REJECTED])
            .inc();
    }

    pub fn record_eviction(&self, stream: StreamKind) {
        self.queue_evictions_total
            .with_label_values(&[stream.as_str()])
            .inc();
    }

    pub fn record_callback_fault(&self, stream: StreamKind) {
        self.callback_faults_total
            .with_label_values(&[stream.as_str()])
            .inc();
    }

    pub fn set_queue_depth(&self, stream: StreamKind, depth: usize) {
        self.queue_depth
            .with_label_values(&[stream.as_str()])
            .set(depth as i64);
    }

    pub fn record_iteration(&self) {
        self.consumer_iterations_total.inc();
    }

    pub fn get_accepted(&self, stream: StreamKind) -> u64 {
        self.samples_total
            .with_label_values(&[stream.as_str(), ACCEPTED])
            .get()
    }

    pub fn get_rejected(&self, stream: StreamKind) -> u64 {
        self.samples_total
            .with_label_values(&[stream.as_str(), REJECTED])
            .get()
    }

    pub fn get_evictions(&self, stream: StreamKind) -> u64 {
        self.queue_evictions_total
            .with_label_values(&[stream.as_str()])
            .get()
    }

    pub fn get_callback_faults(&self, stream: StreamKind) -> u64 {
        self.callback_faults_total
            .with_label_values(&[stream.as_str()])
            .get()
    }

    pub fn get_consumer_iterations(&self) -> u64 {
        self.consumer_iterations_total.get()
    }

    pub fn get_uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Accepted samples per second across all streams since construction.
    pub fn get_sample_rate(&self) -> f64 {
        let uptime = self.start_time.elapsed().as_secs_f64();
        if uptime <= 0.0 {
            return 0.0;
        }
        let accepted: u64 = StreamKind::ALL.iter().map(|s| self.get_accepted(*s)).sum();
        accepted as f64 / uptime
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        match encoder.encode_to_string(&metric_families) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode pipeline metrics: {}", e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_by_stream() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.record_accepted(StreamKind::MarketData);
        metrics.record_accepted(StreamKind::MarketData);
        metrics.record_rejected(StreamKind::OrderBook);
        metrics.record_eviction(StreamKind::MarketData);
        metrics.record_callback_fault(StreamKind::Sentiment);

        assert_eq!(metrics.get_accepted(StreamKind::MarketData), 2);
        assert_eq!(metrics.get_rejected(StreamKind::MarketData), 0);
        assert_eq!(metrics.get_rejected(StreamKind::OrderBook), 1);
        assert_eq!(metrics.get_evictions(StreamKind::MarketData), 1);
        assert_eq!(metrics.get_callback_faults(StreamKind::Sentiment), 1);
    }

    #[test]
    fn test_render_exposition_format() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.record_accepted(StreamKind::MarketData);
        metrics.set_queue_depth(StreamKind::OrderBook, 7);
        metrics.record_iteration();

        let text = metrics.render();
        assert!(text.contains("pipeline_samples_total{outcome=\"accepted\",stream=\"market_data\"} 1"));
        assert!(text.contains("pipeline_queue_depth{stream=\"order_book\"} 7"));
        assert!(text.contains("pipeline_consumer_iterations_total 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = PipelineMetrics::new().unwrap();
        let b = PipelineMetrics::new().unwrap();
        a.record_iteration();
        assert_eq!(a.get_consumer_iterations(), 1);
        assert_eq!(b.get_consumer_iterations(), 0);
    }
}
