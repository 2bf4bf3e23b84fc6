use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

use super::report;

pub const DEFAULT_HISTORY_SIZE: usize = 1000;
/// Sources beyond this many are not tracked; existing ones keep updating.
pub const DEFAULT_MAX_SOURCES: usize = 256;

/// Point-in-time quality figures for one feed source. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityMetrics {
    pub average_latency_ms: f64,
    pub max_latency_ms: f64,
    pub latency_std_dev_ms: f64,

    pub data_completeness: f64,
    pub missing_data_rate: f64,

    pub price_accuracy: f64,
    pub volume_accuracy: f64,
    pub order_book_accuracy: f64,

    /// Composite score in [0, 1].
    pub source_reliability: f64,

    pub total_data_points: u64,
    pub valid_data_points: u64,
    pub rejected_data_points: u64,

    pub timestamp: DateTime<Utc>,
}

impl Default for DataQualityMetrics {
    fn default() -> Self {
        Self {
            average_latency_ms: 0.0,
            max_latency_ms: 0.0,
            latency_std_dev_ms: 0.0,
            data_completeness: 0.0,
            missing_data_rate: 0.0,
            price_accuracy: 0.0,
            volume_accuracy: 0.0,
            order_book_accuracy: 0.0,
            source_reliability: 0.0,
            total_data_points: 0,
            valid_data_points: 0,
            rejected_data_points: 0,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct SourceMetrics {
    history: VecDeque<DataQualityMetrics>,
    latencies_ms: VecDeque<f64>,
    total: u64,
    valid: u64,
    rejected: u64,
    accurate_price: u64,
    accurate_volume: u64,
    accurate_order_book: u64,
}

impl SourceMetrics {
    fn push_snapshot(&mut self, snapshot: DataQualityMetrics, capacity: usize) {
        self.history.push_back(snapshot);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    /// Recomputes from counters and the latency window. Nothing is produced
    /// until the source has at least one data point.
    fn recalculate(&mut self, capacity: usize) {
        if self.total == 0 {
            return;
        }

        let mut snapshot = DataQualityMetrics::default();

        if !self.latencies_ms.is_empty() {
            let n = self.latencies_ms.len() as f64;
            let mean = self.latencies_ms.iter().sum::<f64>() / n;
            let variance = self
                .latencies_ms
                .iter()
                .map(|l| (l - mean).powi(2))
                .sum::<f64>()
                / n;

            snapshot.average_latency_ms = mean;
            snapshot.max_latency_ms = self.latencies_ms.iter().copied().fold(0.0, f64::max);
            snapshot.latency_std_dev_ms = variance.sqrt();
        }

        let total = self.total as f64;
        let pct = |count: u64| count as f64 / total * 100.0;

        snapshot.data_completeness = pct(self.valid);
        snapshot.missing_data_rate = pct(self.rejected);
        snapshot.price_accuracy = pct(self.accurate_price);
        snapshot.volume_accuracy = pct(self.accurate_volume);
        snapshot.order_book_accuracy = pct(self.accurate_order_book);

        snapshot.source_reliability = (snapshot.data_completeness * 0.3
            + snapshot.price_accuracy * 0.3
            + snapshot.volume_accuracy * 0.2
            + snapshot.order_book_accuracy * 0.2)
            / 100.0;

        snapshot.total_data_points = self.total;
        snapshot.valid_data_points = self.valid;
        snapshot.rejected_data_points = self.rejected;
        snapshot.timestamp = Utc::now();

        self.push_snapshot(snapshot, capacity);
    }
}

/// Rolling per-source statistics. Every recording call appends one snapshot.
pub struct DataQualityTracker {
    history_size: usize,
    max_sources: usize,
    sources: Mutex<HashMap<String, SourceMetrics>>,
}

impl DataQualityTracker {
    pub fn new(history_size: usize) -> Self {
        Self::with_source_limit(history_size, DEFAULT_MAX_SOURCES)
    }

    pub fn with_source_limit(history_size: usize, max_sources: usize) -> Self {
        Self {
            history_size: history_size.max(1),
            max_sources: max_sources.max(1),
            sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn max_sources(&self) -> usize {
        self.max_sources
    }

    /// `None` when `source` is new and the tracker is full.
    fn slot<'a>(
        &self,
        sources: &'a mut HashMap<String, SourceMetrics>,
        source: &str,
    ) -> Option<&'a mut SourceMetrics> {
        if !sources.contains_key(source) && sources.len() >= self.max_sources {
            debug!(
                "Quality tracker holds {} sources, not tracking '{}'",
                self.max_sources, source
            );
            return None;
        }
        Some(sources.entry(source.to_string()).or_default())
    }

    fn record(&self, source: &str, apply: impl FnOnce(&mut SourceMetrics)) {
        let mut sources = self.sources.lock();
        if let Some(metrics) = self.slot(&mut sources, source) {
            apply(metrics);
            metrics.recalculate(self.history_size);
        }
    }

    pub fn record_latency(&self, source: &str, latency: Duration) {
        let capacity = self.history_size;
        self.record(source, |m| {
            m.latencies_ms.push_back(latency.as_secs_f64() * 1000.0);
            while m.latencies_ms.len() > capacity {
                m.latencies_ms.pop_front();
            }
        });
    }

    pub fn record_data_point(&self, source: &str, is_valid: bool) {
        self.record(source, |m| {
            m.total += 1;
            if is_valid {
                m.valid += 1;
            } else {
                m.rejected += 1;
            }
        });
    }

    pub fn record_price_accuracy(&self, source: &str, is_accurate: bool) {
        self.record(source, |m| {
            if is_accurate {
                m.accurate_price += 1;
            }
        });
    }

    pub fn record_volume_accuracy(&self, source: &str, is_accurate: bool) {
        self.record(source, |m| {
            if is_accurate {
                m.accurate_volume += 1;
            }
        });
    }

    pub fn record_order_book_accuracy(&self, source: &str, is_accurate: bool) {
        self.record(source, |m| {
            if is_accurate {
                m.accurate_order_book += 1;
            }
        });
    }

    /// Appends an externally computed snapshot without touching the counters.
    pub fn update_metrics(&self, source: &str, metrics: DataQualityMetrics) {
        let mut sources = self.sources.lock();
        if let Some(slot) = self.slot(&mut sources, source) {
            slot.push_snapshot(metrics, self.history_size);
        }
    }

    pub fn latest_metrics(&self, source: &str) -> Option<DataQualityMetrics> {
        self.sources
            .lock()
            .get(source)
            .and_then(|m| m.history.back().cloned())
    }

    /// Oldest first.
    pub fn metrics_history(&self, source: &str) -> Vec<DataQualityMetrics> {
        self.sources
            .lock()
            .get(source)
            .map(|m| m.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn source_reliability(&self, source: &str) -> f64 {
        self.latest_metrics(source)
            .map(|m| m.source_reliability)
            .unwrap_or(0.0)
    }

    /// Sorted for stable reporting.
    pub fn sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn generate_quality_report(&self, source: &str) -> String {
        match self.latest_metrics(source) {
            Some(metrics) => report::format_metrics(source, &metrics),
            None => format!("No data available for source: {}", source),
        }
    }

    pub fn generate_summary_report(&self) -> String {
        let latest: Vec<(String, DataQualityMetrics)> = {
            let sources = self.sources.lock();
            let mut rows: Vec<_> = sources
                .iter()
                .filter_map(|(name, m)| m.history.back().map(|s| (name.clone(), s.clone())))
                .collect();
            rows.sort_by(|a, b| a.0.cmp(&b.0));
            rows
        };

        report::format_summary(&latest)
    }
}

impl Default for DataQualityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness_and_missing_rate() {
        let tracker = DataQualityTracker::default();
        for _ in 0..8 {
            tracker.record_data_point("Binance", true);
        }
        for _ in 0..2 {
            tracker.record_data_point("Binance", false);
        }

        let metrics = tracker.latest_metrics("Binance").unwrap();
        assert_eq!(metrics.data_completeness, 80.0);
        assert_eq!(metrics.missing_data_rate, 20.0);
        assert_eq!(metrics.total_data_points, 10);
        assert_eq!(metrics.valid_data_points, 8);
        assert_eq!(metrics.rejected_data_points, 2);
    }

    #[test]
    fn test_latency_statistics() {
        let tracker = DataQualityTracker::default();
        tracker.record_data_point("Coinbase", true);
        for ms in [10, 20, 30, 40] {
            tracker.record_latency("Coinbase", Duration::from_millis(ms));
        }

        let metrics = tracker.latest_metrics("Coinbase").unwrap();
        assert!((metrics.average_latency_ms - 25.0).abs() < 1e-9);
        assert!((metrics.max_latency_ms - 40.0).abs() < 1e-9);
        assert!((metrics.latency_std_dev_ms - 125.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let tracker = DataQualityTracker::new(3);
        tracker.record_data_point("Kraken", true);
        for ms in [1000, 10, 10, 10] {
            tracker.record_latency("Kraken", Duration::from_millis(ms));
        }
        let metrics = tracker.latest_metrics("Kraken").unwrap();
        assert!((metrics.max_latency_ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_reliability_composite() {
        let tracker = DataQualityTracker::default();
        for i in 0..10 {
            tracker.record_data_point("Binance", true);
            tracker.record_price_accuracy("Binance", true);
            tracker.record_volume_accuracy("Binance", i < 5);
            tracker.record_order_book_accuracy("Binance", false);
        }

        let metrics = tracker.latest_metrics("Binance").unwrap();
        assert_eq!(metrics.price_accuracy, 100.0);
        assert_eq!(metrics.volume_accuracy, 50.0);
        assert_eq!(metrics.order_book_accuracy, 0.0);
        // (100*0.3 + 100*0.3 + 50*0.2 + 0*0.2) / 100
        assert!((metrics.source_reliability - 0.7).abs() < 1e-12);
        assert!((tracker.source_reliability("Binance") - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_per_recording_call() {
        let tracker = DataQualityTracker::default();
        // No data point yet: latency alone produces nothing.
        tracker.record_latency("Binance", Duration::from_millis(5));
        assert!(tracker.metrics_history("Binance").is_empty());

        tracker.record_data_point("Binance", true);
        tracker.record_price_accuracy("Binance", true);
        tracker.record_volume_accuracy("Binance", true);
        assert_eq!(tracker.metrics_history("Binance").len(), 3);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let tracker = DataQualityTracker::new(5);
        for _ in 0..12 {
            tracker.record_data_point("Binance", true);
        }
        let history = tracker.metrics_history("Binance");
        assert_eq!(history.len(), 5);
        assert_eq!(history.first().unwrap().total_data_points, 8);
        assert_eq!(history.last().unwrap().total_data_points, 12);
    }

    #[test]
    fn test_update_metrics_appends_external_snapshot() {
        let tracker = DataQualityTracker::default();
        let snapshot = DataQualityMetrics {
            source_reliability: 0.42,
            ..Default::default()
        };
        tracker.update_metrics("Replay", snapshot);
        assert_eq!(tracker.source_reliability("Replay"), 0.42);
    }

    #[test]
    fn test_new_sources_beyond_limit_are_ignored() {
        let tracker = DataQualityTracker::with_source_limit(10, 2);
        tracker.record_data_point("Binance", true);
        tracker.record_data_point("Coinbase", true);
        for i in 0..50 {
            tracker.record_data_point(&format!("garbage-{}", i), false);
        }
        tracker.update_metrics("Replay", DataQualityMetrics::default());

        assert_eq!(tracker.sources(), vec!["Binance", "Coinbase"]);
        assert!(tracker.latest_metrics("garbage-0").is_none());

        // Known sources keep updating at the limit.
        tracker.record_data_point("Binance", false);
        assert_eq!(tracker.latest_metrics("Binance").unwrap().total_data_points, 2);
    }

    #[test]
    fn test_unknown_source() {
        let tracker = DataQualityTracker::default();
        assert!(tracker.latest_metrics("nowhere").is_none());
        assert_eq!(tracker.source_reliability("nowhere"), 0.0);
        assert_eq!(
            tracker.generate_quality_report("nowhere"),
            "No data available for source: nowhere"
        );
    }

    #[test]
    fn test_sources_are_case_sensitive_and_sorted() {
        let tracker = DataQualityTracker::default();
        tracker.record_data_point("coinbase", true);
        tracker.record_data_point("Coinbase", false);
        tracker.record_data_point("Binance", true);
        assert_eq!(tracker.sources(), vec!["Binance", "Coinbase", "coinbase"]);
        assert_eq!(tracker.latest_metrics("coinbase").unwrap().data_completeness, 100.0);
    }
}
