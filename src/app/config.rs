use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::indicators::IndicatorConfig;

/// Tunables for one [`MarketDataPipeline`](crate::pipeline::MarketDataPipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on how long an accepted sample waits before it is published.
    pub poll_interval: Duration,
    /// Per-stream queue capacity; the oldest item is evicted on overflow.
    pub max_queue_size: usize,
    /// Snapshots (and latency samples) kept per source by the quality tracker.
    pub quality_history_size: usize,
    /// Distinct sources the quality tracker keeps; further new ids are ignored.
    pub max_tracked_sources: usize,
    /// Samples older than this at push time are rejected.
    pub max_sample_age: Duration,
    /// Sentiment entries older than this are pruned by the consumer.
    pub sentiment_retention: Duration,
    pub indicators: IndicatorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_queue_size: 1000,
            quality_history_size: 1000,
            max_tracked_sources: 256,
            max_sample_age: Duration::from_secs(60),
            sentiment_retention: Duration::from_secs(24 * 60 * 60),
            indicators: IndicatorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_millis(env_or(
                "PIPELINE_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            max_queue_size: env_or("PIPELINE_MAX_QUEUE_SIZE", defaults.max_queue_size),
            quality_history_size: env_or(
                "PIPELINE_QUALITY_HISTORY",
                defaults.quality_history_size,
            ),
            max_tracked_sources: env_or("PIPELINE_MAX_SOURCES", defaults.max_tracked_sources),
            max_sample_age: Duration::from_secs(env_or(
                "PIPELINE_MAX_SAMPLE_AGE_SECS",
                defaults.max_sample_age.as_secs(),
            )),
            sentiment_retention: Duration::from_secs(
                env_or::<u64>("PIPELINE_SENTIMENT_RETENTION_HOURS", 24) * 60 * 60,
            ),
            indicators: defaults.indicators,
        }
    }
}

/// Settings for the demo binary that drives the pipeline with simulated feeds.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub log_level: String,
    pub feed_sources: Vec<String>,
    pub feed_tick: Duration,
    pub report_interval: Duration,
    /// Zero means run until Ctrl-C.
    pub run_for: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let pipeline = PipelineConfig::from_env();

        let feed_sources: Vec<String> = env::var("FEED_SOURCES")
            .unwrap_or_else(|_| "Binance,Coinbase".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if feed_sources.is_empty() {
            anyhow::bail!("FEED_SOURCES must name at least one feed");
        }

        Ok(AppConfig {
            pipeline,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            feed_sources,
            feed_tick: Duration::from_millis(env_or("FEED_TICK_MS", 100u64).max(1)),
            report_interval: Duration::from_secs(env_or("REPORT_INTERVAL_SECS", 5u64).max(1)),
            run_for: Duration::from_secs(env_or("RUN_SECS", 0)),
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
