use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const SENTIMENT_FEATURES: [&str; 5] = [
    "SENTIMENT_TWITTER",
    "SENTIMENT_REDDIT",
    "SENTIMENT_NEWS",
    "SENTIMENT_AGGREGATE",
    "SENTIMENT_MOMENTUM",
];

/// Number of most recent entries (across all channels) used for momentum.
const MOMENTUM_WINDOW: usize = 20;
const DECAY_SECONDS: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentSource {
    Twitter,
    Reddit,
    News,
}

impl SentimentSource {
    pub const ALL: [SentimentSource; 3] = [
        SentimentSource::Twitter,
        SentimentSource::Reddit,
        SentimentSource::News,
    ];

    /// Case-insensitive; anything else is not a sentiment channel.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "twitter" => Some(SentimentSource::Twitter),
            "reddit" => Some(SentimentSource::Reddit),
            "news" => Some(SentimentSource::News),
            _ => None,
        }
    }

    /// Blend weight in the aggregate score.
    pub fn weight(&self) -> f64 {
        match self {
            SentimentSource::Twitter => 0.3,
            SentimentSource::Reddit => 0.3,
            SentimentSource::News => 0.4,
        }
    }
}

impl fmt::Display for SentimentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentSource::Twitter => write!(f, "Twitter"),
            SentimentSource::Reddit => write!(f, "Reddit"),
            SentimentSource::News => write!(f, "News"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentData {
    /// -1.0 (bearish) to 1.0 (bullish).
    pub score: f64,
    pub confidence: f64,
    pub source: SentimentSource,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl SentimentData {
    pub fn new(source: SentimentSource, text: impl Into<String>, score: f64, confidence: f64) -> Self {
        Self {
            score,
            confidence,
            source,
            timestamp: Utc::now(),
            text: text.into(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Time-decayed, confidence-weighted sentiment per channel.
///
/// Each channel log is kept in timestamp order, oldest first.
#[derive(Debug, Default)]
pub struct SentimentAggregator {
    logs: HashMap<SentimentSource, Vec<SentimentData>>,
}

impl SentimentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends in O(1) when `data` is the newest entry of its channel.
    pub fn add(&mut self, data: SentimentData) {
        let entries = self.logs.entry(data.source).or_default();
        let at = entries.partition_point(|item| item.timestamp <= data.timestamp);
        entries.insert(at, data);
    }

    pub fn update(&mut self, source: SentimentSource, text: &str, score: f64, confidence: f64) {
        self.add(SentimentData::new(source, text, score, confidence));
    }

    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn weighted_sentiment(&self, source: SentimentSource) -> f64 {
        self.weighted_sentiment_at(source, Utc::now())
    }

    /// `Σ(score·w) / Σw` with `w = confidence · exp(-age_secs / 3600)`; 0 without data.
    pub fn weighted_sentiment_at(&self, source: SentimentSource, now: DateTime<Utc>) -> f64 {
        let Some(entries) = self.logs.get(&source) else {
            return 0.0;
        };

        let (weighted_sum, total_weight) =
            entries.iter().fold((0.0, 0.0), |(sum, total), item| {
                let age_secs = ((now - item.timestamp).num_milliseconds().max(0)) as f64 / 1000.0;
                let weight = item.confidence * (-age_secs / DECAY_SECONDS).exp();
                (sum + item.score * weight, total + weight)
            });

        if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        }
    }

    pub fn twitter_sentiment(&self) -> f64 {
        self.weighted_sentiment(SentimentSource::Twitter)
    }

    pub fn reddit_sentiment(&self) -> f64 {
        self.weighted_sentiment(SentimentSource::Reddit)
    }

    pub fn news_sentiment(&self) -> f64 {
        self.weighted_sentiment(SentimentSource::News)
    }

    pub fn aggregate_sentiment(&self) -> f64 {
        self.aggregate_sentiment_at(Utc::now())
    }

    pub fn aggregate_sentiment_at(&self, now: DateTime<Utc>) -> f64 {
        SentimentSource::ALL
            .iter()
            .map(|s| s.weight() * self.weighted_sentiment_at(*s, now))
            .sum()
    }

    /// Newest `count` entries across channels, newest first. Only the tail
    /// of each channel log is examined.
    fn newest(&self, count: usize) -> Vec<&SentimentData> {
        let mut tail: Vec<&SentimentData> = self
            .logs
            .values()
            .flat_map(|entries| entries.iter().rev().take(count))
            .collect();
        tail.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        tail.truncate(count);
        tail
    }

    /// Newest first, across all channels.
    pub fn recent_sentiments(&self, count: usize) -> Vec<SentimentData> {
        self.newest(count).into_iter().cloned().collect()
    }

    /// Score of the least recent minus the most recent of the latest entries.
    pub fn momentum(&self) -> f64 {
        let recent = self.newest(MOMENTUM_WINDOW);
        match (recent.first(), recent.last()) {
            (Some(first), Some(last)) if recent.len() >= 2 => last.score - first.score,
            _ => 0.0,
        }
    }

    pub fn sentiment_features(&self) -> Vec<f64> {
        self.sentiment_features_at(Utc::now())
    }

    /// `[twitter, reddit, news, aggregate, momentum]`
    pub fn sentiment_features_at(&self, now: DateTime<Utc>) -> Vec<f64> {
        let twitter = self.weighted_sentiment_at(SentimentSource::Twitter, now);
        let reddit = self.weighted_sentiment_at(SentimentSource::Reddit, now);
        let news = self.weighted_sentiment_at(SentimentSource::News, now);
        let aggregate = SentimentSource::Twitter.weight() * twitter
            + SentimentSource::Reddit.weight() * reddit
            + SentimentSource::News.weight() * news;

        vec![twitter, reddit, news, aggregate, self.momentum()]
    }

    pub fn clear_old_data(&mut self, max_age: Duration) -> usize {
        self.clear_old_data_at(Utc::now(), max_age)
    }

    /// Drops entries with `now - timestamp > max_age`; returns how many were removed.
    pub fn clear_old_data_at(&mut self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let max_age_ms = max_age.as_millis() as i64;
        let mut removed = 0;

        for entries in self.logs.values_mut() {
            let expired = entries
                .partition_point(|item| (now - item.timestamp).num_milliseconds() > max_age_ms);
            entries.drain(..expired);
            removed += expired;
        }

        removed
    }
}
