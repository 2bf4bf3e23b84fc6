pub mod aggregator;

pub use aggregator::{SentimentAggregator, SentimentData, SentimentSource, SENTIMENT_FEATURES};
