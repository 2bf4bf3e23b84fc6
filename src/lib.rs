pub mod app;
pub mod error;
pub mod feeds;
pub mod indicators;
pub mod market;
pub mod pipeline;
pub mod quality;
pub mod sentiment;
pub mod strategy;

pub use error::{PipelineError, RejectReason, Result};
pub use market::{Candle, MarketDataUpdate, OrderBook, OrderBookLevel, OrderBookUpdate};
pub use pipeline::{MarketDataPipeline, PipelineEvent, PipelineSnapshot, FEATURE_NAMES};
