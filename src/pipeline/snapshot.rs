use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::market::{MarketDataUpdate, OrderBookUpdate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFeature {
    pub name: String,
    pub value: f64,
}

/// Read-only view of the published pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub taken_at: DateTime<Utc>,
    pub running: bool,
    pub market_data: Option<MarketDataUpdate>,
    pub order_book: Option<OrderBookUpdate>,
    /// Contract order.
    pub features: Vec<NamedFeature>,
    pub sentiment: BTreeMap<String, f64>,
    pub aggregate_sentiment: f64,
    pub market_queue_depth: usize,
    pub order_book_queue_depth: usize,
}

impl PipelineSnapshot {
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
