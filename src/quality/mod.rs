pub mod report;
pub mod tracker;

pub use tracker::{
    DataQualityMetrics, DataQualityTracker, DEFAULT_HISTORY_SIZE, DEFAULT_MAX_SOURCES,
};
