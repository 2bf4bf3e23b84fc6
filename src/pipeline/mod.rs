pub mod events;
pub mod metrics;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod queue;
pub mod snapshot;

pub use events::{EventBus, PipelineEvent, StreamKind};
pub use metrics::PipelineMetrics;
pub use pipeline::{
    MarketDataCallback, MarketDataPipeline, OrderBookCallback, SentimentCallback, FEATURE_NAMES,
};
pub use queue::{BoundedQueue, Wakeup};
pub use snapshot::{NamedFeature, PipelineSnapshot};
