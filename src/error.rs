use thiserror::Error;

/// Why a sample was refused at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("sample is {age_ms}ms old (max {max_age_ms}ms)")]
    Stale { age_ms: i64, max_age_ms: i64 },

    #[error("price must be > 0, got {0}")]
    NonPositivePrice(f64),

    #[error("volume must be >= 0, got {0}")]
    NegativeVolume(f64),

    #[error("confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("invalid candle: {0}")]
    InvalidCandle(&'static str),

    #[error("order book {0} side is empty")]
    EmptyBookSide(&'static str),

    #[error("bid prices are not strictly descending at level {0}")]
    BidsNotDescending(usize),

    #[error("ask prices are not strictly ascending at level {0}")]
    AsksNotAscending(usize),

    #[error("{side} level {index} has non-positive price or volume")]
    NonPositiveLevel { side: &'static str, index: usize },

    #[error("crossed book: best bid {best_bid} >= best ask {best_ask}")]
    CrossedBook { best_bid: f64, best_ask: f64 },

    #[error("sentiment score must be within [-1, 1], got {0}")]
    SentimentOutOfRange(f64),

    #[error("source identifier is empty")]
    EmptySource,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("rejected sample from '{source_id}': {reason}")]
    RejectedSample {
        source_id: String,
        reason: RejectReason,
    },

    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to spawn consumer thread: {0}")]
    ConsumerSpawn(#[from] std::io::Error),
}

impl PipelineError {
    pub fn rejected(source_id: impl Into<String>, reason: RejectReason) -> Self {
        PipelineError::RejectedSample {
            source_id: source_id.into(),
            reason,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            PipelineError::RejectedSample { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
