use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    MarketData,
    OrderBook,
    Sentiment,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [
        StreamKind::MarketData,
        StreamKind::OrderBook,
        StreamKind::Sentiment,
    ];

    /// Label value used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::MarketData => "market_data",
            StreamKind::OrderBook => "order_book",
            StreamKind::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    SampleRejected {
        source: String,
        stream: StreamKind,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    QueueOverflow {
        stream: StreamKind,
        capacity: usize,
    },
    CallbackFault {
        stream: StreamKind,
        message: String,
    },
}

pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Never blocks. Events published while nobody listens are dropped.
    pub fn publish(&self, event: PipelineEvent) {
        if self.sender.receiver_count() == 0 {
            return;
        }

        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::trace!("📡 Pipeline event published to {} receivers", receivers);
            }
            Err(e) => {
                tracing::debug!("Pipeline event dropped: {}", e);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(PipelineEvent::QueueOverflow {
            stream: StreamKind::MarketData,
            capacity: 10,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(PipelineEvent::QueueOverflow {
            stream: StreamKind::OrderBook,
            capacity: 5,
        });
        bus.publish(PipelineEvent::CallbackFault {
            stream: StreamKind::MarketData,
            message: "boom".to_string(),
        });

        match rx.try_recv().unwrap() {
            PipelineEvent::QueueOverflow { stream, capacity } => {
                assert_eq!(stream, StreamKind::OrderBook);
                assert_eq!(capacity, 5);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::CallbackFault { .. }
        ));
    }

    #[test]
    fn test_stream_labels() {
        assert_eq!(StreamKind::MarketData.to_string(), "market_data");
        assert_eq!(StreamKind::OrderBook.as_str(), "order_book");
        assert_eq!(StreamKind::ALL.len(), 3);
    }
}
