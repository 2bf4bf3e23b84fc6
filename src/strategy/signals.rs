use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::{Action, Decision};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// A decision gated by a confidence threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    pub confidence: f64,
    pub should_execute: bool,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn from_decision(decision: Decision, min_confidence: f64) -> Self {
        Self {
            action: decision.action,
            confidence: decision.confidence,
            should_execute: decision.confidence >= min_confidence,
            reason: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: String) -> Self {
        self.reason = reason;
        self
    }

    /// HOLD signals never lead to an order even when confident.
    pub fn is_actionable(&self) -> bool {
        self.should_execute && self.action != Action::Hold
    }
}

impl From<Decision> for Signal {
    fn from(decision: Decision) -> Self {
        Signal::from_decision(decision, DEFAULT_MIN_CONFIDENCE)
    }
}
