use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// 0.0 to 1.0
    pub confidence: f64,
}

impl Decision {
    pub fn new(action: Action, confidence: f64) -> Self {
        Self {
            action,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn hold(confidence: f64) -> Self {
        Self::new(Action::Hold, confidence)
    }
}

/// Downstream consumer of the feature vector.
#[cfg_attr(test, mockall::automock)]
pub trait DecisionEngine: Send + Sync {
    fn decide(&self, features: &[f64]) -> Decision;
}

/// Always returns the same decision regardless of features.
#[derive(Debug, Clone, Copy)]
pub struct ConstantDecisionEngine {
    decision: Decision,
}

impl ConstantDecisionEngine {
    pub fn new(decision: Decision) -> Self {
        Self { decision }
    }
}

impl Default for ConstantDecisionEngine {
    fn default() -> Self {
        Self::new(Decision::hold(0.5))
    }
}

impl DecisionEngine for ConstantDecisionEngine {
    fn decide(&self, _features: &[f64]) -> Decision {
        self.decision
    }
}

/// Forces HOLD with zero confidence for `cooldown` after any non-HOLD decision.
pub struct CooldownEngine<E> {
    inner: E,
    cooldown: Duration,
    last_trade: Mutex<Option<DateTime<Utc>>>,
}

impl<E: DecisionEngine> CooldownEngine<E> {
    pub fn new(inner: E, cooldown: Duration) -> Self {
        Self {
            inner,
            cooldown,
            last_trade: Mutex::new(None),
        }
    }

    pub fn decide_at(&self, features: &[f64], now: DateTime<Utc>) -> Decision {
        let mut last_trade = self.last_trade.lock();

        if let Some(at) = *last_trade {
            let elapsed_ms = (now - at).num_milliseconds();
            if elapsed_ms < self.cooldown.as_millis() as i64 {
                return Decision::hold(0.0);
            }
        }

        let decision = self.inner.decide(features);
        if decision.action != Action::Hold {
            *last_trade = Some(now);
        }
        decision
    }
}

impl<E: DecisionEngine> DecisionEngine for CooldownEngine<E> {
    fn decide(&self, features: &[f64]) -> Decision {
        self.decide_at(features, Utc::now())
    }
}
