pub mod decision;
pub mod signals;

pub use decision::{Action, ConstantDecisionEngine, CooldownEngine, Decision, DecisionEngine};
pub use signals::{Signal, DEFAULT_MIN_CONFIDENCE};
