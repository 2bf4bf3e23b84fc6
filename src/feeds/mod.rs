pub mod simulator;

pub use simulator::{FeedSettings, FeedSimulator, FeedStats};
