pub mod collector;
pub mod tracker;

pub use collector::MetricCollector;
pub use tracker::ConcurrencyTracker;
