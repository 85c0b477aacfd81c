pub mod collector;
pub mod metrics;

pub use collector::{collect_pool_metrics, spawn_pool_metrics_collector};
pub use metrics::Metrics;
