//! Zone analytics pipeline
//!
//! Turns a GraphQL analytics payload into counter increments:
//! the query window is computed by [`window`], the nested response is
//! flattened by [`parser`], and [`aggregator`] folds the flat records into
//! the Prometheus counters held by [`crate::metrics::MetricRegistry`].

pub mod aggregator;
pub mod models;
pub mod parser;
pub mod window;

pub use aggregator::Aggregator;
pub use models::{AnalyticsRecord, CounterKey};
pub use parser::parse;
pub use window::TimeWindow;
