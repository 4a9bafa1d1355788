//! Prometheus exposition endpoint

pub mod handlers;
pub mod routes;

pub use routes::create_metrics_router;
