pub mod analytics;
pub mod api;
pub mod config;
pub mod metrics;
pub mod provider;
pub mod scrape;
