use axum::{routing::get, Router};
use std::sync::Arc;

use crate::metrics::MetricRegistry;

use super::handlers::{health_check, render_metrics, AppState};

pub fn create_metrics_router(registry: Arc<MetricRegistry>, metrics_path: &str) -> Router {
    let state = Arc::new(AppState { registry });

    Router::new()
        .route("/health", get(health_check))
        .route(metrics_path, get(render_metrics))
        .with_state(state)
}
