use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::MetricRegistry;

pub struct AppState {
    pub registry: Arc<MetricRegistry>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Render every registered counter in the Prometheus text format
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
