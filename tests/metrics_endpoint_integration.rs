//! Exposition endpoint integration tests
//!
//! These tests verify that folded counters are rendered on the metrics path
//! and that denylisted metrics never reach the output.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use cloudflare_exporter::analytics::{Aggregator, AnalyticsRecord};
use cloudflare_exporter::api::create_metrics_router;
use cloudflare_exporter::metrics::{MetricName, MetricRegistry, MetricsSet};
use std::sync::Arc;
use tower::ServiceExt;

fn record(status: u16, host: &str, count: u64) -> AnalyticsRecord {
    AnalyticsRecord {
        zone_tag: "zone1".to_string(),
        edge_response_status: status,
        client_host: host.to_string(),
        count,
    }
}

async fn get_body(registry: Arc<MetricRegistry>, metrics_path: &str, uri: &str) -> (StatusCode, String) {
    let app = create_metrics_router(registry, metrics_path);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_metrics_endpoint_renders_counters() {
    let registry = Arc::new(MetricRegistry::new(&MetricsSet::new()).unwrap());
    let aggregator = Aggregator::new(Arc::clone(&registry));
    aggregator.fold(
        &[record(200, "example.com", 3), record(200, "example.com", 5), record(404, "test.com", 1)],
        |_| Some("example.com"),
        "/api/%",
    );

    let app = create_metrics_router(Arc::clone(&registry), "/metrics");
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        prometheus::TEXT_FORMAT
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains(
        r#"cloudflare_zone_requests_status_country_host{host="example.com",path="/api/%",status="200",zone="example.com"} 8"#
    ));
    assert!(body.contains(
        r#"cloudflare_zone_requests_status_country_host{host="test.com",path="/api/%",status="404",zone="example.com"} 1"#
    ));
}

#[tokio::test]
async fn test_metrics_endpoint_custom_path() {
    let registry = Arc::new(MetricRegistry::new(&MetricsSet::new()).unwrap());

    let (status, _) = get_body(Arc::clone(&registry), "/prom", "/prom").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_body(registry, "/prom", "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_denylisted_metric_is_not_exposed() {
    let mut denied = MetricsSet::new();
    denied.add(MetricName::ZoneRequestStatusCountryHost);
    let registry = Arc::new(MetricRegistry::new(&denied).unwrap());
    Aggregator::new(Arc::clone(&registry)).fold(
        &[record(200, "example.com", 3)],
        |_| Some("example.com"),
        "/api/%",
    );

    let (status, body) = get_body(registry, "/metrics", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("cloudflare_zone_requests_status_country_host"));
}

#[tokio::test]
async fn test_health_check() {
    let registry = Arc::new(MetricRegistry::new(&MetricsSet::new()).unwrap());
    let (status, body) = get_body(registry, "/metrics", "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "OK");
}

#[tokio::test]
async fn test_concurrent_folds_and_reads_stay_consistent() {
    let registry = Arc::new(MetricRegistry::new(&MetricsSet::new()).unwrap());
    let mut handles = Vec::new();

    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let aggregator = Aggregator::new(Arc::clone(&registry));
            for _ in 0..50 {
                aggregator.fold(&[record(200, "example.com", 2)], |_| Some("example.com"), "/%");
                let _ = registry.gather().unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let (_, body) = get_body(registry, "/metrics", "/metrics").await;
    assert!(body.contains(
        r#"cloudflare_zone_requests_status_country_host{host="example.com",path="/%",status="200",zone="example.com"} 800"#
    ));
}
