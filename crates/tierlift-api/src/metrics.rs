//! Metrics middleware and instrumentation for the tierlift API.
//!
//! Provides Prometheus metrics for:
//! - Request duration and throughput
//! - Webhook event dispositions

use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// API request duration histogram.
pub const API_REQUEST_DURATION: &str = "tierlift_api_request_duration_seconds";

/// API request counter.
pub const API_REQUEST_TOTAL: &str = "tierlift_api_request_total";

/// Webhook event counter, labelled by endpoint and disposition.
pub const WEBHOOK_EVENTS_TOTAL: &str = "tierlift_webhook_events_total";

const UNMATCHED_ENDPOINT: &str = "unmatched";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initializes the global metrics recorder with Prometheus exporter.
///
/// Safe to call multiple times; subsequent calls are no-ops.
///
/// # Panics
///
/// Panics if the Prometheus recorder cannot be installed.
#[allow(clippy::panic)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"));

            describe_histogram!(API_REQUEST_DURATION, "Duration of API requests in seconds");
            describe_counter!(API_REQUEST_TOTAL, "Total number of API requests");
            describe_counter!(
                WEBHOOK_EVENTS_TOTAL,
                "Webhook events by endpoint and disposition"
            );

            tracing::info!("Prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

pub(crate) fn endpoint_label<B>(request: &Request<B>) -> String {
    request.extensions().get::<MatchedPath>().map_or_else(
        || UNMATCHED_ENDPOINT.to_string(),
        |path| path.as_str().to_string(),
    )
}

/// Middleware that records request metrics.
///
/// Captures:
/// - `tierlift_api_request_duration_seconds{endpoint, method, status_class}`
/// - `tierlift_api_request_total{endpoint, method, status_class}`
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = endpoint_label(&request);
    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let labels = [
        ("endpoint", path.clone()),
        ("method", method.clone()),
        ("status_class", status_class(response.status()).to_string()),
    ];

    histogram!(API_REQUEST_DURATION, &labels).record(duration);
    counter!(API_REQUEST_TOTAL, &labels).increment(1);

    if duration > 30.0 {
        tracing::warn!(
            endpoint = %path,
            method = %method,
            status = response.status().as_u16(),
            duration_secs = %duration,
            "Slow request detected"
        );
    }

    response
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    }
}

/// Handler for the `/metrics` endpoint.
pub async fn serve_metrics() -> impl IntoResponse {
    prometheus_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain; charset=utf-8")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

/// Records what a webhook endpoint did with one event or batch.
pub fn record_webhook_event(endpoint: &'static str, disposition: &'static str) {
    counter!(
        WEBHOOK_EVENTS_TOTAL,
        "endpoint" => endpoint,
        "disposition" => disposition
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::post;
    use axum::Router;
    use tower::Service;

    fn metric_lines<'a>(metrics: &'a str, name: &str) -> Vec<&'a str> {
        metrics
            .lines()
            .filter(|line| line.starts_with(name))
            .collect()
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(StatusCode::OK), "2xx");
        assert_eq!(status_class(StatusCode::BAD_REQUEST), "4xx");
        assert_eq!(status_class(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_class(StatusCode::INTERNAL_SERVER_ERROR), "5xx");
    }

    #[test]
    fn test_endpoint_label_unmatched() {
        let request = Request::builder()
            .uri("/missing")
            .body(Body::empty())
            .unwrap();
        assert_eq!(endpoint_label(&request), UNMATCHED_ENDPOINT);
    }

    #[test]
    fn test_webhook_counter_labels() {
        let handle = init_metrics();
        record_webhook_event("/process", "skipped");
        let metrics = handle.render();
        let lines = metric_lines(&metrics, WEBHOOK_EVENTS_TOTAL);
        assert!(lines
            .iter()
            .any(|line| line.contains("endpoint=\"/process\"") && line.contains("disposition=\"skipped\"")));
    }

    #[tokio::test]
    async fn test_request_metrics_use_route_template() {
        let handle = init_metrics();
        let app = Router::new()
            .route("/api/download/*name", post(|| async { StatusCode::OK }))
            .route_layer(axum::middleware::from_fn(metrics_middleware));
        let request = Request::builder()
            .method("POST")
            .uri("/api/download/report_processed.xlsx")
            .body(Body::empty())
            .unwrap();
        let mut service = app.into_service::<Body>();
        let _response = service.call(request).await.unwrap();
        let metrics = handle.render();
        let lines = metric_lines(&metrics, API_REQUEST_TOTAL);
        assert!(lines
            .iter()
            .any(|line| line.contains("endpoint=\"/api/download/*name\"")));
        assert!(!metrics.contains("report_processed.xlsx"));
    }
}
