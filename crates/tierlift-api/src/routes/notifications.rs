//! Processed-file notifications for the upload frontend.
//!
//! ## Routes
//!
//! - `POST /api/processed-notification` - Record newly published outputs
//! - `GET  /api/latest-processed` - Most recent published output

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tierlift_core::observability::webhook_span;
use tierlift_core::redaction::RedactedUrl;
use tierlift_remediation::OUTPUT_SUFFIX;

use crate::error::{ApiError, ApiResult};
use crate::event_grid::{parse_batch, EventEnvelope, WebhookBatch};
use crate::latest::LatestPublishedFile;
use crate::metrics::record_webhook_event;
use crate::server::AppState;

const ENDPOINT: &str = "/api/processed-notification";

/// Acknowledgement body for a notification batch.
pub const NOTIFICATION_PROCESSED: &str = "Notification processed";

/// Message returned while nothing has been published.
pub const NOTHING_PUBLISHED: &str = "No processed files available yet";

/// Response for `GET /api/latest-processed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LatestProcessedResponse {
    /// Whether any output has been published.
    pub available: bool,
    /// The most recent output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<LatestPublishedFile>,
    /// Explanation when nothing is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Creates notification routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ENDPOINT, post(processed_notification))
        .route("/api/latest-processed", get(latest_processed))
}

/// Handles one Event Grid delivery for the frontend.
#[utoipa::path(
    post,
    path = "/api/processed-notification",
    tag = "frontend",
    request_body = Vec<EventEnvelope>,
    responses(
        (status = 200, description = "Handshake echoed, or notifications recorded", body = crate::event_grid::ValidationResponse),
        (status = 400, description = "Body is not an event array"),
    )
)]
pub(crate) async fn processed_notification(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Response> {
    let batch = parse_batch(&body).map_err(|e| {
        record_webhook_event(ENDPOINT, "rejected");
        tracing::warn!(error = %e, "failed to decode notification body");
        ApiError::bad_request("bad request")
    })?;

    let events = match batch {
        WebhookBatch::Validation(code) => {
            record_webhook_event(ENDPOINT, "validation");
            return Ok(super::validation_echo(code));
        }
        WebhookBatch::Events(events) => events,
    };

    let _guard = webhook_span(ENDPOINT, events.len()).entered();
    for event in &events {
        record(&state, event);
    }
    Ok(NOTIFICATION_PROCESSED.into_response())
}

fn record(state: &AppState, event: &EventEnvelope) {
    if !event.is_blob_created() {
        tracing::debug!(event_type = %event.event_type, "skipping event");
        record_webhook_event(ENDPOINT, "skipped");
        return;
    }
    let Some(url) = event.blob_url() else {
        record_webhook_event(ENDPOINT, "ignored");
        return;
    };
    let file_name = url_file_name(url);
    if !file_name.ends_with(OUTPUT_SUFFIX) {
        tracing::debug!(file_name, "ignoring non-output blob");
        record_webhook_event(ENDPOINT, "ignored");
        return;
    }

    state
        .latest()
        .record(LatestPublishedFile::new(file_name, url, Utc::now()));
    record_webhook_event(ENDPOINT, "recorded");
    tracing::info!(file_name, url = %RedactedUrl(url), "latest processed file updated");
}

fn url_file_name(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns the most recently published output.
#[utoipa::path(
    get,
    path = "/api/latest-processed",
    tag = "frontend",
    responses(
        (status = 200, description = "Latest output, or availability false", body = LatestProcessedResponse),
    )
)]
pub(crate) async fn latest_processed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = match state.latest().current() {
        Some(file) => LatestProcessedResponse {
            available: true,
            file: Some(file),
            message: None,
        },
        None => LatestProcessedResponse {
            available: false,
            file: None,
            message: Some(NOTHING_PUBLISHED.to_string()),
        },
    };
    Json(response)
}
