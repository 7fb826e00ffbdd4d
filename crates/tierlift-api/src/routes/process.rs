//! Remediation webhook.
//!
//! ## Routes
//!
//! - `POST /process` - Validation handshake, or remediate each created blob

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tracing::Instrument;

use tierlift_core::observability::webhook_span;
use tierlift_core::redaction::RedactedUrl;

use crate::error::{ApiError, ApiResult};
use crate::event_grid::{parse_batch, EventEnvelope, WebhookBatch};
use crate::metrics::record_webhook_event;
use crate::server::AppState;

const ENDPOINT: &str = "/process";

/// Acknowledgement body for a fully processed batch.
pub const EVENT_PROCESSED: &str = "Event processed";

/// Creates the remediation webhook route.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(ENDPOINT, post(process_events))
}

/// Handles one Event Grid delivery.
///
/// Events are processed in order. The first failing event ends the request
/// with 500; events before it keep their effects.
#[utoipa::path(
    post,
    path = "/process",
    tag = "webhook",
    request_body = Vec<EventEnvelope>,
    responses(
        (status = 200, description = "Handshake echoed, or every event processed", body = crate::event_grid::ValidationResponse),
        (status = 400, description = "Body is not an event array"),
        (status = 500, description = "An event failed; earlier events are not rolled back"),
    )
)]
pub(crate) async fn process_events(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Response> {
    let batch = parse_batch(&body).map_err(|e| {
        record_webhook_event(ENDPOINT, "rejected");
        tracing::warn!(error = %e, "failed to decode webhook body");
        ApiError::bad_request("bad request")
    })?;

    let events = match batch {
        WebhookBatch::Validation(code) => {
            record_webhook_event(ENDPOINT, "validation");
            return Ok(super::validation_echo(code));
        }
        WebhookBatch::Events(events) => events,
    };

    let span = webhook_span(ENDPOINT, events.len());
    async {
        for event in &events {
            dispatch(&state, event).await?;
        }
        Ok::<_, ApiError>(EVENT_PROCESSED.into_response())
    }
    .instrument(span)
    .await
}

async fn dispatch(state: &AppState, event: &EventEnvelope) -> ApiResult<()> {
    if !event.is_blob_created() {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "skipping event");
        record_webhook_event(ENDPOINT, "skipped");
        return Ok(());
    }

    let Some(url) = event.blob_url() else {
        record_webhook_event(ENDPOINT, "failed");
        return Err(ApiError::internal(format!("event {} carries no blob url", event.id))
            .context("failed to process blob"));
    };

    match state.pipeline().process_url(url).await {
        Ok(report) => {
            record_webhook_event(ENDPOINT, "processed");
            tracing::info!(
                event_id = %event.id,
                source = %RedactedUrl(url),
                output = %report.output,
                stats = %report.stats,
                "event processed"
            );
            Ok(())
        }
        Err(e) => {
            record_webhook_event(ENDPOINT, "failed");
            Err(ApiError::from(e).context("failed to process blob"))
        }
    }
}
