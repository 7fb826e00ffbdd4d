//! HTTP route handlers.

pub mod files;
pub mod notifications;
pub mod process;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::Router;

use crate::event_grid::ValidationResponse;
use crate::server::AppState;

/// Webhook and frontend routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(process::routes())
        .merge(notifications::routes())
        .merge(files::routes())
}

/// Completes a subscription validation handshake.
pub(crate) fn validation_echo(code: String) -> Response {
    tracing::info!("subscription validation handshake completed");
    (
        StatusCode::OK,
        Json(ValidationResponse {
            validation_response: code,
        }),
    )
        .into_response()
}
