//! `OpenAPI` (3.1) specification generation for `tierlift-api`.

use utoipa::OpenApi;

/// `OpenAPI` documentation for the tierlift HTTP API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tierlift API",
        description = "Archive-tier remediation webhooks and upload frontend"
    ),
    paths(
        crate::routes::process::process_events,
        crate::routes::notifications::processed_notification,
        crate::routes::notifications::latest_processed,
        crate::routes::files::upload,
        crate::routes::files::download,
    ),
    components(
        schemas(
            crate::event_grid::EventEnvelope,
            crate::event_grid::ValidationResponse,
            crate::latest::LatestPublishedFile,
            crate::routes::notifications::LatestProcessedResponse,
            crate::routes::files::UploadResponse,
            crate::server::HealthResponse,
        )
    ),
    tags(
        (name = "webhook", description = "Event Grid remediation webhook"),
        (name = "frontend", description = "Upload, notification, and download endpoints"),
    ),
)]
pub struct ApiDoc;

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc
}

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tracks_crate_version() {
        assert_eq!(openapi().info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn documents_every_route() {
        let json = openapi_json().expect("serialize");
        for path in [
            "/process",
            "/api/processed-notification",
            "/api/latest-processed",
            "/upload",
            "/api/download/{name}",
        ] {
            assert!(json.contains(&format!("\"{path}\"")), "missing {path}");
        }
    }
}
