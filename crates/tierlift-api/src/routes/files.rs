//! Spreadsheet upload and processed-file download.
//!
//! ## Routes
//!
//! - `POST /upload` - Store an `.xlsx` file in the input container
//! - `GET  /api/download/*name` - Stream a processed file from the output container

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tierlift_core::ObjectReference;
use tierlift_remediation::XLSX_CONTENT_TYPE;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Rejection message for non-spreadsheet uploads.
pub const XLSX_ONLY: &str =
    "Only .xlsx files are allowed. Please upload an Excel file with .xlsx extension.";

/// Response for a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Always `success`.
    pub status: String,
    /// Human-readable confirmation.
    pub message: String,
    /// Blob name the file was stored under.
    pub original_file: String,
}

/// Creates upload and download routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .route("/api/download/", get(download_unnamed))
        .route("/api/download/*name", get(download))
}

/// Stores an uploaded spreadsheet in the input container.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "frontend",
    request_body(content = String, content_type = "multipart/form-data", description = "Form with a `file` field"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file or not an .xlsx file"),
        (status = 500, description = "Input location not configured or upload failed"),
    )
)]
pub(crate) async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let (file_name, data) = read_file_field(&mut multipart).await?;

    if !has_xlsx_extension(&file_name) {
        tracing::warn!(file_name = %file_name, "rejected non-spreadsheet upload");
        return Err(ApiError::bad_request(XLSX_ONLY));
    }

    let (account, container) = state.config.upload_destination().ok_or_else(|| {
        ApiError::configuration("input storage account and container must be set")
    })?;

    let blob_name = base_name(&file_name).to_string();
    let target = ObjectReference::new(account, container, blob_name.clone())?;
    let size = data.len();
    state
        .store()
        .upload(&target, data, XLSX_CONTENT_TYPE)
        .await
        .map_err(|e| ApiError::internal(e.to_string()).context("failed to upload blob"))?;

    tracing::info!(blob = %target, size, "upload stored");
    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: format!("Upload successful: {blob_name}. File is being processed..."),
        original_file: blob_name,
    }))
}

async fn read_file_field(multipart: &mut Multipart) -> ApiResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to parse form: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
        return Ok((file_name, data));
    }
    Err(ApiError::bad_request(format!(
        "failed to get file: missing form field {UPLOAD_FIELD:?}"
    )))
}

fn has_xlsx_extension(file_name: &str) -> bool {
    std::path::Path::new(base_name(file_name))
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

/// Last component of a client-supplied path, for either separator.
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

async fn download_unnamed() -> ApiError {
    ApiError::bad_request("Filename required")
}

/// Streams a processed spreadsheet from the output container.
#[utoipa::path(
    get,
    path = "/api/download/{name}",
    tag = "frontend",
    params(("name" = String, Path, description = "Blob name in the output container")),
    responses(
        (status = 200, description = "Spreadsheet bytes sent as an attachment"),
        (status = 400, description = "Empty file name"),
        (status = 404, description = "No such file"),
        (status = 500, description = "Storage not configured or read failed"),
    )
)]
pub(crate) async fn download(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let (account, container) = state
        .config
        .download_location()
        .ok_or_else(|| ApiError::configuration("Storage account not configured"))?;

    let blob = ObjectReference::new(account, container, name.clone())?;
    let data = state.store().download(&blob).await.map_err(|e| {
        if e.is_not_found() {
            ApiError::not_found(format!("file not found: {name}"))
        } else {
            tracing::error!(blob = %blob, error = %e, "failed to download blob");
            ApiError::internal("Failed to download file")
        }
    })?;

    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|_| ApiError::bad_request("file name is not a valid header value"))?;

    tracing::info!(blob = %blob, size = data.len(), "download served");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_xlsx_extension("report.xlsx"));
        assert!(has_xlsx_extension("REPORT.XLSX"));
        assert!(has_xlsx_extension("C:\\Users\\me\\report.Xlsx"));
        assert!(!has_xlsx_extension("report.xls"));
        assert!(!has_xlsx_extension("report.xlsx.csv"));
        assert!(!has_xlsx_extension("xlsx"));
        assert!(!has_xlsx_extension(""));
    }

    #[test]
    fn base_name_strips_client_directories() {
        assert_eq!(base_name("dir/sub/report.xlsx"), "report.xlsx");
        assert_eq!(base_name("C:\\tmp\\report.xlsx"), "report.xlsx");
        assert_eq!(base_name("report.xlsx"), "report.xlsx");
    }
}
