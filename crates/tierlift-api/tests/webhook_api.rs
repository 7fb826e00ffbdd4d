//! Webhook contract tests for `POST /process` driven through the router.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tierlift_api::server::ServerBuilder;
use tierlift_core::AccessTier;
use tierlift_test_utils::{
    blob_created_body, event, validation_body, workbook_bytes, OpKind, StoreOp, TracingBlobStore,
};

const SOURCE: &str = "https://inacct.blob.core.windows.net/uploads/inventory.xlsx";
const SECOND: &str = "https://inacct.blob.core.windows.net/uploads/second.xlsx";
const MISSING: &str = "https://inacct.blob.core.windows.net/uploads/missing.xlsx";
const OUTPUT: &str = "https://outacct.blob.core.windows.net/processed-files/inventory_processed.xlsx";
const A: &str = "https://acct.blob.core.windows.net/cont/a.txt";

fn router(store: &TracingBlobStore) -> Router {
    ServerBuilder::new()
        .store(Arc::new(store.clone()))
        .output("outacct", "processed-files")
        .build()
        .test_router()
}

fn seeded_store() -> TracingBlobStore {
    let store = TracingBlobStore::new();
    store.insert_blob(SOURCE, workbook_bytes(&[&["blob_url"], &[A]]), None);
    store.insert_blob(A, "payload", Some(AccessTier::Archive));
    store
}

async fn post(router: Router, path: &str, body: Vec<u8>) -> Result<(StatusCode, Option<String>, Bytes)> {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .context("build request")?;
    let response = router.oneshot(request).await?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .context("read response body")?;
    Ok((status, content_type, body))
}

async fn post_json(router: Router, path: &str, body: &Value) -> Result<(StatusCode, Option<String>, Bytes)> {
    post(router, path, serde_json::to_vec(body)?).await
}

#[tokio::test]
async fn validation_handshake_echoes_code_without_store_calls() -> Result<()> {
    let store = seeded_store();
    store.clear_operations();

    let (status, content_type, body) =
        post_json(router(&store), "/process", &validation_body("abc123")).await?;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.is_some_and(|v| v.starts_with("application/json")));
    let payload: Value = serde_json::from_slice(&body).context("parse JSON body")?;
    assert_eq!(payload, json!({ "validationResponse": "abc123" }));
    assert!(store.operations().is_empty());
    Ok(())
}

#[tokio::test]
async fn blob_created_event_runs_full_pass() -> Result<()> {
    let store = seeded_store();

    let (status, _, body) = post_json(router(&store), "/process", &blob_created_body(&[SOURCE])).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"Event processed");
    assert_eq!(store.set_tier_calls(), 1);
    assert_eq!(store.access_tier(A), Some(Some(AccessTier::Cool)));
    assert!(store.blob(OUTPUT).is_some());
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_bad_request() -> Result<()> {
    let store = seeded_store();
    store.clear_operations();

    let (status, content_type, body) =
        post(router(&store), "/process", b"{\"not\":\"an array\"}".to_vec()).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.is_some_and(|v| v.starts_with("text/plain")));
    assert_eq!(&body[..], b"bad request");
    assert!(store.operations().is_empty());
    Ok(())
}

#[tokio::test]
async fn other_event_types_are_skipped() -> Result<()> {
    let store = seeded_store();
    store.clear_operations();
    let body = json!([event("1", "Microsoft.Storage.BlobDeleted", SOURCE)]);

    let (status, _, response) = post_json(router(&store), "/process", &body).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&response[..], b"Event processed");
    assert!(store.operations().is_empty());
    Ok(())
}

#[tokio::test]
async fn untyped_event_is_skipped_and_rest_of_batch_runs() -> Result<()> {
    let store = seeded_store();
    let body = json!([
        {"id": "0", "data": {}},
        event("1", "Microsoft.Storage.BlobCreated", SOURCE),
    ]);

    let (status, _, response) = post_json(router(&store), "/process", &body).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&response[..], b"Event processed");
    assert_eq!(store.set_tier_calls(), 1);
    assert_eq!(store.access_tier(A), Some(Some(AccessTier::Cool)));
    assert!(store.blob(OUTPUT).is_some());
    Ok(())
}

#[tokio::test]
async fn missing_output_configuration_fails_before_store_access() -> Result<()> {
    let store = seeded_store();
    store.clear_operations();
    let router = ServerBuilder::new()
        .store(Arc::new(store.clone()))
        .build()
        .test_router();

    let (status, _, body) = post_json(router, "/process", &blob_created_body(&[SOURCE])).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body.to_vec())?;
    assert!(text.starts_with("failed to process blob:"), "{text}");
    assert!(store.operations().is_empty());
    assert_eq!(store.access_tier(A), Some(Some(AccessTier::Archive)));
    Ok(())
}

#[tokio::test]
async fn failing_event_stops_batch_without_rollback() -> Result<()> {
    let store = seeded_store();
    store.insert_blob(SECOND, workbook_bytes(&[&["blob_url"], &[A]]), None);

    let (status, _, body) = post_json(
        router(&store),
        "/process",
        &blob_created_body(&[SOURCE, MISSING, SECOND]),
    )
    .await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body.to_vec())?.starts_with("failed to process blob:"));
    assert!(store.blob(OUTPUT).is_some());
    assert_eq!(store.access_tier(A), Some(Some(AccessTier::Cool)));
    assert!(!store.operations().contains(&StoreOp::Download {
        url: SECOND.to_string()
    }));
    Ok(())
}

#[tokio::test]
async fn publish_failure_is_server_error() -> Result<()> {
    let store = seeded_store();
    store.inject_failure(OpKind::Upload, "https://outacct.blob.core.windows.net/");

    let (status, _, body) = post_json(router(&store), "/process", &blob_created_body(&[SOURCE])).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body.to_vec())?.contains("injected"));
    Ok(())
}

#[tokio::test]
async fn blob_event_without_url_is_server_error() -> Result<()> {
    let store = seeded_store();
    let body = json!([{
        "id": "9",
        "eventType": "Microsoft.Storage.BlobCreated",
        "data": {}
    }]);

    let (status, _, _) = post_json(router(&store), "/process", &body).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn percent_encoded_event_url_is_decoded() -> Result<()> {
    let store = TracingBlobStore::new();
    let literal = "https://inacct.blob.core.windows.net/uploads/q1 report.xlsx";
    store.insert_blob(literal, workbook_bytes(&[&["url"], &[A]]), None);
    store.insert_blob(A, "payload", Some(AccessTier::Archive));

    let encoded = "https://inacct.blob.core.windows.net/uploads/q1%20report.xlsx";
    let (status, _, _) = post_json(router(&store), "/process", &blob_created_body(&[encoded])).await?;

    assert_eq!(status, StatusCode::OK);
    assert!(store
        .blob("https://outacct.blob.core.windows.net/processed-files/q1 report_processed.xlsx")
        .is_some());
    Ok(())
}
