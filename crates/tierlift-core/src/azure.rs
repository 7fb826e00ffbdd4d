//! Blob service REST backend.
//!
//! Speaks the subset of the Blob REST API the pipeline needs. The endpoint is
//! a template containing `{account}`, so the same client serves every account
//! a spreadsheet references and can be pointed at an emulator.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LAST_MODIFIED};
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use crate::blob_ref::ObjectReference;
use crate::credential::StorageCredential;
use crate::error::{Error, Result};
use crate::storage::{AccessTier, BlobProperties, BlobStore, ContainerStatus};

/// Default public endpoint template.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://{account}.blob.core.windows.net";

const API_VERSION: &str = "2021-08-06";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blob store backed by the Blob REST API.
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    client: reqwest::Client,
    endpoint_template: String,
    credential: StorageCredential,
}

impl AzureBlobStore {
    /// Creates a client for the given endpoint template.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the template lacks `{account}` or the
    /// HTTP client cannot be built.
    pub fn new(endpoint_template: impl Into<String>, credential: StorageCredential) -> Result<Self> {
        let endpoint_template = endpoint_template.into();
        if !endpoint_template.contains("{account}") {
            return Err(Error::Configuration(format!(
                "blob endpoint template must contain {{account}}: {endpoint_template}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint_template: endpoint_template.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn account_endpoint(&self, account: &str) -> String {
        self.endpoint_template.replace("{account}", account)
    }

    fn blob_url(&self, blob: &ObjectReference, query: Option<&str>) -> String {
        let base = format!(
            "{}/{}/{}",
            self.account_endpoint(blob.account()),
            blob.container(),
            blob.encoded_path()
        );
        self.with_query(base, query)
    }

    fn container_url(&self, account: &str, container: &str) -> String {
        let base = format!("{}/{container}", self.account_endpoint(account));
        self.with_query(base, Some("restype=container"))
    }

    fn with_query(&self, base: String, query: Option<&str>) -> String {
        let parts: Vec<&str> = query
            .into_iter()
            .chain(self.credential.sas_query())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            base
        } else {
            format!("{base}?{}", parts.join("&"))
        }
    }

    async fn request(&self, method: Method, url: String) -> Result<RequestBuilder> {
        let mut request = self
            .client
            .request(method, url)
            .header("x-ms-version", API_VERSION)
            .header(
                "x-ms-date",
                Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            );
        if let Some(token) = self.credential.bearer_token().await? {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| Error::storage_with_source(format!("{operation} request failed"), e))
    }
}

/// Maps a non-success response to a typed error.
async fn error_for_status(response: Response, operation: &str, target: &str) -> Error {
    let status = response.status();
    let code = error_code(response.headers()).unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Error::NotFound(format!("{target} ({code})"));
    }
    let body = response.text().await.unwrap_or_default();
    Error::storage(format!(
        "{operation} failed (status={status}, code={code}): {body}"
    ))
}

fn error_code(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "x-ms-error-code")
}

fn header_string(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_properties(headers: &HeaderMap) -> BlobProperties {
    BlobProperties {
        size: header_string(headers, CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default(),
        content_type: header_string(headers, CONTENT_TYPE),
        access_tier: header_string(headers, "x-ms-access-tier").map(|v| AccessTier::parse(&v)),
        archive_status: header_string(headers, "x-ms-archive-status"),
        last_modified: header_string(headers, LAST_MODIFIED)
            .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
            .map(|v| v.with_timezone(&Utc)),
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn properties(&self, blob: &ObjectReference) -> Result<BlobProperties> {
        let request = self.request(Method::HEAD, self.blob_url(blob, None)).await?;
        let response = self.send(request, "get properties").await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "get properties", &blob.to_string()).await);
        }
        Ok(parse_properties(response.headers()))
    }

    async fn download(&self, blob: &ObjectReference) -> Result<Bytes> {
        let request = self.request(Method::GET, self.blob_url(blob, None)).await?;
        let response = self.send(request, "download").await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "download", &blob.to_string()).await);
        }
        response
            .bytes()
            .await
            .map_err(|e| Error::storage_with_source("download body read failed", e))
    }

    async fn upload(&self, blob: &ObjectReference, data: Bytes, content_type: &str) -> Result<()> {
        let request = self
            .request(Method::PUT, self.blob_url(blob, None))
            .await?
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header(CONTENT_TYPE, content_type)
            .body(data);
        let response = self.send(request, "upload").await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "upload", &blob.to_string()).await);
        }
        Ok(())
    }

    async fn set_tier(&self, blob: &ObjectReference, tier: AccessTier) -> Result<()> {
        let request = self
            .request(Method::PUT, self.blob_url(blob, Some("comp=tier")))
            .await?
            .header("x-ms-access-tier", tier.as_str())
            .header(CONTENT_LENGTH, 0);
        let response = self.send(request, "set tier").await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "set tier", &blob.to_string()).await);
        }
        Ok(())
    }

    async fn create_container(&self, account: &str, container: &str) -> Result<ContainerStatus> {
        let request = self
            .request(Method::PUT, self.container_url(account, container))
            .await?
            .header(CONTENT_LENGTH, 0);
        let response = self.send(request, "create container").await?;

        if response.status().is_success() {
            return Ok(ContainerStatus::Created);
        }
        if response.status() == StatusCode::CONFLICT
            && error_code(response.headers()).as_deref() == Some("ContainerAlreadyExists")
        {
            return Ok(ContainerStatus::AlreadyExists);
        }
        Err(error_for_status(response, "create container", &format!("{account}/{container}")).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{OriginalUri, State};
    use axum::http::{HeaderMap as AxumHeaders, Method as AxumMethod};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::any;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        uri: String,
        tier: Option<String>,
        authorization: Option<String>,
    }

    type Log = Arc<Mutex<Vec<Seen>>>;

    async fn handle(
        State(log): State<Log>,
        method: AxumMethod,
        OriginalUri(uri): OriginalUri,
        headers: AxumHeaders,
    ) -> AxumResponse {
        let uri = uri.to_string();
        log.lock().expect("log").push(Seen {
            method: method.to_string(),
            uri: uri.clone(),
            tier: headers
                .get("x-ms-access-tier")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });

        if uri.contains("/missing") {
            return (
                axum::http::StatusCode::NOT_FOUND,
                [("x-ms-error-code", "BlobNotFound")],
            )
                .into_response();
        }
        if uri.contains("restype=container") && uri.contains("/existing") {
            return (
                axum::http::StatusCode::CONFLICT,
                [("x-ms-error-code", "ContainerAlreadyExists")],
            )
                .into_response();
        }
        match method {
            AxumMethod::HEAD => (
                axum::http::StatusCode::OK,
                [
                    ("x-ms-access-tier", "Archive"),
                    ("content-type", "text/plain"),
                    ("last-modified", "Wed, 01 Jan 2025 00:00:00 GMT"),
                ],
            )
                .into_response(),
            AxumMethod::GET => "hello".into_response(),
            AxumMethod::PUT if uri.contains("restype=container") => {
                axum::http::StatusCode::CREATED.into_response()
            }
            AxumMethod::PUT => axum::http::StatusCode::OK.into_response(),
            _ => axum::http::StatusCode::METHOD_NOT_ALLOWED.into_response(),
        }
    }

    async fn spawn_blob_server() -> (String, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/:account/:container", any(handle))
            .route("/:account/:container/*path", any(handle))
            .with_state(Arc::clone(&log));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (format!("http://{addr}/{{account}}"), log)
    }

    fn reference(container: &str, path: &str) -> ObjectReference {
        ObjectReference::new("acct", container, path).expect("reference")
    }

    #[test]
    fn rejects_template_without_account() {
        let err = AzureBlobStore::new("https://example.com", StorageCredential::Anonymous)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn properties_reads_access_tier() {
        let (endpoint, log) = spawn_blob_server().await;
        let store = AzureBlobStore::new(endpoint, StorageCredential::Anonymous).expect("store");

        let props = store
            .properties(&reference("cont", "folder/a b.txt"))
            .await
            .expect("properties");
        assert_eq!(props.access_tier, Some(AccessTier::Archive));
        assert_eq!(props.content_type.as_deref(), Some("text/plain"));
        assert!(props.last_modified.is_some());

        let seen = log.lock().expect("log").clone();
        assert_eq!(seen[0].method, "HEAD");
        assert_eq!(seen[0].uri, "/acct/cont/folder/a%20b.txt");
    }

    #[tokio::test]
    async fn missing_blob_maps_to_not_found() {
        let (endpoint, _log) = spawn_blob_server().await;
        let store = AzureBlobStore::new(endpoint, StorageCredential::Anonymous).expect("store");

        let err = store
            .properties(&reference("cont", "missing.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn set_tier_sends_tier_header_with_bearer_token() {
        let (endpoint, log) = spawn_blob_server().await;
        let store = AzureBlobStore::new(endpoint, StorageCredential::Bearer("tok".to_string()))
            .expect("store");

        store
            .set_tier(&reference("cont", "a.txt"), AccessTier::Cool)
            .await
            .expect("set tier");

        let seen = log.lock().expect("log").clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].uri, "/acct/cont/a.txt?comp=tier");
        assert_eq!(seen[0].tier.as_deref(), Some("Cool"));
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn sas_token_is_appended_to_query() {
        let (endpoint, log) = spawn_blob_server().await;
        let store = AzureBlobStore::new(endpoint, StorageCredential::Sas("?sv=1&sig=x".to_string()))
            .expect("store");

        let data = store
            .download(&reference("cont", "a.txt"))
            .await
            .expect("download");
        assert_eq!(data, Bytes::from("hello"));

        let seen = log.lock().expect("log").clone();
        assert_eq!(seen[0].uri, "/acct/cont/a.txt?sv=1&sig=x");
        assert!(seen[0].authorization.is_none());
    }

    #[tokio::test]
    async fn create_container_treats_conflict_as_existing() {
        let (endpoint, _log) = spawn_blob_server().await;
        let store = AzureBlobStore::new(endpoint, StorageCredential::Anonymous).expect("store");

        assert_eq!(
            store.create_container("acct", "fresh").await.expect("create"),
            ContainerStatus::Created
        );
        assert_eq!(
            store.create_container("acct", "existing").await.expect("create"),
            ContainerStatus::AlreadyExists
        );
    }
}
