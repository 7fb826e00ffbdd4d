//! Storage credentials.
//!
//! Requests to the blob service authenticate in one of four ways: not at all,
//! with a fixed bearer token, with a SAS query string, or with a token fetched
//! from the platform's managed identity endpoint.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// OAuth resource identifier for the blob service.
pub const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Tokens are refreshed this many seconds before they expire.
const REFRESH_MARGIN_SECS: i64 = 300;

/// How requests to the blob service authenticate.
#[derive(Clone)]
pub enum StorageCredential {
    /// No authentication (public containers, local emulators).
    Anonymous,
    /// Fixed bearer token.
    Bearer(String),
    /// Shared access signature appended to every request URL.
    Sas(String),
    /// Token from the managed identity endpoint.
    ManagedIdentity(ManagedIdentity),
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Sas(_) => f.write_str("Sas([REDACTED])"),
            Self::ManagedIdentity(identity) => {
                f.debug_tuple("ManagedIdentity").field(identity).finish()
            }
        }
    }
}

impl StorageCredential {
    /// Returns the SAS query string (without a leading `?`), if any.
    #[must_use]
    pub fn sas_query(&self) -> Option<&str> {
        match self {
            Self::Sas(query) => Some(query.trim_start_matches('?')),
            _ => None,
        }
    }

    /// Returns the bearer token to send with the next request, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a managed identity token cannot be obtained.
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        match self {
            Self::Anonymous | Self::Sas(_) => Ok(None),
            Self::Bearer(token) => Ok(Some(token.clone())),
            Self::ManagedIdentity(identity) => identity.token().await.map(Some),
        }
    }
}

/// Where managed identity tokens come from.
#[derive(Clone)]
pub enum IdentityEndpoint {
    /// Container platforms expose `IDENTITY_ENDPOINT` and `IDENTITY_HEADER`.
    AppService {
        /// Token endpoint URL.
        endpoint: String,
        /// Value for the `X-IDENTITY-HEADER` request header.
        header: String,
    },
    /// Instance metadata service.
    Imds {
        /// Token endpoint URL.
        endpoint: String,
    },
}

impl fmt::Debug for IdentityEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppService { endpoint, .. } => f
                .debug_struct("AppService")
                .field("endpoint", endpoint)
                .field("header", &"[REDACTED]")
                .finish(),
            Self::Imds { endpoint } => f.debug_struct("Imds").field("endpoint", endpoint).finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_on: i64,
}

/// Managed identity token source with an in-process cache.
#[derive(Clone)]
pub struct ManagedIdentity {
    client: reqwest::Client,
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl fmt::Debug for ManagedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedIdentity")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_on: serde_json::Value,
}

impl ManagedIdentity {
    /// Creates a token source for an explicit endpoint.
    #[must_use]
    pub fn new(endpoint: IdentityEndpoint, client_id: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint,
            client_id,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Detects the endpoint from `IDENTITY_ENDPOINT`/`IDENTITY_HEADER`,
    /// falling back to the instance metadata service.
    #[must_use]
    pub fn from_env(client_id: Option<String>) -> Self {
        let endpoint = match (
            std::env::var("IDENTITY_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            std::env::var("IDENTITY_HEADER").ok().filter(|v| !v.trim().is_empty()),
        ) {
            (Some(endpoint), Some(header)) => IdentityEndpoint::AppService { endpoint, header },
            _ => IdentityEndpoint::Imds {
                endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            },
        };
        Self::new(endpoint, client_id)
    }

    /// Returns a valid access token, fetching a new one when the cached token
    /// is missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the identity endpoint fails or returns an
    /// unreadable response.
    pub async fn token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now().timestamp();
        if let Some(cached) = cache.as_ref() {
            if cached.expires_on - REFRESH_MARGIN_SECS > now {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let request = match &self.endpoint {
            IdentityEndpoint::AppService { endpoint, header } => {
                let mut url = parse_endpoint(endpoint)?;
                url.query_pairs_mut()
                    .append_pair("api-version", APP_SERVICE_API_VERSION)
                    .append_pair("resource", STORAGE_RESOURCE);
                if let Some(client_id) = &self.client_id {
                    url.query_pairs_mut().append_pair("client_id", client_id);
                }
                self.client.get(url).header("X-IDENTITY-HEADER", header)
            }
            IdentityEndpoint::Imds { endpoint } => {
                let mut url = parse_endpoint(endpoint)?;
                url.query_pairs_mut()
                    .append_pair("api-version", IMDS_API_VERSION)
                    .append_pair("resource", STORAGE_RESOURCE);
                if let Some(client_id) = &self.client_id {
                    url.query_pairs_mut().append_pair("client_id", client_id);
                }
                self.client.get(url).header("Metadata", "true")
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::storage_with_source("managed identity token request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::storage(format!(
                "managed identity token request failed (status={status}): {body}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::storage_with_source("managed identity token read failed", e))?;

        let expires_on = parse_expires_on(&parsed.expires_on).ok_or_else(|| {
            Error::storage(format!(
                "managed identity token has invalid expires_on: {}",
                parsed.expires_on
            ))
        })?;

        tracing::debug!(expires_on, "fetched managed identity token");
        Ok(CachedToken {
            token: parsed.access_token,
            expires_on,
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(endpoint)
        .map_err(|e| Error::Configuration(format!("invalid identity endpoint: {e}")))
}

/// Identity endpoints report `expires_on` as epoch seconds, as a string or a number.
fn parse_expires_on(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_token_server(expires_in: i64, calls: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/token",
            get(move |headers: HeaderMap| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(
                        headers.get("X-IDENTITY-HEADER").and_then(|v| v.to_str().ok()),
                        Some("secret-header")
                    );
                    let expires_on = (Utc::now().timestamp() + expires_in).to_string();
                    axum::Json(json!({
                        "access_token": format!("token-{n}"),
                        "expires_on": expires_on,
                    }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}/token")
    }

    fn app_service(endpoint: String) -> ManagedIdentity {
        ManagedIdentity::new(
            IdentityEndpoint::AppService {
                endpoint,
                header: "secret-header".to_string(),
            },
            None,
        )
    }

    #[tokio::test]
    async fn caches_token_until_refresh_margin() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = spawn_token_server(3600, Arc::clone(&calls)).await;
        let identity = app_service(endpoint);

        assert_eq!(identity.token().await.expect("token"), "token-0");
        assert_eq!(identity.token().await.expect("token"), "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refetches_token_inside_refresh_margin() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = spawn_token_server(60, Arc::clone(&calls)).await;
        let identity = app_service(endpoint);

        assert_eq!(identity.token().await.expect("token"), "token-0");
        assert_eq!(identity.token().await.expect("token"), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn endpoint_failure_is_storage_error() {
        let identity = app_service("http://127.0.0.1:1/token".to_string());
        let err = identity.token().await.unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn debug_redacts_secrets() {
        let bearer = format!("{:?}", StorageCredential::Bearer("s3cret".to_string()));
        let sas = format!("{:?}", StorageCredential::Sas("sig=s3cret".to_string()));
        assert!(!bearer.contains("s3cret"));
        assert!(!sas.contains("s3cret"));
    }

    #[test]
    fn sas_query_strips_leading_question_mark() {
        let credential = StorageCredential::Sas("?sv=1&sig=x".to_string());
        assert_eq!(credential.sas_query(), Some("sv=1&sig=x"));
        assert_eq!(StorageCredential::Anonymous.sas_query(), None);
    }

    #[test]
    fn expires_on_accepts_string_or_number() {
        assert_eq!(parse_expires_on(&json!("1700000000")), Some(1_700_000_000));
        assert_eq!(parse_expires_on(&json!(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(parse_expires_on(&json!(null)), None);
    }
}
