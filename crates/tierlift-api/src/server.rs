//! API server implementation.
//!
//! Wires configuration, the blob store, and the remediation pipeline into one
//! axum router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use tierlift_core::storage::{BlobStore, MemoryBlobStore};
use tierlift_core::Result;
use tierlift_remediation::{ColumnLocator, RemediationPipeline};

use crate::config::Config;
use crate::latest::LatestPublishedCache;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Shared application state for all request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    store: Arc<dyn BlobStore>,
    pipeline: RemediationPipeline,
    latest: LatestPublishedCache,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &"<BlobStore>")
            .field("pipeline", &self.pipeline)
            .field("latest", &self.latest)
            .finish()
    }
}

impl AppState {
    /// Creates application state over the given blob store.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn BlobStore>) -> Self {
        let pipeline = RemediationPipeline::new(Arc::clone(&store))
            .with_locator(ColumnLocator::with_extra_headers(&config.reference_headers))
            .with_sheet_name(config.sheet_name.clone())
            .with_destination(config.output_destination());
        Self {
            config,
            store,
            pipeline,
            latest: LatestPublishedCache::new(),
        }
    }

    /// Returns the blob store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.store)
    }

    /// Returns the remediation pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &RemediationPipeline {
        &self.pipeline
    }

    /// Returns the latest-published slot.
    #[must_use]
    pub fn latest(&self) -> &LatestPublishedCache {
        &self.latest
    }
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn openapi_document() -> impl IntoResponse {
    Json(crate::openapi::openapi())
}

/// The tierlift API server.
pub struct Server {
    config: Config,
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("store", &"<BlobStore>")
            .finish()
    }
}

impl Server {
    /// Creates a server over an explicit blob store.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn BlobStore>) -> Self {
        Self { config, store }
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(self.config.clone(), Arc::clone(&self.store)));
        let metrics_layer = middleware::from_fn(crate::metrics::metrics_middleware);

        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(crate::metrics::serve_metrics))
            .route("/openapi.json", get(openapi_document))
            .merge(crate::routes::routes())
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(metrics_layer)
            .with_state(state)
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the port.
    pub async fn serve(&self) -> Result<()> {
        crate::metrics::init_metrics();
        tierlift_remediation::metrics::register_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(
            http_port = self.config.http_port,
            output = ?self.config.output_destination().map(|d| d.to_string()),
            "Starting tierlift API server"
        );

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| tierlift_core::Error::Internal {
                    message: format!("failed to bind to {addr}: {e}"),
                })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| tierlift_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates the router without binding to a port.
    #[doc(hidden)]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("store", &"<BlobStore>")
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            store: Arc::new(MemoryBlobStore::new()),
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder with an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Sets where uploads are stored.
    #[must_use]
    pub fn input(mut self, account: impl Into<String>, container: impl Into<String>) -> Self {
        self.config.input.account = Some(account.into());
        self.config.input.container = Some(container.into());
        self
    }

    /// Sets where annotated spreadsheets are published.
    #[must_use]
    pub fn output(mut self, account: impl Into<String>, container: impl Into<String>) -> Self {
        self.config.output.account = Some(account.into());
        self.config.output.container = Some(container.into());
        self
    }

    /// Sets the blob store used by request handlers.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = store;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config,
            store: self.store,
        }
    }
}
