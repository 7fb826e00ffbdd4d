//! `tierlift-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use tierlift_api::config::{Config, StorageBackendKind};
use tierlift_api::server::Server;
use tierlift_core::azure::AzureBlobStore;
use tierlift_core::observability::{init_logging, LogFormat};
use tierlift_core::storage::{BlobStore, MemoryBlobStore};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    let store: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackendKind::Azure => {
            let credential = config.storage.auth.credential()?;
            tracing::info!(
                endpoint = %config.storage.blob_endpoint,
                auth = ?config.storage.auth.mode,
                "Using Azure Blob storage backend"
            );
            Arc::new(AzureBlobStore::new(&config.storage.blob_endpoint, credential)?)
        }
        StorageBackendKind::Memory => {
            if !config.debug {
                anyhow::bail!("TIERLIFT_STORAGE_BACKEND=memory requires TIERLIFT_DEBUG=true");
            }
            tracing::warn!("using in-memory storage backend (debug only)");
            Arc::new(MemoryBlobStore::new())
        }
    };

    if config.output_destination().is_none() {
        tracing::warn!(
            "TIERLIFT_OUTPUT_ACCOUNT / TIERLIFT_OUTPUT_CONTAINER not set; /process will fail until configured"
        );
    }

    let server = Server::new(config, store);
    server.serve().await?;
    Ok(())
}
