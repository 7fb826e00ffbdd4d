//! # tierlift-api
//!
//! HTTP composition layer for tierlift.
//!
//! This crate is a thin layer with no remediation policy of its own. All
//! locating, tier changes, and annotation live in `tierlift-remediation`.
//!
//! ## Endpoints
//!
//! ```text
//!   GET  /health                      - Health check
//!   GET  /metrics                     - Prometheus metrics
//!   GET  /openapi.json                - OpenAPI document
//!   POST /process                     - Remediation webhook (Event Grid)
//!   POST /api/processed-notification  - Output notifications (Event Grid)
//!   GET  /api/latest-processed        - Most recent published output
//!   POST /upload                      - Spreadsheet upload
//!   GET  /api/download/*name          - Processed file download
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tierlift_api::server::Server;
//!
//! let server = Server::builder()
//!     .http_port(8080)
//!     .output("outacct", "processed-files")
//!     .build();
//!
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod event_grid;
pub mod latest;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::Server;
}
