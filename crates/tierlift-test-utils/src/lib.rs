//! Shared test utilities for tierlift tests.
//!
//! This crate provides:
//! - [`TracingBlobStore`]: In-memory blob store with operation recording and failure injection
//! - Fixtures for workbooks and webhook bodies
//!
//! # Example
//!
//! ```rust,ignore
//! use tierlift_test_utils::{TracingBlobStore, StoreOp};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let store = TracingBlobStore::new();
//!     store.insert_blob("https://acct.blob.core.windows.net/cont/a.txt", "x", Some(AccessTier::Archive));
//!     // ... run test ...
//!     assert_eq!(store.set_tier_calls(), 1);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tierlift=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
