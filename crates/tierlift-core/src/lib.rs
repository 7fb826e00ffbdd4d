//! # tierlift-core
//!
//! Shared primitives for the tierlift blob remediation service.
//!
//! This crate provides the building blocks used by every other tierlift crate:
//!
//! - **Blob References**: Extraction of `(account, container, path)` from cell text and URLs
//! - **Storage**: The object-store capability trait, an in-memory backend, and a REST backend
//! - **Credentials**: Anonymous, bearer, SAS, and managed identity authentication
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialisation, span helpers, and URL redaction
//!
//! ## Example
//!
//! ```rust
//! use tierlift_core::prelude::*;
//!
//! let reference = ObjectReference::parse(
//!     "https://acct.blob.core.windows.net/cont/folder/report 2024.pdf",
//! )
//! .expect("blob reference");
//! assert_eq!(reference.container(), "cont");
//! assert_eq!(reference.encoded_path(), "folder/report%202024.pdf");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod azure;
pub mod blob_ref;
pub mod credential;
pub mod error;
pub mod observability;
pub mod redaction;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tierlift_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::azure::AzureBlobStore;
    pub use crate::blob_ref::ObjectReference;
    pub use crate::credential::{ManagedIdentity, StorageCredential};
    pub use crate::error::{Error, Result};
    pub use crate::storage::{
        AccessTier, BlobProperties, BlobStore, ContainerStatus, MemoryBlobStore,
    };
}

pub use blob_ref::ObjectReference;
pub use error::{Error, Result};
pub use storage::{AccessTier, BlobStore, MemoryBlobStore};
