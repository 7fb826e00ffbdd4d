//! Test blob store with operation tracing.
//!
//! Wraps [`MemoryBlobStore`] and records every call, so tests can assert how
//! many tier changes were issued or that no store call happened at all.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tierlift_core::blob_ref::{ObjectReference, BLOB_HOST_SUFFIX};
use tierlift_core::error::{Error, Result};
use tierlift_core::storage::{
    AccessTier, BlobProperties, BlobStore, ContainerStatus, MemoryBlobStore,
};

/// Record of a store operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Metadata lookup.
    Properties {
        /// Blob URL.
        url: String,
    },
    /// Whole-blob read.
    Download {
        /// Blob URL.
        url: String,
    },
    /// Whole-blob write.
    Upload {
        /// Blob URL.
        url: String,
        /// Bytes written.
        size: usize,
        /// Content type sent.
        content_type: String,
    },
    /// Tier change.
    SetTier {
        /// Blob URL.
        url: String,
        /// Requested tier.
        tier: AccessTier,
    },
    /// Create-if-absent container call.
    CreateContainer {
        /// Container URL.
        url: String,
    },
}

/// Operation kinds for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// [`StoreOp::Properties`].
    Properties,
    /// [`StoreOp::Download`].
    Download,
    /// [`StoreOp::Upload`].
    Upload,
    /// [`StoreOp::SetTier`].
    SetTier,
    /// [`StoreOp::CreateContainer`].
    CreateContainer,
}

/// In-memory blob store with operation tracing.
///
/// Operations are recorded before injected failures are applied, so a failed
/// call still counts as issued.
#[derive(Debug, Clone, Default)]
pub struct TracingBlobStore {
    inner: MemoryBlobStore,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    failures: Arc<Mutex<Vec<(OpKind, String)>>>,
}

fn reference(url: &str) -> ObjectReference {
    ObjectReference::parse(url).expect("fixture URL is a blob URL")
}

fn container_url(account: &str, container: &str) -> String {
    format!("https://{account}.{BLOB_HOST_SUFFIX}/{container}")
}

impl TracingBlobStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a blob by URL with an explicit tier.
    pub fn insert_blob(&self, url: &str, data: impl Into<Bytes>, tier: Option<AccessTier>) {
        self.inner.insert_blob(&reference(url), data, tier);
    }

    /// Current tier of a blob by URL (outer `None` if the blob is absent).
    #[must_use]
    pub fn access_tier(&self, url: &str) -> Option<Option<AccessTier>> {
        self.inner.access_tier(&reference(url))
    }

    /// Content of a blob by URL, if present.
    #[must_use]
    pub fn blob(&self, url: &str) -> Option<Bytes> {
        self.inner.blob(&reference(url))
    }

    /// Content type of a blob by URL, if present.
    #[must_use]
    pub fn content_type(&self, url: &str) -> Option<String> {
        self.inner.content_type(&reference(url))
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Number of tier changes issued.
    #[must_use]
    pub fn set_tier_calls(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, StoreOp::SetTier { .. }))
            .count()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Injects a failure for one operation kind on URLs with the given prefix.
    pub fn inject_failure(&self, kind: OpKind, url_prefix: impl Into<String>) {
        self.failures
            .lock()
            .expect("lock")
            .push((kind, url_prefix.into()));
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    fn record(&self, op: StoreOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, kind: OpKind, url: &str) -> Result<()> {
        let failures = self.failures.lock().expect("lock");
        if failures
            .iter()
            .any(|(k, prefix)| *k == kind && url.starts_with(prefix.as_str()))
        {
            return Err(Error::storage(format!("injected {kind:?} failure for {url}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for TracingBlobStore {
    async fn properties(&self, blob: &ObjectReference) -> Result<BlobProperties> {
        let url = blob.to_string();
        self.record(StoreOp::Properties { url: url.clone() });
        self.check_failure(OpKind::Properties, &url)?;
        self.inner.properties(blob).await
    }

    async fn download(&self, blob: &ObjectReference) -> Result<Bytes> {
        let url = blob.to_string();
        self.record(StoreOp::Download { url: url.clone() });
        self.check_failure(OpKind::Download, &url)?;
        self.inner.download(blob).await
    }

    async fn upload(&self, blob: &ObjectReference, data: Bytes, content_type: &str) -> Result<()> {
        let url = blob.to_string();
        self.record(StoreOp::Upload {
            url: url.clone(),
            size: data.len(),
            content_type: content_type.to_string(),
        });
        self.check_failure(OpKind::Upload, &url)?;
        self.inner.upload(blob, data, content_type).await
    }

    async fn set_tier(&self, blob: &ObjectReference, tier: AccessTier) -> Result<()> {
        let url = blob.to_string();
        self.record(StoreOp::SetTier {
            url: url.clone(),
            tier: tier.clone(),
        });
        self.check_failure(OpKind::SetTier, &url)?;
        self.inner.set_tier(blob, tier).await
    }

    async fn create_container(&self, account: &str, container: &str) -> Result<ContainerStatus> {
        let url = container_url(account, container);
        self.record(StoreOp::CreateContainer { url: url.clone() });
        self.check_failure(OpKind::CreateContainer, &url)?;
        self.inner.create_container(account, container).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "https://acct.blob.core.windows.net/cont/a.txt";

    #[tokio::test]
    async fn records_operations_in_order() {
        let store = TracingBlobStore::new();
        store.insert_blob(A, "hello", Some(AccessTier::Archive));
        let blob = reference(A);

        store.properties(&blob).await.expect("properties");
        store.set_tier(&blob, AccessTier::Cool).await.expect("set tier");
        store.create_container("out", "processed").await.expect("create");

        let ops = store.operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], StoreOp::Properties { .. }));
        assert_eq!(
            ops[1],
            StoreOp::SetTier {
                url: A.to_string(),
                tier: AccessTier::Cool,
            }
        );
        assert_eq!(
            ops[2],
            StoreOp::CreateContainer {
                url: "https://out.blob.core.windows.net/processed".to_string(),
            }
        );
        assert_eq!(store.set_tier_calls(), 1);
        assert_eq!(store.access_tier(A), Some(Some(AccessTier::Cool)));
    }

    #[tokio::test]
    async fn injected_failures_match_kind_and_prefix() {
        let store = TracingBlobStore::new();
        store.insert_blob(A, "hello", Some(AccessTier::Archive));
        store.inject_failure(OpKind::SetTier, "https://acct.blob.core.windows.net/cont/");
        let blob = reference(A);

        assert!(store.properties(&blob).await.is_ok());
        assert!(store.set_tier(&blob, AccessTier::Cool).await.is_err());
        assert_eq!(store.set_tier_calls(), 1);
        assert_eq!(store.access_tier(A), Some(Some(AccessTier::Archive)));

        store.clear_failures();
        assert!(store.set_tier(&blob, AccessTier::Cool).await.is_ok());
    }
}
