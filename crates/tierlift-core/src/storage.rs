//! Object-store capability used by the remediation pipeline.
//!
//! This module defines the contract every blob backend implements:
//! - Metadata lookup including the current access tier
//! - Whole-object download and upload with an explicit content type
//! - Tier changes
//! - Idempotent container creation
//!
//! Objects are addressed by [`ObjectReference`]. Backends encode the path at
//! the point they build a request; callers always pass the literal path.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::blob_ref::ObjectReference;
use crate::error::{Error, Result};

/// Storage tier of a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessTier {
    /// Frequently accessed data.
    Hot,
    /// Infrequently accessed data, directly readable.
    Cool,
    /// Rarely accessed data, directly readable.
    Cold,
    /// Offline tier; must be moved to an online tier before reading.
    Archive,
    /// Any tier name this crate does not model (e.g. premium page blob tiers).
    Other(String),
}

impl AccessTier {
    /// Parses a tier name as reported by the store, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "hot" => Self::Hot,
            "cool" => Self::Cool,
            "cold" => Self::Cold,
            "archive" => Self::Archive,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hot => "Hot",
            Self::Cool => "Cool",
            Self::Cold => "Cold",
            Self::Archive => "Archive",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    /// Object size in bytes.
    pub size: u64,
    /// Content type recorded at upload.
    pub content_type: Option<String>,
    /// Current access tier, if the store reports one.
    pub access_tier: Option<AccessTier>,
    /// Rehydration state of an archived blob (e.g. `rehydrate-pending-to-cool`).
    pub archive_status: Option<String>,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Result of a create-if-absent container call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The container was created by this call.
    Created,
    /// The container already existed (possibly created concurrently).
    AlreadyExists,
}

/// Blob store capability.
///
/// All backends (Azure REST, memory) implement this trait.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Reads blob metadata without the content.
    ///
    /// Returns `Error::NotFound` if the blob doesn't exist.
    async fn properties(&self, blob: &ObjectReference) -> Result<BlobProperties>;

    /// Reads the entire blob.
    ///
    /// Returns `Error::NotFound` if the blob doesn't exist.
    async fn download(&self, blob: &ObjectReference) -> Result<Bytes>;

    /// Writes the blob unconditionally, replacing any existing content.
    async fn upload(&self, blob: &ObjectReference, data: Bytes, content_type: &str) -> Result<()>;

    /// Moves the blob to another access tier.
    async fn set_tier(&self, blob: &ObjectReference, tier: AccessTier) -> Result<()>;

    /// Creates the container if it is absent.
    ///
    /// An existing container is reported as `ContainerStatus::AlreadyExists`,
    /// never as an error.
    async fn create_container(&self, account: &str, container: &str) -> Result<ContainerStatus>;
}

/// In-memory blob store for tests and debug runs.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: HashSet<(String, String)>,
    blobs: HashMap<ObjectReference, StoredBlob>,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: String,
    access_tier: Option<AccessTier>,
    last_modified: DateTime<Utc>,
}

fn container_key(account: &str, container: &str) -> (String, String) {
    (account.to_string(), container.to_string())
}

impl MemoryBlobStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a blob with an explicit tier, creating its container if needed.
    pub fn insert_blob(
        &self,
        blob: &ObjectReference,
        data: impl Into<Bytes>,
        access_tier: Option<AccessTier>,
    ) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .containers
            .insert(container_key(blob.account(), blob.container()));
        state.blobs.insert(
            blob.clone(),
            StoredBlob {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
                access_tier,
                last_modified: Utc::now(),
            },
        );
    }

    /// Returns the stored tier of a blob, if the blob exists.
    #[must_use]
    pub fn access_tier(&self, blob: &ObjectReference) -> Option<Option<AccessTier>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.blobs.get(blob).map(|stored| stored.access_tier.clone())
    }

    /// Returns the stored content of a blob.
    #[must_use]
    pub fn blob(&self, blob: &ObjectReference) -> Option<Bytes> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.blobs.get(blob).map(|stored| stored.data.clone())
    }

    /// Returns the stored content type of a blob.
    #[must_use]
    pub fn content_type(&self, blob: &ObjectReference) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.blobs.get(blob).map(|stored| stored.content_type.clone())
    }

    /// Returns true if the container exists.
    #[must_use]
    pub fn has_container(&self, account: &str, container: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.containers.contains(&container_key(account, container))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn properties(&self, blob: &ObjectReference) -> Result<BlobProperties> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let stored = state
            .blobs
            .get(blob)
            .ok_or_else(|| Error::NotFound(format!("blob not found: {blob}")))?;

        Ok(BlobProperties {
            size: stored.data.len() as u64,
            content_type: Some(stored.content_type.clone()),
            access_tier: stored.access_tier.clone(),
            archive_status: None,
            last_modified: Some(stored.last_modified),
        })
    }

    async fn download(&self, blob: &ObjectReference) -> Result<Bytes> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .blobs
            .get(blob)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| Error::NotFound(format!("blob not found: {blob}")))
    }

    async fn upload(&self, blob: &ObjectReference, data: Bytes, content_type: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state
            .containers
            .contains(&container_key(blob.account(), blob.container()))
        {
            return Err(Error::NotFound(format!(
                "container not found: {}/{}",
                blob.account(),
                blob.container()
            )));
        }

        // New blobs land in the account default tier.
        state.blobs.insert(
            blob.clone(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
                access_tier: Some(AccessTier::Hot),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn set_tier(&self, blob: &ObjectReference, tier: AccessTier) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let stored = state
            .blobs
            .get_mut(blob)
            .ok_or_else(|| Error::NotFound(format!("blob not found: {blob}")))?;
        stored.access_tier = Some(tier);
        Ok(())
    }

    async fn create_container(&self, account: &str, container: &str) -> Result<ContainerStatus> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.containers.insert(container_key(account, container)) {
            Ok(ContainerStatus::Created)
        } else {
            Ok(ContainerStatus::AlreadyExists)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(path: &str) -> ObjectReference {
        ObjectReference::new("acct", "cont", path).expect("reference")
    }

    #[test]
    fn access_tier_parses_case_insensitively() {
        assert_eq!(AccessTier::parse("archive"), AccessTier::Archive);
        assert_eq!(AccessTier::parse(" Cool "), AccessTier::Cool);
        assert_eq!(AccessTier::parse("HOT"), AccessTier::Hot);
        assert_eq!(AccessTier::parse("P10"), AccessTier::Other("P10".to_string()));
        assert_eq!(AccessTier::Archive.to_string(), "Archive");
    }

    #[tokio::test]
    async fn test_memory_store_reports_seeded_tier() {
        let store = MemoryBlobStore::new();
        let blob = reference("a.txt");
        store.insert_blob(&blob, "data", Some(AccessTier::Archive));

        let props = store.properties(&blob).await.expect("properties");
        assert_eq!(props.size, 4);
        assert_eq!(props.access_tier, Some(AccessTier::Archive));
    }

    #[tokio::test]
    async fn test_memory_store_missing_blob_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = store.properties(&reference("missing")).await.unwrap_err();
        assert!(err.is_not_found());
        let err = store
            .set_tier(&reference("missing"), AccessTier::Cool)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_tier_updates_blob() {
        let store = MemoryBlobStore::new();
        let blob = reference("a.txt");
        store.insert_blob(&blob, "data", Some(AccessTier::Archive));

        store.set_tier(&blob, AccessTier::Cool).await.expect("set tier");
        assert_eq!(store.access_tier(&blob), Some(Some(AccessTier::Cool)));
    }

    #[tokio::test]
    async fn test_create_container_is_idempotent() {
        let store = MemoryBlobStore::new();
        assert_eq!(
            store.create_container("acct", "out").await.expect("create"),
            ContainerStatus::Created
        );
        assert_eq!(
            store.create_container("acct", "out").await.expect("create"),
            ContainerStatus::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_upload_requires_container() {
        let store = MemoryBlobStore::new();
        let blob = ObjectReference::new("acct", "out", "a.xlsx").expect("reference");

        let err = store
            .upload(&blob, Bytes::from("x"), "text/plain")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        store.create_container("acct", "out").await.expect("create");
        store
            .upload(&blob, Bytes::from("x"), "text/plain")
            .await
            .expect("upload");
        assert_eq!(store.download(&blob).await.expect("download"), Bytes::from("x"));
        assert_eq!(store.content_type(&blob).as_deref(), Some("text/plain"));
    }
}
