//! Most recently published output, as reported by blob-created notifications.

use std::sync::RwLock;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity of a published output spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LatestPublishedFile {
    /// Last path segment of the blob URL.
    pub file_name: String,
    /// Blob URL from the notification.
    pub url: String,
    /// When the notification was received (RFC 3339, UTC).
    pub processed_at: String,
}

impl LatestPublishedFile {
    /// Builds an entry stamped with `at`.
    #[must_use]
    pub fn new(file_name: impl Into<String>, url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
            processed_at: at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Process-wide last-write-wins slot.
#[derive(Debug, Default)]
pub struct LatestPublishedCache {
    slot: RwLock<Option<LatestPublishedFile>>,
}

impl LatestPublishedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current entry.
    pub fn record(&self, file: LatestPublishedFile) {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(file);
    }

    /// Returns the current entry, if any.
    #[must_use]
    pub fn current(&self) -> Option<LatestPublishedFile> {
        self.slot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
