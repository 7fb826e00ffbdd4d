//! Republishes annotated spreadsheets to the output location.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tierlift_core::redaction::RedactedUrl;
use tierlift_core::storage::{BlobStore, ContainerStatus};
use tierlift_core::ObjectReference;

use crate::error::{RemediationError, Result};
use crate::metrics;
use crate::workbook::XLSX_CONTENT_TYPE;

/// Suffix appended to the source file stem to name the output.
pub const OUTPUT_SUFFIX: &str = "_processed.xlsx";

/// Output file name for a source file name: extension stripped, suffix appended.
#[must_use]
pub fn output_name(source_file_name: &str) -> String {
    let stem = match source_file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => source_file_name,
    };
    format!("{stem}{OUTPUT_SUFFIX}")
}

/// Account and container that receive annotated spreadsheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDestination {
    /// Storage account name.
    pub account: String,
    /// Container name.
    pub container: String,
}

impl OutputDestination {
    /// Creates a destination.
    #[must_use]
    pub fn new(account: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for OutputDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.container)
    }
}

/// Uploads annotated spreadsheets, creating the container on first use.
#[derive(Clone)]
pub struct OutputPublisher {
    store: Arc<dyn BlobStore>,
    destination: OutputDestination,
}

impl fmt::Debug for OutputPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPublisher")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl OutputPublisher {
    /// Creates a publisher for one destination.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, destination: OutputDestination) -> Self {
        Self { store, destination }
    }

    /// Where the output of `source` will be written.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Configuration` if the destination names are
    /// not valid storage names.
    pub fn target_for(&self, source: &ObjectReference) -> Result<ObjectReference> {
        ObjectReference::new(
            self.destination.account.clone(),
            self.destination.container.clone(),
            output_name(source.file_name()),
        )
        .map_err(|e| RemediationError::configuration(format!("invalid output destination: {e}")))
    }

    /// Ensures the container exists and uploads `data` as the output of `source`.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Upload` if the container cannot be created or
    /// the upload fails. Nothing is retried.
    pub async fn publish(&self, source: &ObjectReference, data: Vec<u8>) -> Result<ObjectReference> {
        let target = self.target_for(source)?;
        let result = self.upload(&target, Bytes::from(data)).await;
        metrics::record_publish(if result.is_ok() { "success" } else { "error" });
        result.map(|()| target)
    }

    async fn upload(&self, target: &ObjectReference, data: Bytes) -> Result<()> {
        let status = self
            .store
            .create_container(&self.destination.account, &self.destination.container)
            .await
            .map_err(|source| RemediationError::Upload { source })?;
        if status == ContainerStatus::Created {
            tracing::info!(destination = %self.destination, "created output container");
        }

        let size = data.len();
        self.store
            .upload(target, data, XLSX_CONTENT_TYPE)
            .await
            .map_err(|source| RemediationError::Upload { source })?;

        let url = target.to_string();
        tracing::info!(output = %RedactedUrl(&url), size, "published annotated spreadsheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierlift_core::MemoryBlobStore;

    #[test]
    fn output_name_strips_extension() {
        assert_eq!(output_name("report.xlsx"), "report_processed.xlsx");
        assert_eq!(output_name("my file.v2.xlsx"), "my file.v2_processed.xlsx");
        assert_eq!(output_name("noext"), "noext_processed.xlsx");
        assert_eq!(output_name(".hidden"), ".hidden_processed.xlsx");
    }

    #[tokio::test]
    async fn publish_creates_container_and_uploads() {
        let store = Arc::new(MemoryBlobStore::new());
        let publisher = OutputPublisher::new(store.clone(), OutputDestination::new("out", "processed"));
        let source = ObjectReference::new("in", "uploads", "folder/report.xlsx").expect("reference");

        let target = publisher.publish(&source, vec![1, 2, 3]).await.expect("publish");

        assert_eq!(target.account(), "out");
        assert_eq!(target.container(), "processed");
        assert_eq!(target.path(), "report_processed.xlsx");
        assert!(store.has_container("out", "processed"));
        assert_eq!(store.content_type(&target).as_deref(), Some(XLSX_CONTENT_TYPE));

        // Second publish hits an existing container.
        publisher.publish(&source, vec![4]).await.expect("publish again");
    }

    #[test]
    fn invalid_destination_is_configuration_error() {
        let publisher = OutputPublisher::new(
            Arc::new(MemoryBlobStore::new()),
            OutputDestination::new("bad.account", "processed"),
        );
        let source = ObjectReference::new("in", "uploads", "a.xlsx").expect("reference");
        assert!(matches!(
            publisher.target_for(&source),
            Err(RemediationError::Configuration { .. })
        ));
    }
}
