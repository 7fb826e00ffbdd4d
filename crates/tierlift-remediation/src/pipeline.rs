//! One remediation pass over a source spreadsheet.
//!
//! ```text
//! source URL ──► download ──► decode ──► locate column ──► remediate rows ──► annotate
//!                                                                               │
//!                                          output blob ◄── upload ◄── encode ◄──┘
//! ```
//!
//! Rows are processed strictly in order, one store call at a time. A failure
//! on one row is recorded in its status cell; a failure in any other step
//! ends the pass.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tierlift_core::observability::remediation_span;
use tierlift_core::redaction::RedactedUrl;
use tierlift_core::storage::BlobStore;
use tierlift_core::ObjectReference;
use tracing::Instrument;

use crate::annotate::annotate;
use crate::error::{RemediationError, Result};
use crate::locator::{ColumnLocator, ColumnMatch};
use crate::publish::{OutputDestination, OutputPublisher};
use crate::table::SpreadsheetTable;
use crate::tier::{RemediationStats, TierRemediator};
use crate::workbook::{Workbook, XlsxCodec};

/// Result of remediating one table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TableReport {
    /// The located reference column, if any.
    pub column: Option<ColumnMatch>,
    /// Counters for the pass.
    pub stats: RemediationStats,
}

/// Result of one full pass from source URL to published output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Source spreadsheet.
    pub source: ObjectReference,
    /// Published output.
    pub output: ObjectReference,
    /// Reference column index, if one was found.
    pub column: Option<usize>,
    /// Counters for the pass.
    pub stats: RemediationStats,
}

/// Locates, remediates, annotates, and republishes spreadsheets.
pub struct RemediationPipeline {
    store: Arc<dyn BlobStore>,
    locator: ColumnLocator,
    remediator: TierRemediator,
    sheet_name: Option<String>,
    destination: Option<OutputDestination>,
}

impl fmt::Debug for RemediationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemediationPipeline")
            .field("locator", &self.locator)
            .field("sheet_name", &self.sheet_name)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl RemediationPipeline {
    /// Creates a pipeline with the default locator, first-sheet selection,
    /// and no output destination.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            remediator: TierRemediator::new(Arc::clone(&store)),
            store,
            locator: ColumnLocator::default(),
            sheet_name: None,
            destination: None,
        }
    }

    /// Replaces the column locator.
    #[must_use]
    pub fn with_locator(mut self, locator: ColumnLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Selects the worksheet to remediate by name (`None` = first sheet).
    #[must_use]
    pub fn with_sheet_name(mut self, sheet_name: Option<String>) -> Self {
        self.sheet_name = sheet_name;
        self
    }

    /// Sets where annotated spreadsheets are published.
    #[must_use]
    pub fn with_destination(mut self, destination: Option<OutputDestination>) -> Self {
        self.destination = destination;
        self
    }

    /// Runs one full pass for the spreadsheet at `url`.
    ///
    /// When no reference column is found the workbook is republished
    /// unmodified.
    ///
    /// # Errors
    ///
    /// - `Configuration` if no output destination is set (checked first)
    /// - `InvalidSource` if `url` is not a blob URL
    /// - `Access` if the source cannot be downloaded
    /// - `Parse` if the source is not a readable workbook
    /// - `Encode` / `Upload` if republishing fails
    pub async fn process_url(&self, url: &str) -> Result<PipelineReport> {
        let destination = self.destination.clone().ok_or_else(|| {
            RemediationError::configuration("output storage account and container are not set")
        })?;
        let source = ObjectReference::from_url(url).map_err(|e| RemediationError::InvalidSource {
            message: e.to_string(),
        })?;

        let span = remediation_span(&RedactedUrl(url).to_string());
        self.process_source(source, destination).instrument(span).await
    }

    async fn process_source(
        &self,
        source: ObjectReference,
        destination: OutputDestination,
    ) -> Result<PipelineReport> {
        let data = self
            .store
            .download(&source)
            .await
            .map_err(|source| RemediationError::Access { source })?;

        let mut workbook = XlsxCodec::decode(&data)?;
        let report = self.remediate_workbook(&mut workbook).await?;
        let encoded = XlsxCodec::encode(&workbook)?;

        let publisher = OutputPublisher::new(Arc::clone(&self.store), destination);
        let output = publisher.publish(&source, encoded).await?;

        tracing::info!(
            processed = report.stats.processed,
            changed = report.stats.changed,
            skipped = report.stats.skipped,
            errors = report.stats.errors,
            "remediation complete"
        );

        Ok(PipelineReport {
            source,
            output,
            column: report.column.map(|found| found.index),
            stats: report.stats,
        })
    }

    /// Remediates the selected worksheet of a decoded workbook in place.
    ///
    /// # Errors
    ///
    /// Returns `RemediationError::Parse` if the configured sheet is missing.
    pub async fn remediate_workbook(&self, workbook: &mut Workbook) -> Result<TableReport> {
        let sheet = workbook.select_sheet_mut(self.sheet_name.as_deref())?;
        tracing::debug!(sheet = sheet.name(), "selected worksheet");
        Ok(self.remediate_table(sheet.table_mut()).await)
    }

    /// Remediates every data row of `table` and appends the status column.
    ///
    /// The table is left untouched when no reference column is found.
    pub async fn remediate_table(&self, table: &mut SpreadsheetTable) -> TableReport {
        let Some(column) = self.locator.locate(table) else {
            tracing::warn!("no blob reference column found; leaving table unmodified");
            return TableReport::default();
        };

        let mut stats = RemediationStats::default();
        let mut outcomes = Vec::new();
        for (row, cells) in table.data_rows() {
            let Some(reference) = cells
                .get(column.index)
                .and_then(|text| ObjectReference::parse(text))
            else {
                continue;
            };

            let outcome = self.remediator.remediate(&reference).await;
            stats.record(&outcome);
            outcomes.push((row, outcome));
        }

        annotate(table, &outcomes);
        TableReport {
            column: Some(column),
            stats,
        }
    }
}
