//! # tierlift-remediation
//!
//! Remediation of archived blobs referenced from spreadsheets.
//!
//! This crate implements the decision logic of tierlift:
//!
//! - **Column Location**: Header vocabulary first, then reference frequency in the first rows
//! - **Tier Remediation**: Archive blobs are moved to Cool, once, with no retries
//! - **Annotation**: A trailing `Status` column records each row's outcome
//! - **Publishing**: The annotated workbook is uploaded as `<stem>_processed.xlsx`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tierlift_remediation::{OutputDestination, RemediationPipeline};
//!
//! let pipeline = RemediationPipeline::new(Arc::new(store))
//!     .with_destination(Some(OutputDestination::new("outacct", "processed-files")));
//!
//! let report = pipeline
//!     .process_url("https://inacct.blob.core.windows.net/uploads/inventory.xlsx")
//!     .await?;
//! println!("{}", report.stats);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod annotate;
pub mod error;
pub mod locator;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod table;
pub mod tier;
pub mod workbook;

pub use error::{RemediationError, Result};
pub use locator::{ColumnLocator, ColumnMatch, ColumnMatcher};
pub use pipeline::{PipelineReport, RemediationPipeline, TableReport};
pub use publish::{OutputDestination, OutputPublisher, OUTPUT_SUFFIX};
pub use table::{find_references, FoundReference, SpreadsheetTable};
pub use tier::{FailureReason, RemediationOutcome, RemediationStats, SkipReason, TierRemediator};
pub use workbook::{Workbook, Worksheet, XlsxCodec, XLSX_CONTENT_TYPE};
