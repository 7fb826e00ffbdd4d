//! Remediate command - demote archived blobs listed in a local workbook.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;

use tierlift_api::config::{Config, StorageBackendKind};
use tierlift_core::azure::AzureBlobStore;
use tierlift_core::storage::BlobStore;
use tierlift_remediation::publish::output_name;
use tierlift_remediation::{ColumnLocator, RemediationPipeline, RemediationStats, XlsxCodec};

use crate::OutputFormat;

/// Arguments for the remediate command.
#[derive(Debug, Args)]
pub struct RemediateArgs {
    /// Workbook to remediate.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Where to write the annotated workbook (default: `<stem>_processed.xlsx`
    /// beside the input).
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Worksheet to remediate (default: `TIERLIFT_SHEET_NAME`, else the first sheet).
    #[arg(long)]
    pub sheet: Option<String>,
}

/// Summary of one local remediation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationSummary {
    /// Input workbook.
    pub input: String,
    /// Annotated workbook written.
    pub output: String,
    /// Reference column index, if one was found.
    pub column: Option<usize>,
    /// Counters for the run.
    pub stats: RemediationStats,
}

/// Execute the remediate command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the workbook cannot be read
/// or written, or the selected sheet does not exist. Per-reference storage
/// failures are reported in the workbook, not as errors.
pub async fn execute(args: RemediateArgs, format: OutputFormat) -> Result<()> {
    let config = Config::from_env()?;
    let store = build_store(&config)?;
    let locator = ColumnLocator::with_extra_headers(&config.reference_headers);
    let sheet = args.sheet.clone().or(config.sheet_name);

    let summary = remediate_file(store, locator, &args.input, args.output.as_deref(), sheet).await?;
    print_summary(&summary, format)
}

fn build_store(config: &Config) -> Result<Arc<dyn BlobStore>> {
    if config.storage.backend == StorageBackendKind::Memory {
        anyhow::bail!("the in-memory backend holds no blobs; use TIERLIFT_STORAGE_BACKEND=azure");
    }
    let credential = config.storage.auth.credential()?;
    Ok(Arc::new(AzureBlobStore::new(&config.storage.blob_endpoint, credential)?))
}

/// Remediates `input` against `store` and writes the annotated workbook.
///
/// # Errors
///
/// Returns an error if the workbook cannot be read, decoded, encoded, or
/// written, or `sheet` does not exist.
pub async fn remediate_file(
    store: Arc<dyn BlobStore>,
    locator: ColumnLocator,
    input: &Path,
    output: Option<&Path>,
    sheet: Option<String>,
) -> Result<RemediationSummary> {
    let mut workbook = super::read_workbook(input).await?;
    let pipeline = RemediationPipeline::new(store)
        .with_locator(locator)
        .with_sheet_name(sheet);

    let report = pipeline.remediate_workbook(&mut workbook).await?;
    if report.column.is_none() {
        tracing::warn!(input = %input.display(), "no reference column found; writing workbook unmodified");
    }

    let encoded = XlsxCodec::encode(&workbook)?;
    let output = output.map_or_else(|| default_output_path(input), Path::to_path_buf);
    tokio::fs::write(&output, encoded)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(RemediationSummary {
        input: input.display().to_string(),
        output: output.display().to_string(),
        column: report.column.map(|found| found.index),
        stats: report.stats,
    })
}

/// `<stem>_processed.xlsx` beside `input`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    input.with_file_name(output_name(&file_name))
}

fn print_summary(summary: &RemediationSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text | OutputFormat::Table => {
            let stats = &summary.stats;
            match summary.column {
                Some(column) => println!("Reference column: {column}"),
                None => println!("{}", "No reference column found".yellow()),
            }
            println!("Processed: {}", stats.processed);
            println!("Changed:   {}", stats.changed.to_string().green());
            println!("Skipped:   {}", stats.skipped.to_string().yellow());
            println!("Errors:    {}", stats.errors.to_string().red());
            println!();
            println!("Wrote {}", summary.output);
        }
    }
    Ok(())
}
