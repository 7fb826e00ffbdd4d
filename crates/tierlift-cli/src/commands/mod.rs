//! CLI command implementations.

pub mod remediate;
pub mod scan;

use std::path::Path;

use anyhow::{Context, Result};
use tierlift_remediation::{Workbook, XlsxCodec};

/// Reads and decodes a local workbook.
pub(crate) async fn read_workbook(path: &Path) -> Result<Workbook> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    XlsxCodec::decode(&bytes).with_context(|| format!("{} is not a readable workbook", path.display()))
}
