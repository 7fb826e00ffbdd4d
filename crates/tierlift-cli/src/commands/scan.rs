//! Scan command - list blob references in a workbook.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use tierlift_remediation::{find_references, Workbook};

use crate::OutputFormat;

/// Arguments for the scan command.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Workbook to scan.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Only scan this worksheet (default: every sheet).
    #[arg(long)]
    pub sheet: Option<String>,
}

/// One reference found in a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedReference {
    /// Worksheet name.
    pub sheet: String,
    /// Zero-based row index.
    pub row: usize,
    /// Zero-based column index.
    pub column: usize,
    /// Storage account.
    pub account: String,
    /// Container.
    pub container: String,
    /// Blob path.
    pub path: String,
    /// Canonical blob URL.
    pub url: String,
}

/// Execute the scan command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded, or the requested
/// sheet does not exist.
pub async fn execute(args: &ScanArgs, format: OutputFormat) -> Result<()> {
    let workbook = super::read_workbook(&args.input).await?;
    let references = scan_workbook(&workbook, args.sheet.as_deref())?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&references)?);
        }
        OutputFormat::Text => {
            if references.is_empty() {
                println!("No blob references found");
                return Ok(());
            }
            for found in &references {
                println!(
                    "{}!{}{}  {}",
                    found.sheet,
                    column_letters(found.column),
                    found.row + 1,
                    found.url
                );
            }
            println!();
            println!("{} reference(s)", references.len());
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct ReferenceRow {
                #[tabled(rename = "Cell")]
                cell: String,
                #[tabled(rename = "Account")]
                account: String,
                #[tabled(rename = "Container")]
                container: String,
                #[tabled(rename = "Path")]
                path: String,
            }

            let rows: Vec<_> = references
                .iter()
                .map(|found| ReferenceRow {
                    cell: format!(
                        "{}!{}{}",
                        found.sheet,
                        column_letters(found.column),
                        found.row + 1
                    ),
                    account: found.account.clone(),
                    container: found.container.clone(),
                    path: found.path.clone(),
                })
                .collect();

            if rows.is_empty() {
                println!("No blob references found");
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(())
}

/// Collects every reference in the selected sheets, in sheet then row-major order.
///
/// # Errors
///
/// Returns an error if `sheet` names a worksheet the workbook does not have.
pub fn scan_workbook(workbook: &Workbook, sheet: Option<&str>) -> Result<Vec<ScannedReference>> {
    if let Some(name) = sheet {
        if !workbook.sheets().iter().any(|s| s.name() == name) {
            anyhow::bail!("worksheet {name:?} not found");
        }
    }

    Ok(workbook
        .sheets()
        .iter()
        .filter(|s| sheet.map_or(true, |name| s.name() == name))
        .flat_map(|s| {
            find_references(s.table())
                .into_iter()
                .map(move |found| ScannedReference {
                    sheet: s.name().to_string(),
                    row: found.row,
                    column: found.column,
                    account: found.reference.account().to_string(),
                    container: found.reference.container().to_string(),
                    path: found.reference.path().to_string(),
                    url: found.reference.to_string(),
                })
        })
        .collect())
}

/// Spreadsheet column letters for a zero-based index (`0` → `A`, `26` → `AA`).
fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + u8::try_from(rem).unwrap_or(0));
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
