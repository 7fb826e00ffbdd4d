//! # tierlift-cli
//!
//! Command-line interface for remediating local spreadsheets.
//!
//! ## Commands
//!
//! - `tierlift remediate` - Demote archived blobs referenced by a workbook and
//!   write an annotated copy
//! - `tierlift scan` - List every blob reference in a workbook
//!
//! ## Configuration
//!
//! `remediate` reads the same storage settings as the server:
//!
//! - `TIERLIFT_BLOB_ENDPOINT` - Endpoint template containing `{account}`
//! - `TIERLIFT_STORAGE_AUTH_MODE` - `none`, `static_bearer`, `sas`, or `managed_identity`
//! - `TIERLIFT_STORAGE_SAS_TOKEN` / `TIERLIFT_STORAGE_BEARER_TOKEN`
//! - `TIERLIFT_REFERENCE_HEADERS` - Extra accepted reference column headers

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use clap::{Parser, Subcommand};

/// tierlift CLI - archive-tier remediation for spreadsheets of blob links.
#[derive(Debug, Parser)]
#[command(name = "tierlift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Demote archived blobs and write an annotated workbook.
    Remediate(commands::remediate::RemediateArgs),
    /// List blob references without touching storage.
    Scan(commands::scan::ScanArgs),
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}
