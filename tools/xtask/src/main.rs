//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::Command;

const OPENAPI_PATH: &str = "crates/tierlift-api/openapi.json";

const LIB_HEADERS: &[&str] = &["#![forbid(unsafe_code)]", "#![deny(missing_docs)]"];

#[derive(Parser)]
#[command(name = "xtask", about = "tierlift workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks locally
    Ci,
    /// Validate workspace conventions
    Lint,
    /// Generate coverage report
    Coverage,
    /// Write the API's OpenAPI document, or verify it is current
    Openapi {
        /// Fail instead of writing when the checked-in document differs
        #[arg(long)]
        check: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
        Commands::Coverage => run_coverage(),
        Commands::Openapi { check } => run_openapi(check),
    }
}

fn run_ci() -> Result<()> {
    println!("Running CI checks...\n");

    run_cmd("cargo", &["fmt", "--check"])?;
    run_cmd("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    run_cmd("cargo", &["test", "--workspace"])?;
    run_cmd("cargo", &["doc", "--workspace", "--no-deps"])?;
    run_lint()?;
    run_openapi(true)?;

    println!("\nAll CI checks passed!");
    Ok(())
}

fn run_lint() -> Result<()> {
    println!("Validating workspace conventions...\n");

    for entry in std::fs::read_dir("crates")? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("tierlift-") {
            anyhow::bail!("Crate '{name}' does not follow tierlift-* naming");
        }

        let lib = entry.path().join("src/lib.rs");
        if !lib.exists() {
            continue;
        }
        let source = std::fs::read_to_string(&lib)
            .with_context(|| format!("Failed to read {}", lib.display()))?;
        for header in LIB_HEADERS {
            if !source.contains(header) {
                anyhow::bail!("{} is missing `{header}`", lib.display());
            }
        }
    }

    println!("All conventions validated!");
    Ok(())
}

fn run_coverage() -> Result<()> {
    run_cmd("cargo", &["llvm-cov", "--workspace", "--html"])?;
    println!("\nCoverage report: target/llvm-cov/html/index.html");
    Ok(())
}

fn run_openapi(check: bool) -> Result<()> {
    let generated = tierlift_api::openapi::openapi_json().context("Failed to render OpenAPI")?;
    let path = Path::new(OPENAPI_PATH);

    if check {
        let current = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {OPENAPI_PATH}; run `cargo xtask openapi`"))?;
        if current.trim_end() != generated.trim_end() {
            anyhow::bail!("{OPENAPI_PATH} is stale; run `cargo xtask openapi`");
        }
        println!("{OPENAPI_PATH} is up to date");
    } else {
        std::fs::write(path, format!("{generated}\n"))
            .with_context(|| format!("Failed to write {OPENAPI_PATH}"))?;
        println!("Wrote {OPENAPI_PATH}");
    }
    Ok(())
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<()> {
    println!("$ {} {}", cmd, args.join(" "));
    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run: {} {}", cmd, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", cmd, args.join(" "));
    }
    Ok(())
}
