//! tierlift CLI - remediate and scan local spreadsheets.
//!
//! The main entry point for the `tierlift` CLI binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tierlift_cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Remediate(args) => {
                tierlift_cli::commands::remediate::execute(args, cli.format).await
            }
            Commands::Scan(args) => tierlift_cli::commands::scan::execute(&args, cli.format).await,
        }
    })
}
