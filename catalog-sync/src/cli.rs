///
/// This module implements the CLI interface for catalog-sync: command parsing,
/// argument handling, and the async entrypoint shared by `main()` and the tests.
///
/// All pipeline logic (staging, normalization, publishing) lives in the
/// [`catalog-sync-core`] crate. This module only wires config, the git adapter
/// and the stdout progress stream together.
///
/// ## How To Use
/// - Command-line users: `catalog-sync run --config catalog.yaml`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`catalog-sync-core`]: ../../catalog-sync-core/
use crate::load_config::load_config;
use crate::progress::StdoutProgress;
use anyhow::{Context, Result};
use catalog_sync_core::git::GitCli;
use catalog_sync_core::pipeline::{discover_skus, run_pipeline};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for catalog-sync: normalize uploaded product photos and publish them per SKU.
#[derive(Parser)]
#[clap(
    name = "catalog-sync",
    version,
    about = "Stage, normalize and publish product photos to a git image store, one SKU at a time"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process the inbox and publish the touched SKUs
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Print the run report as JSON after the progress stream
        #[clap(long)]
        json: bool,
    },
    /// List the SKUs the current inbox would touch, without changing anything
    Skus {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run { config, json } => {
            let config = load_config(&config)?;
            tracing::info!(command = "run", "Starting catalog sync");
            let store = GitCli::new(&config.paths.repo_dir, &config.remote);
            match run_pipeline(&config, &store, &StdoutProgress).await {
                Ok(report) => {
                    tracing::info!(
                        command = "run",
                        processed = report.processed(),
                        head = %report.publish.head_commit,
                        "Catalog sync complete"
                    );
                    if json {
                        let rendered = serde_json::to_string_pretty(&report)
                            .context("Failed to serialize run report")?;
                        println!("{rendered}");
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "run", error = %e, "Catalog sync failed");
                    eprintln!("ERROR: {e}");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Skus { config } => {
            let config = load_config(&config)?;
            let skus = discover_skus(&config.paths.inbox_dir, &config.extensions)
                .with_context(|| {
                    format!("Failed to scan inbox {}", config.paths.inbox_dir.display())
                })?;
            tracing::info!(command = "skus", count = skus.len(), "Resolved inbox SKUs");
            for sku in &skus {
                println!("{sku}");
            }
            Ok(())
        }
    }
}
