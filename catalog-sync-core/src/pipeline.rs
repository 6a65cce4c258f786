//! High-level pipeline: orchestrates stage → normalize → publish for one inbox drop.
//!
//! This module sequences the stages of a run and aggregates their results:
//!   - Reconciles the inbox into a fresh per-SKU staged tree ([`crate::stage`])
//!   - Normalizes every staged image in place ([`crate::normalize`])
//!   - Publishes only the SKUs touched by this run and clears the inbox ([`crate::publish`])
//!   - Emits a final summary line and returns a [`RunReport`]
//!
//! # Responsibilities
//! - Fail-fast orchestration: the first error stops the run, leaving the inbox
//!   and staged tree in place for inspection
//! - Progress lines are emitted in stage order as each event happens
//! - Each stage returns its results by value; nothing is counted in shared state
//!
//! # Callable From
//! - The CLI crate and integration tests
//! - Expects a concrete [`RemoteStore`] (the git adapter in production, a mock in tests)
//!
//! # Navigation
//! - Main entrypoint: [`run_pipeline`]
//! - Touched-SKU enumeration: [`discover_skus`]

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::contract::{ProgressSink, RemoteStore};
use crate::error::PipelineError;
use crate::normalize::{self, NormalizedArtifact};
use crate::publish::{self, PublishAck};
use crate::sku::Sku;
use crate::stage::{self, StagingReport};

/// Everything one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub touched_skus: BTreeSet<Sku>,
    pub staging: StagingReport,
    pub artifacts: Vec<NormalizedArtifact>,
    pub publish: PublishAck,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.artifacts.len()
    }

    pub fn summary_line(&self) -> String {
        summary_line(self.processed(), &self.touched_skus)
    }
}

fn summary_line(processed: usize, skus: &BTreeSet<Sku>) -> String {
    let names: Vec<&str> = skus.iter().map(Sku::as_str).collect();
    format!(
        "Uploaded {processed} images for SKUs: {}",
        names.join(", ")
    )
}

/// SKUs the inbox would touch, derived with the same rule used for staging.
pub fn discover_skus(inbox_root: &Path, allowlist: &[String]) -> Result<BTreeSet<Sku>, PipelineError> {
    Ok(stage::scan_inbox(inbox_root, allowlist)?
        .into_iter()
        .map(|item| item.sku)
        .collect())
}

/// Runs one full pass over the inbox.
pub async fn run_pipeline<S>(
    config: &PipelineConfig,
    store: &S,
    progress: &dyn ProgressSink,
) -> Result<RunReport, PipelineError>
where
    S: RemoteStore + ?Sized,
{
    config.validate()?;
    info!("[RUN] Starting catalog sync pipeline");

    // Step 1: Stage
    progress.line("Preparing staging area...");
    let staging = match stage::reconcile(
        &config.paths.inbox_dir,
        &config.paths.staging_dir,
        &config.extensions,
        progress,
    ) {
        Ok(report) => {
            info!(skus = report.per_sku.len(), copied = report.copied, "[STAGE] Reconciliation succeeded");
            report
        }
        Err(e) => {
            error!(error = %e, "[STAGE][ERROR] Reconciliation failed");
            return Err(e);
        }
    };
    progress.line(&format!(
        "{} images copied to staging. Starting processing...",
        staging.copied
    ));

    // Step 2: Normalize
    let artifacts = match normalize::normalize_tree(
        &config.paths.staging_dir,
        config.canvas,
        &config.extensions,
        progress,
    )
    .await
    {
        Ok(artifacts) => {
            info!(count = artifacts.len(), "[NORMALIZE] Normalization succeeded");
            artifacts
        }
        Err(e) => {
            error!(error = %e, "[NORMALIZE][ERROR] Normalization failed");
            return Err(e);
        }
    };
    progress.line(&format!("Processed {} images.", artifacts.len()));

    // Step 3: Publish, scoped to the SKUs found in the inbox
    let touched: BTreeSet<Sku> = staging.skus().cloned().collect();
    let ack = match publish::publish(store, config, &touched, progress).await {
        Ok(ack) => {
            info!(head = %ack.head_commit, skus = ack.staged_skus.len(), "[PUBLISH] Publish succeeded");
            ack
        }
        Err(e) => {
            error!(error = %e, "[PUBLISH][ERROR] Publish failed");
            return Err(e);
        }
    };

    let report = RunReport {
        touched_skus: touched,
        staging,
        artifacts,
        publish: ack,
    };
    progress.line(&report.summary_line());
    info!(processed = report.processed(), "[RUN] Pipeline complete");
    Ok(report)
}
