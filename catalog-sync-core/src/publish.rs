//! Safe partial publish of touched SKUs to the remote image store.
//!
//! A run moves through `PREPARE → REBASE → STAGE_SELECTED → COMMIT → PUSH →
//! CLEANUP`:
//!
//! - **PREPARE** makes sure the working copy is a repository with `origin`.
//! - **REBASE** fetches the branch, force-checks it out and hard-resets the
//!   working copy onto the remote tip, so remote deletions are respected,
//!   leftovers from an interrupted run are discarded and nothing stale is
//!   published.
//! - **STAGE_SELECTED** copies each touched SKU from the staged tree into
//!   `<repo>/<published_dir>/<SKU>/` and adds only those directories. Files
//!   of untouched SKUs are never added, so the commit cannot delete or
//!   rewrite them.
//! - **COMMIT** always produces a commit (`--allow-empty`).
//! - **PUSH** force-pushes the branch. After the rebase this is a plain
//!   fast-forward unless another writer raced, which is unsupported.
//! - **CLEANUP** empties the inbox, and when the inbox lives inside the
//!   working copy, commits and pushes the removal on a best-effort basis.
//!
//! Failures in the first five steps abort with
//! [`PipelineError::RemoteSyncFailure`]. Nothing is retried.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::contract::{ProgressSink, RemoteStore};
use crate::error::PipelineError;
use crate::sku::Sku;
use crate::stage::walk_files;

/// Acknowledgement of a completed publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishAck {
    pub branch: String,
    /// SKU directories that were present in the staged tree and added.
    pub staged_skus: Vec<Sku>,
    pub files_published: usize,
    pub head_commit: String,
    pub inbox_cleanup_pushed: bool,
}

/// Copies the staged files of `sku` into the published tree, overwriting
/// same-named files and leaving every other file in place. Returns the number
/// of files copied, or `None` when the SKU has no staged directory.
fn materialize_sku(
    staging_root: &Path,
    published_root: &Path,
    sku: &Sku,
) -> Result<Option<usize>, PipelineError> {
    let staged_dir = staging_root.join(sku);
    if !staged_dir.is_dir() {
        return Ok(None);
    }

    let mut copied = 0;
    for file in walk_files(&staged_dir)? {
        let relative = file
            .strip_prefix(&staged_dir)
            .map_err(|_| PipelineError::OutsideInbox { path: file.clone() })?;
        let dest = published_root.join(sku).join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        fs::copy(&file, &dest).map_err(|e| PipelineError::io(&file, e))?;
        debug!(sku = %sku, src = %file.display(), dst = %dest.display(), "Materialized file");
        copied += 1;
    }
    Ok(Some(copied))
}

/// Wipes the inbox and recreates it empty.
pub fn clear_inbox(inbox: &Path) -> Result<(), PipelineError> {
    if inbox.exists() {
        fs::remove_dir_all(inbox).map_err(|e| PipelineError::io(inbox, e))?;
    }
    fs::create_dir_all(inbox).map_err(|e| PipelineError::io(inbox, e))?;
    Ok(())
}

fn inbox_relative_to_repo(config: &PipelineConfig) -> Option<PathBuf> {
    if !crate::config::is_within(&config.paths.inbox_dir, &config.paths.repo_dir) {
        return None;
    }
    config
        .paths
        .inbox_dir
        .strip_prefix(&config.paths.repo_dir)
        .ok()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
}

/// Runs the safe-sync state machine for the SKUs touched by this run.
pub async fn publish<S>(
    store: &S,
    config: &PipelineConfig,
    touched: &BTreeSet<Sku>,
    progress: &dyn ProgressSink,
) -> Result<PublishAck, PipelineError>
where
    S: RemoteStore + ?Sized,
{
    let branch = config.remote.branch.as_str();
    let published_root = config.published_root();

    // Each SKU becomes one path under the published root and one `git add` path.
    if let Some(sku) = touched.iter().find(|sku| !sku.is_directory_name()) {
        error!(sku = %sku, "[PUBLISH] Refusing to publish SKU that is not a plain directory name");
        return Err(PipelineError::InvalidSku {
            path: published_root.join(sku.as_str()),
            reason: format!("{:?} is not a plain directory name", sku.as_str()),
        });
    }

    progress.line("Updating matching SKUs on remote (safe)...");
    info!(branch, skus = touched.len(), "[PUBLISH] Starting safe partial update");

    store
        .ensure_repository()
        .await
        .map_err(|e| e.into_sync_failure("prepare"))?;

    // REBASE
    store
        .fetch(branch)
        .await
        .map_err(|e| e.into_sync_failure("fetch"))?;
    store
        .checkout(branch)
        .await
        .map_err(|e| e.into_sync_failure("checkout"))?;
    store
        .reset_hard(branch)
        .await
        .map_err(|e| e.into_sync_failure("reset"))?;
    info!(branch, "[PUBLISH] Working copy re-baselined onto remote tip");

    // STAGE_SELECTED
    let mut staged_skus = Vec::new();
    let mut add_paths = Vec::new();
    let mut files_published = 0;
    for sku in touched {
        match materialize_sku(&config.paths.staging_dir, &published_root, sku)? {
            Some(count) => {
                files_published += count;
                staged_skus.push(sku.clone());
                add_paths.push(config.paths.published_dir.join(sku));
                progress.line(&format!("Staged {count} files for SKU {sku}"));
                info!(sku = %sku, files = count, "[PUBLISH] Staged SKU");
            }
            None => {
                warn!(sku = %sku, "[PUBLISH] No staged directory for touched SKU; skipping");
            }
        }
    }
    store
        .add(add_paths)
        .await
        .map_err(|e| e.into_sync_failure("add"))?;

    // COMMIT
    store
        .commit(&config.remote.commit_message, true)
        .await
        .map_err(|e| e.into_sync_failure("commit"))?;

    // PUSH
    store
        .push_force(branch)
        .await
        .map_err(|e| e.into_sync_failure("push"))?;
    let head_commit = store
        .head_commit()
        .await
        .map_err(|e| e.into_sync_failure("rev-parse"))?;
    progress.line(&format!("Pushed {head_commit} to {branch}"));
    info!(branch, head = %head_commit, "[PUBLISH] Force-pushed branch");

    // CLEANUP
    let inbox_cleanup_pushed = cleanup(store, config, progress).await?;

    Ok(PublishAck {
        branch: branch.to_string(),
        staged_skus,
        files_published,
        head_commit,
        inbox_cleanup_pushed,
    })
}

/// Clears the inbox. The follow-up commit is best effort: a failed commit
/// (typically nothing to commit) is logged and the push skipped.
async fn cleanup<S>(
    store: &S,
    config: &PipelineConfig,
    progress: &dyn ProgressSink,
) -> Result<bool, PipelineError>
where
    S: RemoteStore + ?Sized,
{
    let inbox = &config.paths.inbox_dir;
    clear_inbox(inbox)?;
    progress.line(&format!("Cleared inbox {}", inbox.display()));
    info!(inbox = %inbox.display(), "[CLEANUP] Inbox cleared");

    if !config.remote.publish_inbox_cleanup {
        return Ok(false);
    }
    let Some(relative) = inbox_relative_to_repo(config) else {
        debug!(inbox = %inbox.display(), "[CLEANUP] Inbox is outside the working copy; nothing to commit");
        return Ok(false);
    };

    if let Err(e) = store.add(vec![relative.clone()]).await {
        warn!(error = %e, path = %relative.display(), "[CLEANUP] Could not stage inbox removal");
        return Ok(false);
    }
    if let Err(e) = store.commit(&config.remote.cleanup_message, false).await {
        warn!(error = %e, "[CLEANUP] Inbox cleanup commit skipped");
        return Ok(false);
    }
    store
        .push_force(&config.remote.branch)
        .await
        .map_err(|e| {
            error!(error = %e, "[CLEANUP] Failed to push inbox cleanup");
            e.into_sync_failure("cleanup push")
        })?;
    progress.line("Pushed inbox cleanup");
    Ok(true)
}
