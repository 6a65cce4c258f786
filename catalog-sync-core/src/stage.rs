//! Staging reconciler: inbox → canonical `<staging>/<SKU>/<file>` tree.
//!
//! The staged tree is wiped and rebuilt on every run, copies are
//! byte-for-byte, and per-SKU counts are verified before anything downstream
//! is allowed to look at the tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::contract::ProgressSink;
use crate::error::PipelineError;
use crate::sku::{is_allowed_image, resolve_sku, Sku};

/// An allowlisted file found in the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxItem {
    pub path: PathBuf,
    pub file_name: String,
    pub sku: Sku,
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingReport {
    /// Inbox file count per SKU; equal to the staged count once verified.
    pub per_sku: BTreeMap<Sku, usize>,
    pub copied: usize,
}

impl StagingReport {
    pub fn skus(&self) -> impl Iterator<Item = &Sku> {
        self.per_sku.keys()
    }
}

/// Every regular file under `dir`, depth first, sorted by path.
/// A missing directory yields an empty list.
pub(crate) fn walk_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    fn visit_dir(dir: &Path, results: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
        let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
        for entry_res in entries {
            let entry = entry_res.map_err(|e| PipelineError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| PipelineError::io(&path, e))?;
            if file_type.is_dir() {
                visit_dir(&path, results)?;
            } else if file_type.is_file() {
                results.push(path);
            } else {
                debug!(path = %path.display(), "Skipping non-regular file");
            }
        }
        Ok(())
    }

    let mut results = Vec::new();
    if dir.is_dir() {
        visit_dir(dir, &mut results)?;
    }
    results.sort();
    Ok(results)
}

/// Lists the allowlisted inbox files with their SKUs, in path order.
pub fn scan_inbox(inbox_root: &Path, allowlist: &[String]) -> Result<Vec<InboxItem>, PipelineError> {
    let mut items = Vec::new();
    for path in walk_files(inbox_root)? {
        if !is_allowed_image(&path, allowlist) {
            debug!(path = %path.display(), "Ignoring file outside the image allowlist");
            continue;
        }
        let sku = resolve_sku(inbox_root, &path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        items.push(InboxItem {
            path,
            file_name,
            sku,
        });
    }
    Ok(items)
}

fn count_staged(dir: &Path, allowlist: &[String]) -> Result<usize, PipelineError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry_res in fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))? {
        let entry = entry_res.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && is_allowed_image(&path, allowlist) {
            count += 1;
        }
    }
    Ok(count)
}

/// Copies the inbox into `staging_root`, grouped by SKU, and verifies counts.
///
/// Fails with [`PipelineError::NoValidImages`] before touching `staging_root`
/// when the inbox holds no allowlisted file, and with
/// [`PipelineError::StagingMismatch`] when any SKU's staged count differs
/// from its inbox count.
pub fn reconcile(
    inbox_root: &Path,
    staging_root: &Path,
    allowlist: &[String],
    progress: &dyn ProgressSink,
) -> Result<StagingReport, PipelineError> {
    let items = scan_inbox(inbox_root, allowlist)?;
    if items.is_empty() {
        error!(inbox = %inbox_root.display(), "Inbox has no valid image files");
        return Err(PipelineError::NoValidImages {
            inbox: inbox_root.to_path_buf(),
        });
    }
    info!(inbox = %inbox_root.display(), files = items.len(), "Found inbox images");

    if staging_root.exists() {
        fs::remove_dir_all(staging_root).map_err(|e| PipelineError::io(staging_root, e))?;
        debug!(path = %staging_root.display(), "Removed previous staging tree");
    }
    fs::create_dir_all(staging_root).map_err(|e| PipelineError::io(staging_root, e))?;

    let mut per_sku: BTreeMap<Sku, usize> = BTreeMap::new();
    for item in &items {
        let dest_dir = staging_root.join(&item.sku);
        fs::create_dir_all(&dest_dir).map_err(|e| PipelineError::io(&dest_dir, e))?;
        let dest = dest_dir.join(&item.file_name);
        fs::copy(&item.path, &dest).map_err(|e| PipelineError::io(&item.path, e))?;
        *per_sku.entry(item.sku.clone()).or_insert(0) += 1;
        debug!(sku = %item.sku, src = %item.path.display(), dst = %dest.display(), "Copied inbox file");
        progress.line(&format!(
            "Copied {} -> {}",
            item.path.display(),
            dest.display()
        ));
    }

    for (sku, &source_count) in &per_sku {
        let staged_count = count_staged(&staging_root.join(sku), allowlist)?;
        if staged_count != source_count {
            error!(sku = %sku, source_count, staged_count, "Staged count does not match inbox");
            progress.line(&format!(
                "Mismatch for {sku} (source: {source_count}, staged: {staged_count})"
            ));
            return Err(PipelineError::StagingMismatch {
                sku: sku.clone(),
                source_count,
                staged_count,
            });
        }
        progress.line(&format!(
            "SKU {sku}: {source_count} images copied successfully"
        ));
    }

    let copied = per_sku.values().sum();
    info!(skus = per_sku.len(), copied, "Staging reconciled");
    Ok(StagingReport { per_sku, copied })
}
