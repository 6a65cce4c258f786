use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::PipelineError;

/// Everything a run needs, already resolved to concrete paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub canvas: CanvasConfig,
    pub extensions: Vec<String>,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Git working copy of the image store.
    pub repo_dir: PathBuf,
    /// Where the uploader deposits files.
    pub inbox_dir: PathBuf,
    /// Scratch SKU tree, rebuilt every run. Must not live inside `repo_dir`.
    pub staging_dir: PathBuf,
    /// Published SKU tree, relative to `repo_dir`.
    pub published_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 3000,
            height: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub branch: String,
    pub commit_message: String,
    pub cleanup_message: String,
    /// Commit and push the emptied inbox when it lives inside the working copy.
    pub publish_inbox_cleanup: bool,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            branch: "main".to_string(),
            commit_message: "Partial SKU update (safe)".to_string(),
            cleanup_message: "Clear source_images after processing".to_string(),
            publish_inbox_cleanup: true,
            author_name: None,
            author_email: None,
        }
    }
}

pub fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

impl PipelineConfig {
    /// Config with the stock layout: inbox at `<repo>/source_images`, staging
    /// next to the repo at `<repo>-staging`, published tree at `images/`.
    pub fn with_repo_dir(repo_dir: impl Into<PathBuf>) -> Self {
        let repo_dir = repo_dir.into();
        let staging_dir = sibling_with_suffix(&repo_dir, "-staging");
        Self {
            paths: PathsConfig {
                inbox_dir: repo_dir.join("source_images"),
                staging_dir,
                published_dir: PathBuf::from("images"),
                repo_dir,
            },
            canvas: CanvasConfig::default(),
            extensions: default_extensions(),
            remote: RemoteConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        if self.extensions.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "image extension allowlist is empty".to_string(),
            ));
        }
        if self.remote.branch.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "remote branch name is empty".to_string(),
            ));
        }
        if self.paths.published_dir.is_absolute() {
            return Err(PipelineError::InvalidConfig(format!(
                "published_dir must be relative to repo_dir, got {}",
                self.paths.published_dir.display()
            )));
        }
        // A hard reset of the working copy would clobber normalized output.
        if is_within(&self.paths.staging_dir, &self.paths.repo_dir) {
            return Err(PipelineError::InvalidConfig(format!(
                "staging_dir {} must be outside repo_dir {}",
                self.paths.staging_dir.display(),
                self.paths.repo_dir.display()
            )));
        }
        Ok(())
    }

    pub fn published_root(&self) -> PathBuf {
        self.paths.repo_dir.join(&self.paths.published_dir)
    }

    pub fn trace_loaded(&self) {
        info!(
            repo_dir = %self.paths.repo_dir.display(),
            inbox_dir = %self.paths.inbox_dir.display(),
            staging_dir = %self.paths.staging_dir.display(),
            canvas_width = self.canvas.width,
            canvas_height = self.canvas.height,
            branch = %self.remote.branch,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}

fn sibling_with_suffix(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    let sibling = format!("{name}{suffix}");
    match dir.parent() {
        Some(parent) => parent.join(sibling),
        None => PathBuf::from(sibling),
    }
}

/// Lexical containment check; both paths are compared component-wise after
/// making them absolute against the current directory.
pub(crate) fn is_within(path: &Path, root: &Path) -> bool {
    let absolute = |p: &Path| -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(p))
                .unwrap_or_else(|_| p.to_path_buf())
        }
    };
    let normalize = |p: PathBuf| -> PathBuf {
        let mut out = PathBuf::new();
        for component in p.components() {
            match component {
                std::path::Component::CurDir => {}
                std::path::Component::ParentDir => {
                    out.pop();
                }
                other => out.push(other.as_os_str()),
            }
        }
        out
    };
    normalize(absolute(path)).starts_with(normalize(absolute(root)))
}
