/// `load_config` module: Loads a static YAML config file, applies environment overrides,
/// and adapts it into the core crate's `PipelineConfig`.
///
/// This module is the only place where user-supplied YAML is parsed and mapped to the
/// strongly-typed internal structs.
///
/// # Responsibilities
/// - Parse the YAML sections (`paths`, `canvas`, `extensions`, `remote`) into raw structs
/// - Fill in the stock layout for anything left out (inbox under the repo, staging beside it)
/// - Apply `CATALOG_SYNC_REMOTE_URL` / `CATALOG_SYNC_BRANCH` from the environment
/// - Validate the result; any failure carries a clear diagnostic for the CLI
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use catalog_sync_core::config::{CanvasConfig, PipelineConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const REMOTE_URL_ENV: &str = "CATALOG_SYNC_REMOTE_URL";
pub const BRANCH_ENV: &str = "CATALOG_SYNC_BRANCH";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    paths: PathsSection,
    #[serde(default)]
    canvas: Option<CanvasSection>,
    #[serde(default)]
    extensions: Option<Vec<String>>,
    #[serde(default)]
    remote: RemoteSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    repo_dir: PathBuf,
    #[serde(default)]
    inbox_dir: Option<PathBuf>,
    #[serde(default)]
    staging_dir: Option<PathBuf>,
    #[serde(default)]
    published_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CanvasSection {
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteSection {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    commit_message: Option<String>,
    #[serde(default)]
    cleanup_message: Option<String>,
    #[serde(default)]
    publish_inbox_cleanup: Option<bool>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    author_email: Option<String>,
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loads a YAML config file and returns a validated pipeline config.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut config = PipelineConfig::with_repo_dir(raw.paths.repo_dir);
    if let Some(inbox_dir) = raw.paths.inbox_dir {
        config.paths.inbox_dir = inbox_dir;
    }
    if let Some(staging_dir) = raw.paths.staging_dir {
        config.paths.staging_dir = staging_dir;
    }
    if let Some(published_dir) = raw.paths.published_dir {
        config.paths.published_dir = published_dir;
    }
    if let Some(canvas) = raw.canvas {
        config.canvas = CanvasConfig {
            width: canvas.width,
            height: canvas.height,
        };
    }
    if let Some(extensions) = raw.extensions {
        config.extensions = extensions;
    }

    let remote = raw.remote;
    config.remote.url = remote.url;
    if let Some(branch) = remote.branch {
        config.remote.branch = branch;
    }
    if let Some(message) = remote.commit_message {
        config.remote.commit_message = message;
    }
    if let Some(message) = remote.cleanup_message {
        config.remote.cleanup_message = message;
    }
    if let Some(flag) = remote.publish_inbox_cleanup {
        config.remote.publish_inbox_cleanup = flag;
    }
    config.remote.author_name = remote.author_name;
    config.remote.author_email = remote.author_email;

    if let Some(url) = env_override(REMOTE_URL_ENV) {
        info!(env = REMOTE_URL_ENV, "Remote url overridden from environment");
        config.remote.url = Some(url);
    }
    if let Some(branch) = env_override(BRANCH_ENV) {
        info!(env = BRANCH_ENV, branch = %branch, "Branch overridden from environment");
        config.remote.branch = branch;
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
    config.trace_loaded();
    Ok(config)
}
