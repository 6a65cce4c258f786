use std::path::PathBuf;

use thiserror::Error;

use crate::sku::Sku;

/// Every way a run can abort. None of these is retried; the orchestrator
/// stops at the first one and leaves the inbox and staged tree in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("inbox {} has no valid image files", inbox.display())]
    NoValidImages { inbox: PathBuf },

    #[error("mismatch for SKU {sku} (source: {source_count}, staged: {staged_count})")]
    StagingMismatch {
        sku: Sku,
        source_count: usize,
        staged_count: usize,
    },

    #[error("failed to decode image {}: {source}", path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode normalized image {}: {source}", path.display())]
    EncodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("more than one staged file normalizes to {}", path.display())]
    ArtifactCollision { path: PathBuf },

    #[error("remote sync failed during {operation}: {detail}")]
    RemoteSyncFailure { operation: String, detail: String },

    #[error("{} is not inside the inbox", path.display())]
    OutsideInbox { path: PathBuf },

    #[error("cannot derive a SKU from {}: {reason}", path.display())]
    InvalidSku { path: PathBuf, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure reported by a [`crate::contract::RemoteStore`] implementation.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to launch git: {0}")]
    Launch(#[from] std::io::Error),

    #[error("`git {command}` exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Lifts an adapter error into the run-aborting pipeline error for `operation`.
    pub fn into_sync_failure(self, operation: &str) -> PipelineError {
        PipelineError::RemoteSyncFailure {
            operation: operation.to_string(),
            detail: self.to_string(),
        }
    }
}
