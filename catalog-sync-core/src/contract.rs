//! # contract: seams between the pipeline and the outside world
//!
//! The pipeline talks to two collaborators it does not own:
//!
//! - the **remote image store**, a git remote reached through a local working
//!   copy ([`RemoteStore`]);
//! - the **caller**, which receives an ordered stream of human-readable
//!   progress lines ([`ProgressSink`]).
//!
//! ## Mocking & Testing
//! - [`RemoteStore`] is annotated for `mockall`, so tests can assert exactly
//!   which git operations a run performs and in what order. The mock is
//!   exported under the `test-export-mocks` feature for integration tests.
//! - [`RecordingProgress`] collects lines in memory for assertions.
//!
//! ## Adding New Stores
//! - Implement [`RemoteStore`] for the destination. Every method maps to one
//!   primitive the safe-sync protocol relies on; none may be skipped silently.
//! - Report failures as [`RemoteError`]; the publisher decides which ones are
//!   fatal.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::error::RemoteError;

/// Version-control primitives used by the publisher.
///
/// Paths passed to [`RemoteStore::add`] are relative to the working copy root.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Make sure the working copy is a repository with an `origin` remote.
    async fn ensure_repository(&self) -> Result<(), RemoteError>;

    /// Fetch `branch` from the remote.
    async fn fetch(&self, branch: &str) -> Result<(), RemoteError>;

    /// Check out `branch` locally at the remote tip, discarding local changes.
    async fn checkout(&self, branch: &str) -> Result<(), RemoteError>;

    /// Hard-reset the working copy to the remote tip of `branch`.
    async fn reset_hard(&self, branch: &str) -> Result<(), RemoteError>;

    /// Stage `paths`, including removals under them.
    async fn add(&self, paths: Vec<PathBuf>) -> Result<(), RemoteError>;

    /// Record a commit. With `allow_empty` the commit is created even when
    /// nothing is staged.
    async fn commit(&self, message: &str, allow_empty: bool) -> Result<(), RemoteError>;

    /// Force-push the local `branch` to the remote.
    async fn push_force(&self, branch: &str) -> Result<(), RemoteError>;

    /// Id of the commit currently checked out.
    async fn head_commit(&self) -> Result<String, RemoteError>;
}

/// Receives progress lines in the order the pipeline emits them.
pub trait ProgressSink: Send + Sync {
    fn line(&self, line: &str);
}

/// In-memory sink; keeps every line for later inspection.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    lines: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn line(&self, _line: &str) {}
}
