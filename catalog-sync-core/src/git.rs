use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::RemoteConfig;
use crate::contract::RemoteStore;
use crate::error::RemoteError;

const REMOTE_NAME: &str = "origin";

/// [`RemoteStore`] backed by the `git` binary, run against a local working copy.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    remote_url: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>, remote: &RemoteConfig) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            remote_url: remote.url.clone(),
            author_name: remote.author_name.clone(),
            author_email: remote.author_email.clone(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        if let Some(name) = &self.author_name {
            cmd.arg("-c").arg(format!("user.name={name}"));
        }
        if let Some(email) = &self.author_email {
            cmd.arg("-c").arg(format!("user.email={email}"));
        }
        cmd.arg("-C").arg(&self.repo_dir);
        cmd
    }

    /// Runs `git <args>` and returns trimmed stdout.
    async fn git<I, S>(&self, args: I) -> Result<String, RemoteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let args: Vec<std::ffi::OsString> = args
            .into_iter()
            .map(|a| a.as_ref().to_os_string())
            .collect();
        let rendered = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        let output = match self.command().args(&args).output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(
                    error = ?e,
                    command = %rendered,
                    repo_dir = %self.repo_dir.display(),
                    "Failed to launch git process"
                );
                return Err(RemoteError::Launch(e));
            }
        };

        if output.status.success() {
            tracing::debug!(
                command = %rendered,
                repo_dir = %self.repo_dir.display(),
                status = ?output.status,
                "git command succeeded"
            );
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                command = %rendered,
                repo_dir = %self.repo_dir.display(),
                stderr = %stderr,
                "Git exited with non-zero code: {}", output.status
            );
            Err(RemoteError::NonZeroExit {
                command: rendered,
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}

#[async_trait]
impl RemoteStore for GitCli {
    async fn ensure_repository(&self) -> Result<(), RemoteError> {
        if !self.repo_dir.join(".git").exists() {
            tokio::fs::create_dir_all(&self.repo_dir).await?;
            self.git(["init"]).await?;
            tracing::info!(repo_dir = %self.repo_dir.display(), "Initialised git working copy");
        }

        let remotes = self.git(["remote"]).await?;
        if remotes.lines().any(|name| name.trim() == REMOTE_NAME) {
            return Ok(());
        }
        match &self.remote_url {
            Some(url) => {
                self.git(["remote", "add", REMOTE_NAME, url.as_str()]).await?;
                tracing::info!(remote_url = %url, "Added origin remote");
                Ok(())
            }
            None => Err(RemoteError::Other(format!(
                "{} has no `{REMOTE_NAME}` remote and no remote url is configured",
                self.repo_dir.display()
            ))),
        }
    }

    async fn fetch(&self, branch: &str) -> Result<(), RemoteError> {
        self.git(["fetch", REMOTE_NAME, branch]).await.map(|_| ())
    }

    async fn checkout(&self, branch: &str) -> Result<(), RemoteError> {
        let upstream = format!("{REMOTE_NAME}/{branch}");
        // `-f` discards local edits so a dirty working copy cannot block the rebase.
        self.git(["checkout", "-f", "-B", branch, upstream.as_str()])
            .await
            .map(|_| ())
    }

    async fn reset_hard(&self, branch: &str) -> Result<(), RemoteError> {
        let upstream = format!("{REMOTE_NAME}/{branch}");
        self.git(["reset", "--hard", upstream.as_str()])
            .await
            .map(|_| ())
    }

    async fn add(&self, paths: Vec<PathBuf>) -> Result<(), RemoteError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<std::ffi::OsString> = vec!["add".into(), "-A".into(), "--".into()];
        args.extend(paths.into_iter().map(PathBuf::into_os_string));
        self.git(args).await.map(|_| ())
    }

    async fn commit(&self, message: &str, allow_empty: bool) -> Result<(), RemoteError> {
        let mut args = vec!["commit", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.git(args).await.map(|_| ())
    }

    async fn push_force(&self, branch: &str) -> Result<(), RemoteError> {
        self.git(["push", "--force", REMOTE_NAME, branch])
            .await
            .map(|_| ())
    }

    async fn head_commit(&self) -> Result<String, RemoteError> {
        self.git(["rev-parse", "HEAD"]).await
    }
}
