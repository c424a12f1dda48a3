//! Git operations wrapper for EMBPM
//!
//! Like Cargo's `git-fetch-with-cli`, EMBPM drives the system `git` binary instead of
//! embedding a Git library. Authentication therefore works exactly as it does for the
//! user's own git: SSH agents, credential helpers and `~/.gitconfig` all apply, which is
//! what makes `git@host:owner/project.git` locators usable out of the box.
//!
//! All operations are async (Tokio) and carry a timeout; see
//! [`command_builder::GitCommand`].
//!
//! # Example
//!
//! ```rust,no_run
//! use embpm_cli::git::GitRepo;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = GitRepo::clone("git@github.com:owner/testing-dummy.git", "/tmp/dummy").await?;
//! repo.fetch_tags().await?;
//! for tag in repo.list_tags().await? {
//!     println!("{tag}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_FETCH_TIMEOUT, GIT_LOCAL_TIMEOUT};
use crate::core::EmbpmError;
use command_builder::GitCommand;

/// A local git repository (a clone of a component or target).
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    /// Replaces the default clone and fetch timeouts
    network_timeout: Option<Duration>,
}

impl GitRepo {
    /// Wrap an existing repository directory. No validation is performed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            network_timeout: None,
        }
    }

    /// Use `timeout` for network operations instead of the defaults.
    #[must_use]
    pub const fn with_network_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.network_timeout = timeout;
        self
    }

    /// Clone `url` into `target`.
    ///
    /// `target` must not exist or must be an empty directory. The clone checks out the
    /// remote's default branch; use [`checkout`](Self::checkout) to move to a tag.
    pub async fn clone(url: &str, target: impl AsRef<Path>) -> Result<Self> {
        Self::clone_with_timeout(url, target, None).await
    }

    /// [`clone`](Self::clone) bounded by `timeout` (default [`GIT_CLONE_TIMEOUT`]).
    ///
    /// The returned repository keeps `timeout` for later fetches.
    pub async fn clone_with_timeout(
        url: &str,
        target: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let target_path = target.as_ref();

        GitCommand::clone(url, target_path)
            .with_timeout(Some(timeout.unwrap_or(GIT_CLONE_TIMEOUT)))
            .with_context(url.to_string())
            .execute_success()
            .await?;

        Ok(Self::new(target_path).with_network_timeout(timeout))
    }

    /// Refresh tags from `origin` so tag listing reflects the remote state.
    pub async fn fetch_tags(&self) -> Result<()> {
        GitCommand::fetch_tags()
            .current_dir(&self.path)
            .with_timeout(Some(self.network_timeout.unwrap_or(GIT_FETCH_TIMEOUT)))
            .execute_success()
            .await
            .with_context(|| format!("Failed to fetch tags in {}", self.path.display()))
    }

    /// List every tag name in the repository.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        if !self.is_git_repo() {
            return Err(anyhow::anyhow!("Not a git repository: {}", self.path.display()));
        }

        let stdout = GitCommand::list_tags()
            .current_dir(&self.path)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .execute_stdout()
            .await
            .with_context(|| format!("Failed to list git tags in {}", self.path.display()))?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(std::string::ToString::to_string)
            .collect())
    }

    /// Check out a tag, branch or commit (detached).
    pub async fn checkout(&self, ref_name: &str) -> Result<()> {
        GitCommand::checkout(ref_name)
            .current_dir(&self.path)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .execute_success()
            .await
    }

    /// SHA of the checked out commit.
    pub async fn current_commit(&self) -> Result<String> {
        GitCommand::current_commit()
            .current_dir(&self.path)
            .with_timeout(Some(GIT_LOCAL_TIMEOUT))
            .execute_stdout()
            .await
    }

    /// Whether the directory contains a `.git` entry.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Path of the repository.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a `git` executable can be found on `PATH`.
#[must_use]
pub fn is_git_installed() -> bool {
    which::which(command_builder::git_executable()).is_ok()
}

/// Fail with [`EmbpmError::GitNotFound`] when git is unavailable.
pub fn ensure_git_available() -> Result<(), EmbpmError> {
    if is_git_installed() {
        Ok(())
    } else {
        Err(EmbpmError::GitNotFound)
    }
}
