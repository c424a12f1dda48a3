//! Git test helper utilities
//!
//! Provides a small wrapper around the `git` binary for building throwaway
//! repositories in tests, including the user identity git needs to commit.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command runner for tests
///
/// Every command runs with an explicit author identity and signing disabled, so
/// tests do not depend on the machine's global git configuration.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args([
                "-c",
                "user.email=test@embpm.example",
                "-c",
                "user.name=EMBPM Test",
                "-c",
                "commit.gpgsign=false",
                "-c",
                "tag.gpgsign=false",
            ])
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Create a new TestGit instance for the given repository path
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initialize a new git repository, creating the directory if needed
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        Ok(())
    }

    /// Initialize a repository whose first commit contains a single file
    pub fn init_with_commit(&self, file: &str, content: &str) -> Result<()> {
        self.init()?;
        self.commit_file(file, content, "Initial commit")
    }

    /// Write `file`, stage everything and commit
    pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<()> {
        let path = self.repo_path.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.add_all()?;
        self.commit(message)
    }

    /// Add all files to staging
    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    /// Create a commit with the given message
    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Create a lightweight tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Get current commit SHA
    pub fn rev_parse_head(&self) -> Result<String> {
        let output =
            self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `file://` URL of the repository, usable as a locator
    #[must_use]
    pub fn file_url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }

    /// Return the repository path
    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}
