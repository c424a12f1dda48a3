//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing Git commands,
//! so every clone, fetch and checkout performed by the resolver goes through the
//! same timeout handling, logging and error classification.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::EmbpmError;

/// Name of the git executable for the current platform.
pub const fn git_executable() -> &'static str {
    if cfg!(windows) { "git.exe" } else { "git" }
}

/// Builder for Git commands with consistent error handling and logging.
///
/// Commands run through `tokio::process` with captured output and a timeout
/// (five minutes unless overridden). Failures are classified into
/// [`EmbpmError::GitCloneFailed`] or [`EmbpmError::GitCommandError`].
///
/// # Examples
///
/// ```rust,no_run
/// use embpm_cli::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let tags = GitCommand::list_tags()
///     .current_dir("/path/to/repo")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GitCommand {
    /// Command arguments
    args: Vec<String>,

    /// Working directory for the command
    current_dir: Option<PathBuf>,

    /// Environment variables to set
    env_vars: Vec<(String, String)>,

    /// Timeout for the command (None means no timeout)
    timeout_duration: Option<Duration>,

    /// Optional context for logging (e.g., the component name being fetched)
    context: Option<String>,

    /// URL being cloned, kept for error reporting
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never block on interactive credential prompts
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Create a new Git command builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for the command (passed to git as `-C`)
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the command
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Attach a context string that prefixes the debug log lines of this command
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Execute the command and return the output
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git = git_executable();
        let mut cmd = Command::new(git);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.clone());

        cmd.args(&full_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // a timed out git must not keep writing into its destination
        cmd.kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let ctx = self.context.as_deref().unwrap_or("git");
        tracing::debug!(target: "git", "({}) Executing command: {} {}", ctx, git, full_args.join(" "));

        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        anyhow::Error::new(EmbpmError::GitNotFound)
                    } else {
                        anyhow::Error::new(e)
                            .context(format!("Failed to execute git {}", full_args.join(" ")))
                    }
                })?,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(EmbpmError::GitCommandError {
                        operation,
                        stderr: format!(
                            "Git command timed out after {} seconds. Check network connectivity \
                             and credentials, then try: git {}",
                            duration.as_secs(),
                            full_args.join(" ")
                        ),
                    }
                    .into());
                }
            }
        } else {
            output_future
                .await
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::debug!(
                target: "git",
                "({}) Command failed with exit code {:?}: {}",
                ctx,
                output.status.code(),
                stderr.trim()
            );

            let error = if operation == "clone" {
                EmbpmError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason: stderr,
                }
            } else {
                EmbpmError::GitCommandError {
                    operation,
                    stderr,
                }
            };
            return Err(error.into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "({}) Git {} took {:.2}s", ctx, operation, elapsed.as_secs_f64());
        } else {
            tracing::trace!(target: "git::perf", "({}) Git {} took {}ms", ctx, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute and return only the trimmed stdout
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute and discard the output
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output from a Git command
pub struct GitCommandOutput {
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
}

// Convenience builders for the operations the resolver needs

impl GitCommand {
    /// Create a clone command
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new();
        cmd.args.push("clone".to_string());
        cmd.args.push("--quiet".to_string());
        cmd.args.push(url.to_string());
        cmd.args.push(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Create a fetch command that refreshes tags from the remote
    pub fn fetch_tags() -> Self {
        Self::new().args(["fetch", "--tags", "--force", "--quiet", "origin"])
    }

    /// Create a checkout command
    pub fn checkout(ref_name: &str) -> Self {
        Self::new().args(["checkout", "--quiet", ref_name])
    }

    /// Create a tag list command
    pub fn list_tags() -> Self {
        Self::new().args(["tag", "-l"])
    }

    /// Create a command to get the current commit hash
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }
}
