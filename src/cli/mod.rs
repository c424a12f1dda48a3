//! Command-line interface for EMBPM.
//!
//! Each command lives in its own module with a clap `Args` struct and an async
//! `execute` that returns the process exit code.
//!
//! # Available Commands
//!
//! - `target` - show the target hierarchy, or set the build target
//! - `install` - install a component, or the current module's dependencies
//! - `link` - link a development copy of a component
//! - `link-target` - link a development copy of a target
//!
//! # Exit Codes
//!
//! | Command                  | Exit code                                     |
//! |--------------------------|-----------------------------------------------|
//! | `target` (display)       | number of errors met walking the hierarchy    |
//! | `target <spec>`          | 1 for an invalid spec or installation errors  |
//! | `install`                | 1 when any error was collected                |
//! | anything else failing    | 1, with the error printed to stderr           |
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - log level (overridden by `RUST_LOG`)
//! - `--plain` - no colors
//! - `--config <path>` - global settings file (env `EMBPM_CONFIG`)
//! - `--git-timeout <seconds>` - deadline for each clone or tag fetch (env `EMBPM_GIT_TIMEOUT`)
//!
//! ```bash
//! embpm target frdm-k64f-gcc
//! embpm -v install
//! embpm --config ./ci-config.toml target
//! ```

pub mod common;
mod install;
mod link;
mod target;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use common::CommandContext;

/// Main CLI structure for EMBPM.
#[derive(Parser, Debug)]
#[command(
    name = "embpm",
    about = "EMBPM - Manage embedded software components and build targets",
    version,
    long_about = "EMBPM installs versioned components and build target hierarchies from git repositories."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    plain: bool,

    /// Path to the global settings file
    #[arg(long, global = true, env = "EMBPM_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds each clone or tag fetch may take
    #[arg(long, global = true, env = "EMBPM_GIT_TIMEOUT", value_name = "SECONDS")]
    git_timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the build target hierarchy, or set the build target
    Target(target::TargetCommand),

    /// Install a component and its dependencies
    Install(install::InstallCommand),

    /// Link a development copy of a component
    Link(link::LinkCommand),

    /// Link a development copy of a target
    LinkTarget(link::LinkTargetCommand),
}

impl Cli {
    /// Log filter directive for the selected verbosity.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    #[must_use]
    pub fn plain(&self) -> bool {
        self.plain
    }

    /// Run the command in the current directory.
    pub async fn execute(self) -> Result<i32> {
        let working_dir = std::env::current_dir().context("Cannot determine the current directory")?;
        self.execute_in(working_dir).await
    }

    /// Run the command with `working_dir` as the current directory.
    pub async fn execute_in(self, working_dir: PathBuf) -> Result<i32> {
        let mut ctx = CommandContext::load(working_dir, self.config).await?;
        ctx.git_timeout = self.git_timeout.map(Duration::from_secs);
        match self.command {
            Commands::Target(cmd) => cmd.execute(ctx).await,
            Commands::Install(cmd) => cmd.execute(ctx).await,
            Commands::Link(cmd) => cmd.execute(ctx).await,
            Commands::LinkTarget(cmd) => cmd.execute(ctx).await,
        }
    }
}
