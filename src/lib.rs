//! EMBPM - Embedded Package Manager
//!
//! A git-based package manager for embedded software components and build targets.
//! Components and targets are published as git repositories whose tags name their
//! versions; there is no central registry.
//!
//! # Architecture Overview
//!
//! - A **component** (`module.json`) declares dependencies by name and version spec,
//!   optionally per target (`targetDependencies`).
//! - A **target** (`target.json`) may inherit from a base target, forming a
//!   hierarchy walked down to its root.
//! - Installed components and targets live in **stores**: `embpm_modules/` and
//!   `embpm_targets/` inside a project, or `~/.embpm/{modules,targets}` user-wide.
//!
//! # Core Modules
//!
//! ## Values
//! - [`version`] - versions, version specs and selection
//! - [`locator`] - repository addresses with an optional `#ref` fragment
//!
//! ## Resolution
//! - [`source`] - remote repositories, working copies and the fetcher seam
//! - [`component`] - components and targets loaded from their manifests
//! - [`target`] - target specs, hierarchy resolution and target filters
//! - [`installer`] - recursive dependency installation
//!
//! ## Infrastructure
//! - [`cache`] - stores, install records and file locks
//! - [`config`] - settings files and well-known directories
//! - [`git`] - git command wrapper using the system git
//! - [`manifest`] - `module.json` / `target.json` formats
//! - [`core`] - the error type and its user-facing rendering
//! - [`cli`] - the `embpm` command surface
//!
//! # Example
//!
//! ```rust,no_run
//! use embpm_cli::cache::ComponentStore;
//! use embpm_cli::installer::{InstallOptions, InstallRequest, Installer};
//! use embpm_cli::source::GitFetcher;
//! use embpm_cli::version::VersionSpec;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = GitFetcher::default();
//! let installer = Installer::with_stores(
//!     ComponentStore::modules("embpm_modules"),
//!     ComponentStore::modules("/home/me/.embpm/modules"),
//!     &fetcher,
//! );
//! let outcome = installer
//!     .install_component(&InstallRequest {
//!         name: "testing-dummy".to_string(),
//!         spec: VersionSpec::parse("git@github.com:autopulated/testing-dummy.git#0.0.1")?,
//!         options: InstallOptions::default(),
//!     })
//!     .await;
//! for error in &outcome.errors {
//!     eprintln!("{error}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod component;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod installer;
pub mod locator;
pub mod manifest;
pub mod source;
pub mod target;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
