//! Global constants used throughout the EMBPM codebase.
//!
//! This module contains timeout durations, file names, and directory names
//! that are used across multiple modules. Defining them centrally keeps the
//! on-disk layout discoverable in one place.

use std::time::Duration;

/// Timeout for Git fetch operations (60 seconds).
///
/// Applies to `git fetch --tags` when enumerating the versions of a
/// working copy.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for Git clone operations (120 seconds).
///
/// Clones are the longest network operation the resolver performs; the
/// timeout bounds how long a single dependency can stall an install.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for local Git operations such as checkout (30 seconds).
pub const GIT_LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Manifest file describing a component.
pub const MODULE_MANIFEST: &str = "module.json";

/// Manifest file describing a build target.
pub const TARGET_MANIFEST: &str = "target.json";

/// Per-entry install record written by the store after a successful fetch.
pub const INSTALL_RECORD: &str = ".embpm-install.json";

/// Project-local directory holding installed dependencies.
pub const MODULES_DIR: &str = "embpm_modules";

/// Project-local directory holding installed build targets.
pub const TARGETS_DIR: &str = "embpm_targets";

/// Directory (inside a store root) holding per-name lock files.
pub const LOCKS_DIR: &str = ".locks";

/// Directory (inside a store root) holding in-flight staging directories.
pub const STAGING_DIR: &str = ".staging";

/// Base URL used to expand `owner/project` repository shorthand.
pub const GITHUB_BASE_URL: &str = "https://github.com";

/// Ref checked out when a wildcard spec meets a repository without version tags.
pub const DEFAULT_BRANCH_REF: &str = "HEAD";
