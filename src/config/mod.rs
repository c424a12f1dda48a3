//! Settings and well-known directories for EMBPM.
//!
//! Settings live in two TOML files, read and written through the [`SettingsStore`]
//! interface rather than any process-wide state:
//!
//! - **Local** (`<project>/.embpm/config.toml`) - per-project overrides
//! - **Global** (`~/.embpm/config.toml`) - per-user defaults, overridable with
//!   `EMBPM_CONFIG` or `--config`
//!
//! ```toml
//! [build]
//! target = "frdm-k64f-gcc,*"
//! targetSetExplicitly = true
//!
//! [sources]
//! testing-dummy = "git@github.com:autopulated/testing-dummy.git"
//! kinetis-gcc = "ARMmbed/target-kinetis-gcc"
//! ```
//!
//! The `[sources]` table maps component and target names to repository locators;
//! it is the only way a plain name (as opposed to a remote pin) reaches a repository.
//!
//! # Directories
//!
//! | Purpose          | Default                  | Override          |
//! |------------------|--------------------------|-------------------|
//! | Home             | `~/.embpm`               | `EMBPM_HOME`      |
//! | Global modules   | `~/.embpm/modules`       |                   |
//! | Global targets   | `~/.embpm/targets`       |                   |

pub mod settings;

pub use settings::{FileSettings, Scope, SettingsStore};

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Section holding the target selection.
pub const BUILD_SECTION: &str = "build";
/// Key for the selected target spec (`name,spec`).
pub const TARGET_KEY: &str = "target";
/// Key recording that the user chose the target explicitly.
pub const TARGET_SET_EXPLICITLY_KEY: &str = "targetSetExplicitly";
/// Section mapping names to repository locators.
pub const SOURCES_SECTION: &str = "sources";

/// Returns the EMBPM home directory (`EMBPM_HOME`, else `~/.embpm`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn get_embpm_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("EMBPM_HOME") {
        return Ok(PathBuf::from(dir));
    }

    let home = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("embpm")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".embpm")
    };
    Ok(home)
}

/// Default path of the global settings file.
pub fn default_global_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("EMBPM_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    Ok(get_embpm_home()?.join("config.toml"))
}

/// Path of the local settings file for a project.
#[must_use]
pub fn local_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".embpm").join("config.toml")
}

/// Store for globally installed (and linked) components.
pub fn global_modules_dir() -> Result<PathBuf> {
    Ok(get_embpm_home()?.join("modules"))
}

/// Store for globally installed (and linked) targets.
pub fn global_targets_dir() -> Result<PathBuf> {
    Ok(get_embpm_home()?.join("targets"))
}
