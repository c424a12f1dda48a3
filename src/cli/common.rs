//! Common context for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::ComponentStore;
use crate::component::Component;
use crate::config::{self, BUILD_SECTION, FileSettings, SettingsStore, TARGET_KEY};
use crate::constants::{MODULE_MANIFEST, MODULES_DIR, TARGETS_DIR};
use crate::source::GitFetcher;
use crate::target::TargetSpec;

/// Working directory and settings shared by every command.
#[derive(Debug)]
pub struct CommandContext {
    /// Directory the command runs in; the project root when it holds a module
    pub working_dir: PathBuf,
    pub settings: FileSettings,
    /// Deadline for each clone or tag fetch; `None` keeps the git defaults
    pub git_timeout: Option<Duration>,
}

impl CommandContext {
    /// Load settings for `working_dir`.
    ///
    /// `config_path` replaces the default global settings file.
    pub async fn load(working_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let global = match config_path {
            Some(path) => path,
            None => config::default_global_config_path()?,
        };
        let local = config::local_config_path(&working_dir);
        let settings = FileSettings::load(Some(local), Some(global))
            .await
            .context("Failed to load settings")?;
        Ok(Self {
            working_dir,
            settings,
            git_timeout: None,
        })
    }

    /// Whether the working directory holds a `module.json`.
    pub fn has_module(&self) -> bool {
        self.working_dir.join(MODULE_MANIFEST).is_file()
    }

    /// The module in the working directory, if there is one.
    pub fn module(&self) -> Result<Option<Component>> {
        if !self.has_module() {
            return Ok(None);
        }
        Ok(Some(Component::load(&self.working_dir)?))
    }

    pub fn modules_store(&self, global: bool) -> Result<ComponentStore> {
        Ok(if global {
            ComponentStore::modules(config::global_modules_dir()?)
        } else {
            ComponentStore::modules(self.working_dir.join(MODULES_DIR))
        })
    }

    pub fn targets_store(&self, global: bool) -> Result<ComponentStore> {
        Ok(if global {
            ComponentStore::targets(config::global_targets_dir()?)
        } else {
            ComponentStore::targets(self.working_dir.join(TARGETS_DIR))
        })
    }

    /// A fetcher resolving names through the `[sources]` tables.
    pub fn fetcher(&self) -> GitFetcher {
        GitFetcher::from_settings(&self.settings).with_timeout(self.git_timeout)
    }

    /// The effective `build.target`, if one is set.
    pub fn current_target(&self) -> Result<Option<TargetSpec>> {
        match self.settings.lookup_str(BUILD_SECTION, TARGET_KEY) {
            Some(text) => Ok(Some(TargetSpec::parse(&text)?)),
            None => Ok(None),
        }
    }
}

/// Resolve `dir` (default: the working directory) to an absolute path.
pub fn resolve_dir(working_dir: &Path, dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => working_dir.join(dir),
        None => working_dir.to_path_buf(),
    };
    dir.canonicalize().with_context(|| format!("Cannot access {}", dir.display()))
}
