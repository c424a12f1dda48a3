//! The settings interface and its TOML-file implementation.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use toml::{Table, Value};

/// Which settings file a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The project's `.embpm/config.toml`
    Local,
    /// The per-user `config.toml`
    Global,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Read/write access to named settings at a given scope.
///
/// Passed by reference into the resolver and installer entry points; nothing in the
/// core reads settings any other way.
pub trait SettingsStore: Send + Sync {
    /// Value of `section.key` at exactly `scope`.
    fn get(&self, scope: Scope, section: &str, key: &str) -> Option<Value>;

    /// Set `section.key` at `scope`, creating the section if needed.
    fn set(&mut self, scope: Scope, section: &str, key: &str, value: Value) -> Result<()>;

    /// All string entries of `section` at `scope`.
    fn section(&self, scope: Scope, section: &str) -> BTreeMap<String, String>;

    /// Effective value: local shadows global.
    fn lookup(&self, section: &str, key: &str) -> Option<Value> {
        self.get(Scope::Local, section, key).or_else(|| self.get(Scope::Global, section, key))
    }

    fn lookup_str(&self, section: &str, key: &str) -> Option<String> {
        match self.lookup(section, key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Effective entries of `section`, local entries replacing global ones.
    fn merged_section(&self, section: &str) -> BTreeMap<String, String> {
        let mut merged = self.section(Scope::Global, section);
        merged.extend(self.section(Scope::Local, section));
        merged
    }
}

/// Settings backed by a local and a global TOML file.
///
/// Mutations stay in memory until [`FileSettings::save`]. A store created with
/// [`FileSettings::new`] and never saved is a plain in-memory store.
#[derive(Debug, Clone, Default)]
pub struct FileSettings {
    local_path: Option<PathBuf>,
    global_path: Option<PathBuf>,
    local: Table,
    global: Table,
    local_dirty: bool,
    global_dirty: bool,
}

impl FileSettings {
    /// An empty store that will save to the given paths.
    #[must_use]
    pub fn new(local_path: Option<PathBuf>, global_path: Option<PathBuf>) -> Self {
        Self {
            local_path,
            global_path,
            ..Self::default()
        }
    }

    /// Load both files; a missing file is an empty scope.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or is not valid TOML.
    pub async fn load(local_path: Option<PathBuf>, global_path: Option<PathBuf>) -> Result<Self> {
        let local = match &local_path {
            Some(path) => load_table(path).await?,
            None => Table::new(),
        };
        let global = match &global_path {
            Some(path) => load_table(path).await?,
            None => Table::new(),
        };
        Ok(Self {
            local_path,
            global_path,
            local,
            global,
            local_dirty: false,
            global_dirty: false,
        })
    }

    /// Write every modified scope back to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if a modified scope has no file path, or writing fails.
    pub async fn save(&mut self) -> Result<()> {
        if self.local_dirty {
            let path = self
                .local_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("No local settings file (not inside a project?)"))?;
            save_table(path, &self.local).await?;
            self.local_dirty = false;
        }
        if self.global_dirty {
            let path = self
                .global_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("No global settings file configured"))?;
            save_table(path, &self.global).await?;
            self.global_dirty = false;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self, scope: Scope) -> Option<&Path> {
        match scope {
            Scope::Local => self.local_path.as_deref(),
            Scope::Global => self.global_path.as_deref(),
        }
    }

    fn table(&self, scope: Scope) -> &Table {
        match scope {
            Scope::Local => &self.local,
            Scope::Global => &self.global,
        }
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, scope: Scope, section: &str, key: &str) -> Option<Value> {
        self.table(scope).get(section)?.as_table()?.get(key).cloned()
    }

    fn set(&mut self, scope: Scope, section: &str, key: &str, value: Value) -> Result<()> {
        let table = match scope {
            Scope::Local => {
                self.local_dirty = true;
                &mut self.local
            }
            Scope::Global => {
                self.global_dirty = true;
                &mut self.global
            }
        };
        let entry = table.entry(section.to_string()).or_insert_with(|| Value::Table(Table::new()));
        let Value::Table(section_table) = entry else {
            anyhow::bail!("Settings entry '{section}' ({scope}) is not a table");
        };
        section_table.insert(key.to_string(), value);
        Ok(())
    }

    fn section(&self, scope: Scope, section: &str) -> BTreeMap<String, String> {
        self.table(scope)
            .get(section)
            .and_then(Value::as_table)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

async fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Ok(Table::new());
    }
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {}", path.display()))
}

async fn save_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(table).context("Failed to serialize settings")?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
