//! Shared helpers for the integration suite

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use embpm_cli::config::FileSettings;

/// A project directory with its own isolated EMBPM home.
pub struct TestProject {
    _temp_dir: TempDir,
    project_dir: PathBuf,
    home_dir: PathBuf,
    sources_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("project");
        let home_dir = temp_dir.path().join("embpm-home");
        let sources_dir = temp_dir.path().join("sources");

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&home_dir)?;
        fs::create_dir_all(&sources_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
            home_dir,
            sources_dir,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    pub fn home_path(&self) -> &Path {
        &self.home_dir
    }

    /// Directory for repositories published by the test
    pub fn sources_path(&self) -> &Path {
        &self.sources_dir
    }

    pub fn local_config_path(&self) -> PathBuf {
        embpm_cli::config::local_config_path(&self.project_dir)
    }

    pub fn global_config_path(&self) -> PathBuf {
        self.home_dir.join("config.toml")
    }

    /// Write a global settings file.
    pub fn write_global_config(&self, content: &str) -> Result<()> {
        fs::write(self.global_config_path(), content)
            .with_context(|| format!("Failed to write {}", self.global_config_path().display()))
    }

    /// Load both settings files as the binary would see them.
    pub async fn settings(&self) -> Result<FileSettings> {
        FileSettings::load(Some(self.local_config_path()), Some(self.global_config_path())).await
    }

    /// An `embpm` command running in the project directory against the isolated home.
    pub fn embpm(&self) -> Command {
        let mut cmd = Command::cargo_bin("embpm").expect("embpm binary is built for integration tests");
        cmd.current_dir(&self.project_dir)
            .env("EMBPM_HOME", &self.home_dir)
            .env("EMBPM_CONFIG", self.global_config_path())
            .env_remove("EMBPM_GIT_TIMEOUT")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}
