//! Manifest and repository fixtures for tests

use anyhow::Result;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

use super::TestGit;
use crate::constants::{MODULE_MANIFEST, TARGET_MANIFEST};

/// Builder for `module.json` contents.
#[derive(Debug, Clone)]
pub struct ModuleFixture {
    name: String,
    version: String,
    application: bool,
    dependencies: Vec<(String, String)>,
    target_dependencies: Vec<(String, String, String)>,
}

impl ModuleFixture {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            application: false,
            dependencies: Vec::new(),
            target_dependencies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Mark the module as an application (adds a `bin` entry)
    pub fn application(mut self) -> Self {
        self.application = true;
        self
    }

    pub fn dependency(mut self, name: &str, spec: &str) -> Self {
        self.dependencies.push((name.to_string(), spec.to_string()));
        self
    }

    /// Add a dependency that only applies when `target` matches the target filter
    pub fn target_dependency(mut self, target: &str, name: &str, spec: &str) -> Self {
        self.target_dependencies.push((target.to_string(), name.to_string(), spec.to_string()));
        self
    }

    pub fn to_json(&self) -> String {
        let mut deps = Map::new();
        for (name, spec) in &self.dependencies {
            deps.insert(name.clone(), Value::String(spec.clone()));
        }
        let mut target_deps = Map::new();
        for (target, name, spec) in &self.target_dependencies {
            let entry = target_deps.entry(target.clone()).or_insert_with(|| json!({}));
            if let Value::Object(map) = entry {
                map.insert(name.clone(), Value::String(spec.clone()));
            }
        }
        let mut manifest = json!({
            "name": self.name,
            "version": self.version,
            "dependencies": deps,
        });
        if !target_deps.is_empty() {
            manifest["targetDependencies"] = Value::Object(target_deps);
        }
        if self.application {
            manifest["bin"] = json!("./source");
        }
        serde_json::to_string_pretty(&manifest).unwrap_or_default()
    }

    /// Write `module.json` into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MODULE_MANIFEST);
        std::fs::write(&path, self.to_json())?;
        Ok(path)
    }
}

/// Builder for `target.json` contents.
#[derive(Debug, Clone)]
pub struct TargetFixture {
    name: String,
    version: String,
    inherits: Option<(String, String)>,
    similar_to: Vec<String>,
}

impl TargetFixture {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            inherits: None,
            similar_to: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn inherits(mut self, base: &str, spec: &str) -> Self {
        self.inherits = Some((base.to_string(), spec.to_string()));
        self
    }

    pub fn similar_to(mut self, identifier: &str) -> Self {
        self.similar_to.push(identifier.to_string());
        self
    }

    pub fn to_json(&self) -> String {
        let mut manifest = json!({
            "name": self.name,
            "version": self.version,
            "similarTo": self.similar_to,
        });
        if let Some((base, spec)) = &self.inherits {
            manifest["inherits"] = json!({ base.clone(): spec.clone() });
        }
        serde_json::to_string_pretty(&manifest).unwrap_or_default()
    }

    /// Write `target.json` into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(TARGET_MANIFEST);
        std::fs::write(&path, self.to_json())?;
        Ok(path)
    }
}

/// A git repository publishing successive tagged releases of one manifest.
pub struct GitRepoFixture {
    pub git: TestGit,
}

impl GitRepoFixture {
    /// Create a repository at `dir` with one commit and tag per `(tag, manifest)`.
    ///
    /// `manifest_file` is `module.json` or `target.json`.
    pub fn publish(dir: &Path, manifest_file: &str, releases: &[(&str, String)]) -> Result<Self> {
        let git = TestGit::new(dir);
        git.init()?;
        for (tag, content) in releases {
            git.commit_file(manifest_file, content, &format!("Release {tag}"))?;
            git.tag(tag)?;
        }
        Ok(Self {
            git,
        })
    }

    /// Publish a component with one release per `(tag, fixture)`.
    pub fn component(dir: &Path, releases: &[(&str, ModuleFixture)]) -> Result<Self> {
        let releases: Vec<(&str, String)> =
            releases.iter().map(|(tag, fixture)| (*tag, fixture.to_json())).collect();
        Self::publish(dir, MODULE_MANIFEST, &releases)
    }

    /// Publish a target with one release per `(tag, fixture)`.
    pub fn target(dir: &Path, releases: &[(&str, TargetFixture)]) -> Result<Self> {
        let releases: Vec<(&str, String)> =
            releases.iter().map(|(tag, fixture)| (*tag, fixture.to_json())).collect();
        Self::publish(dir, TARGET_MANIFEST, &releases)
    }

    pub fn url(&self) -> String {
        self.git.file_url()
    }
}
