//! In-memory model of installable units: components and targets.
//!
//! Both are loaded from a directory holding their manifest. The directory may be a
//! managed store entry or a developer link (a symlink into the store), which is
//! recorded as `installed_linked` and exempts the unit from version checks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::EmbpmError;
use crate::manifest::{ModuleManifest, TargetManifest};
use crate::target::{TargetFilter, TargetSpec};
use crate::version::{Version, VersionSpec};

/// A named requirement declared by a component.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub name: String,
    pub spec: VersionSpec,
}

/// A component loaded from a `module.json` directory.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
    /// Unconditional dependencies, sorted by name
    pub dependencies: Vec<Dependency>,
    /// Dependencies keyed by the target identifier that enables them
    pub target_dependencies: BTreeMap<String, Vec<Dependency>>,
    pub is_application: bool,
    pub installed_linked: bool,
}

impl Component {
    /// Load the component in `dir`.
    ///
    /// # Errors
    ///
    /// [`EmbpmError::ManifestNotFound`] when `dir` has no `module.json`,
    /// [`EmbpmError::InvalidManifest`] when its version or a dependency spec does not
    /// parse.
    pub fn load(dir: &Path) -> Result<Self, EmbpmError> {
        let manifest = ModuleManifest::load(dir)?;
        let manifest_path = dir.join(crate::constants::MODULE_MANIFEST);
        let invalid = |reason: String| EmbpmError::InvalidManifest {
            path: manifest_path.display().to_string(),
            reason,
        };

        let version = Version::parse(&manifest.version).map_err(|e| invalid(e.to_string()))?;
        let dependencies =
            parse_dependencies(&manifest.dependencies).map_err(|e| invalid(e.to_string()))?;
        let mut target_dependencies = BTreeMap::new();
        for (target, deps) in &manifest.target_dependencies {
            let parsed = parse_dependencies(deps).map_err(|e| invalid(e.to_string()))?;
            target_dependencies.insert(target.clone(), parsed);
        }

        Ok(Self {
            name: manifest.name,
            version,
            path: dir.to_path_buf(),
            dependencies,
            target_dependencies,
            is_application: manifest.bin.is_some(),
            installed_linked: is_link(dir),
        })
    }

    /// Dependencies that apply under `filter`: the unconditional ones, then each
    /// `targetDependencies` block whose key the filter contains.
    #[must_use]
    pub fn dependencies_for(&self, filter: &TargetFilter) -> Vec<Dependency> {
        let mut selected = self.dependencies.clone();
        for (target, deps) in &self.target_dependencies {
            if filter.matches(target) {
                for dep in deps {
                    if !selected.iter().any(|d| d.name == dep.name) {
                        selected.push(dep.clone());
                    }
                }
            }
        }
        selected
    }
}

fn parse_dependencies(raw: &BTreeMap<String, String>) -> Result<Vec<Dependency>, EmbpmError> {
    raw.iter()
        .map(|(name, spec)| {
            Ok(Dependency {
                name: name.clone(),
                spec: VersionSpec::parse(spec)?,
            })
        })
        .collect()
}

/// A build target loaded from a `target.json` directory.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
    /// The target this one inherits from, if any
    pub base_spec: Option<TargetSpec>,
    pub similar_to: Vec<String>,
    pub installed_linked: bool,
}

impl Target {
    pub fn load(dir: &Path) -> Result<Self, EmbpmError> {
        let manifest = TargetManifest::load(dir)?;
        let manifest_path = dir.join(crate::constants::TARGET_MANIFEST);
        let invalid = |reason: String| EmbpmError::InvalidManifest {
            path: manifest_path.display().to_string(),
            reason,
        };

        let version = Version::parse(&manifest.version).map_err(|e| invalid(e.to_string()))?;
        let base_spec = match manifest.inherits.iter().next() {
            Some((name, spec)) => Some(TargetSpec::new(
                name.clone(),
                VersionSpec::parse(spec).map_err(|e| invalid(e.to_string()))?,
            )),
            None => None,
        };

        Ok(Self {
            name: manifest.name,
            version,
            path: dir.to_path_buf(),
            base_spec,
            similar_to: manifest.similar_to,
            installed_linked: is_link(dir),
        })
    }

    /// The target's own name followed by its `similarTo` identifiers.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.similar_to.iter().map(String::as_str))
    }
}

fn is_link(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}
