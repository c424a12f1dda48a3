//! On-disk manifest formats.
//!
//! Components describe themselves in `module.json`, targets in `target.json`.
//! Only the fields resolution needs are modelled; unknown fields are ignored.
//!
//! ```json
//! {
//!   "name": "app",
//!   "version": "1.0.0",
//!   "bin": "./source",
//!   "dependencies": { "dep-a": "^1.0.0", "dep-b": "owner/dep-b#v2.0.0" },
//!   "targetDependencies": { "x86-osx": { "osx-only": "*" } }
//! }
//! ```
//!
//! ```json
//! {
//!   "name": "frdm-k64f-gcc",
//!   "version": "0.1.0",
//!   "inherits": { "kinetis-gcc": "~0.2.0" },
//!   "similarTo": ["frdm-k64f", "k64f", "kinetis", "arm"]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::EmbpmError;

/// Contents of a `module.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Present for applications (the directory holding the executable's sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Dependencies that apply only when the key is in the target filter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub target_dependencies: BTreeMap<String, BTreeMap<String, String>>,
}

/// Contents of a `target.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetManifest {
    pub name: String,
    pub version: String,
    /// At most one `base-name: spec` entry
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inherits: BTreeMap<String, String>,
    #[serde(default)]
    pub similar_to: Vec<String>,
}

impl ModuleManifest {
    /// Read `module.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, EmbpmError> {
        read_json(&dir.join(crate::constants::MODULE_MANIFEST))
    }
}

impl TargetManifest {
    /// Read `target.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, EmbpmError> {
        let path = dir.join(crate::constants::TARGET_MANIFEST);
        let manifest: Self = read_json(&path)?;
        if manifest.inherits.len() > 1 {
            return Err(EmbpmError::InvalidManifest {
                path: path.display().to_string(),
                reason: format!(
                    "a target may inherit from one base target, found {}",
                    manifest.inherits.len()
                ),
            });
        }
        Ok(manifest)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, EmbpmError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EmbpmError::ManifestNotFound {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content).map_err(|e| EmbpmError::InvalidManifest {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
