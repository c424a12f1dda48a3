//! An in-memory [`ComponentFetcher`] that counts fetches.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ModuleFixture, TargetFixture};
use crate::constants::{MODULE_MANIFEST, TARGET_MANIFEST};
use crate::core::EmbpmError;
use crate::source::{ComponentFetcher, FetchedComponent};
use crate::version::{Version, VersionSpec};

struct Release {
    version: Version,
    manifest_file: &'static str,
    content: String,
}

/// Serves published releases from memory and records every fetch.
///
/// ```rust,no_run
/// use embpm_cli::test_utils::{FakeFetcher, ModuleFixture};
///
/// let fetcher = FakeFetcher::new()
///     .component(ModuleFixture::new("dep-a", "1.0.0"))
///     .component(ModuleFixture::new("dep-a", "1.1.0"));
/// assert_eq!(fetcher.fetch_count(), 0);
/// ```
#[derive(Default)]
pub struct FakeFetcher {
    releases: HashMap<String, Vec<Release>>,
    fetches: Mutex<Vec<String>>,
    total: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a component release (name and version come from the fixture).
    pub fn component(mut self, fixture: ModuleFixture) -> Self {
        self.publish(fixture.name(), fixture.version(), MODULE_MANIFEST, fixture.to_json());
        self
    }

    /// Publish a target release.
    pub fn target(mut self, fixture: TargetFixture) -> Self {
        self.publish(fixture.name(), fixture.version(), TARGET_MANIFEST, fixture.to_json());
        self
    }

    fn publish(&mut self, name: &str, version: &str, manifest_file: &'static str, content: String) {
        let version = Version::parse(version).unwrap_or_else(|_| Version::from_ref(version));
        self.releases.entry(name.to_string()).or_default().push(Release {
            version,
            manifest_file,
            content,
        });
    }

    /// Total number of fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of fetches of `name`.
    pub fn fetches_of(&self, name: &str) -> usize {
        self.fetches.lock().map(|f| f.iter().filter(|n| *n == name).count()).unwrap_or(0)
    }
}

impl ComponentFetcher for FakeFetcher {
    async fn fetch(
        &self,
        name: &str,
        spec: &VersionSpec,
        dest: &Path,
    ) -> Result<FetchedComponent, EmbpmError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push(name.to_string());
        }

        let releases = self.releases.get(name).ok_or_else(|| EmbpmError::SourceNotFound {
            name: name.to_string(),
        })?;
        let available: Vec<Version> = releases.iter().map(|r| r.version.clone()).collect();

        let effective = match spec.locator() {
            Some(locator) => match locator.fragment() {
                Some(fragment) => VersionSpec::parse(fragment).unwrap_or(VersionSpec::Any),
                None => VersionSpec::Any,
            },
            None => spec.clone(),
        };
        let selected = effective.select(&available).ok_or_else(|| EmbpmError::NoMatchingVersion {
            name: name.to_string(),
            requirement: spec.to_string(),
            available: available.iter().map(ToString::to_string).collect(),
        })?;

        let release = releases
            .iter()
            .find(|r| r.version == selected)
            .ok_or_else(|| EmbpmError::Other {
                message: format!("no release {selected} of {name}"),
            })?;
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join(release.manifest_file), &release.content)?;

        Ok(FetchedComponent {
            version: selected,
            source: spec.locator().map_or_else(|| format!("fake/{name}"), ToString::to_string),
            commit: None,
        })
    }
}
