//! Remote component sources and the fetcher the installer drives.
//!
//! A [`RemoteComponentSource`] is a named component or target backed by a git
//! repository. Cloning it produces a [`WorkingCopy`], an exclusively owned checkout
//! used to enumerate versions (tags) and to check one of them out.
//!
//! [`ComponentFetcher`] is the seam between resolution and the network: the
//! installer and the target resolver only ever ask a fetcher to put a component
//! satisfying a [`VersionSpec`] into a directory. [`GitFetcher`] is the production
//! implementation; tests substitute counting fakes.
//!
//! # Example
//!
//! ```rust,no_run
//! use embpm_cli::source::RemoteComponentSource;
//!
//! # async fn example(cache: &std::path::Path) -> Result<(), embpm_cli::core::EmbpmError> {
//! let source = RemoteComponentSource::create_from_name_and_spec(
//!     "git@github.com:autopulated/testing-dummy.git#0.0.1",
//!     "testing-dummy",
//! )?;
//! let mut working = source.clone(cache).await?;
//! let available = working.available_versions().await?;
//! let selected = source.version_spec().select(&available);
//! println!("{selected:?}");
//! working.remove().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::InstallRecord;
use crate::config::{SOURCES_SECTION, SettingsStore};
use crate::constants::DEFAULT_BRANCH_REF;
use crate::core::EmbpmError;
use crate::git::GitRepo;
use crate::locator::Locator;
use crate::version::{Version, VersionSpec};

/// A component or target reachable through a repository locator.
#[derive(Debug, Clone)]
pub struct RemoteComponentSource {
    name: String,
    locator: Locator,
    /// Deadline for each network operation; `None` uses the git defaults
    timeout: Option<Duration>,
}

impl RemoteComponentSource {
    /// Parse `repository-address[#fragment]` for the component `name`.
    ///
    /// # Errors
    ///
    /// [`EmbpmError::ParseError`] when `locator` is not a repository reference.
    pub fn create_from_name_and_spec(locator: &str, name: &str) -> Result<Self, EmbpmError> {
        Ok(Self {
            name: name.to_string(),
            locator: Locator::parse(locator)?,
            timeout: None,
        })
    }

    /// Bound clones and tag fetches of this source by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.locator.clone_url()
    }

    /// The constraint carried by the locator's fragment.
    ///
    /// No fragment means any version. A fragment that is not a version spec
    /// (`#main`, `#a1b2c3d`) is a literal ref, returned as a pin to this locator so
    /// selection resolves to that ref.
    #[must_use]
    pub fn version_spec(&self) -> VersionSpec {
        match self.locator.fragment() {
            None => VersionSpec::Any,
            Some(fragment) => match VersionSpec::parse(fragment) {
                Ok(spec) if !spec.is_pin() => spec,
                _ => VersionSpec::RemotePin(self.locator.clone()),
            },
        }
    }

    /// Clone into a fresh, uniquely named directory under `<cache_dir>/working`.
    pub async fn clone(&self, cache_dir: &Path) -> Result<WorkingCopy, EmbpmError> {
        let directory = cache_dir.join("working").join(format!(
            "{}-{}",
            self.locator.address().project_name(),
            uuid::Uuid::new_v4().simple()
        ));
        if let Some(parent) = directory.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.clone_into(&directory).await
    }

    /// Clone into `dest`, which must not exist yet.
    ///
    /// On failure nothing is left at `dest`.
    pub async fn clone_into(&self, dest: &Path) -> Result<WorkingCopy, EmbpmError> {
        let url = self.url();
        tracing::debug!(target: "source", "cloning {} ({url}) into {}", self.name, dest.display());

        match GitRepo::clone_with_timeout(&url, dest, self.timeout).await {
            Ok(repo) => Ok(WorkingCopy {
                directory: dest.to_path_buf(),
                repo,
                url,
                tags: HashMap::new(),
            }),
            Err(e) => {
                if tokio::fs::symlink_metadata(dest).await.is_ok() {
                    if let Err(cleanup) = tokio::fs::remove_dir_all(dest).await {
                        tracing::warn!(
                            target: "source",
                            "failed to remove partial clone {}: {cleanup}",
                            dest.display()
                        );
                    }
                }
                Err(EmbpmError::remote(&url, &e))
            }
        }
    }
}

/// A checkout of a component repository, owned by whoever cloned it.
#[derive(Debug)]
pub struct WorkingCopy {
    directory: PathBuf,
    repo: GitRepo,
    url: String,
    /// Tag that produced each version, filled by `available_versions`
    tags: HashMap<Version, String>,
}

impl WorkingCopy {
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Versions published as tags on the remote, ascending.
    ///
    /// Tags are refreshed from `origin` first; tags that are not versions are
    /// skipped.
    pub async fn available_versions(&mut self) -> Result<Vec<Version>, EmbpmError> {
        self.repo.fetch_tags().await.map_err(|e| EmbpmError::remote(&self.url, &e))?;
        let tags = self.repo.list_tags().await.map_err(|e| EmbpmError::remote(&self.url, &e))?;

        self.tags.clear();
        for tag in tags {
            match Version::from_tag(&tag) {
                Some(version) => {
                    self.tags.entry(version).or_insert(tag);
                }
                None => tracing::trace!(target: "source", "skipping non-version tag {tag}"),
            }
        }

        let mut versions: Vec<Version> = self.tags.keys().cloned().collect();
        versions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(versions)
    }

    /// Check out `version`: the tag that produced it, or a literal ref.
    pub async fn checkout(&self, version: &Version) -> Result<(), EmbpmError> {
        let reference = match version {
            Version::Ref(reference) if reference == DEFAULT_BRANCH_REF => return Ok(()),
            Version::Ref(reference) => reference.clone(),
            Version::Semantic(_) => {
                self.tags.get(version).cloned().unwrap_or_else(|| version.to_string())
            }
        };
        self.repo.checkout(&reference).await.map_err(|e| EmbpmError::remote(&self.url, &e))
    }

    /// SHA of the checked out commit.
    pub async fn commit(&self) -> Result<String, EmbpmError> {
        self.repo.current_commit().await.map_err(|e| EmbpmError::remote(&self.url, &e))
    }

    /// Delete the working copy from disk.
    pub async fn remove(self) -> Result<(), EmbpmError> {
        tokio::fs::remove_dir_all(&self.directory).await?;
        Ok(())
    }
}

/// What a fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedComponent {
    pub version: Version,
    /// Locator the content came from
    pub source: String,
    pub commit: Option<String>,
}

impl From<FetchedComponent> for InstallRecord {
    fn from(fetched: FetchedComponent) -> Self {
        Self {
            version: fetched.version.to_string(),
            source: fetched.source,
            commit: fetched.commit,
        }
    }
}

/// Places a version of a named component (or target) into a directory.
pub trait ComponentFetcher: Send + Sync {
    /// Fetch the version of `name` selected by `spec` into `dest`, which does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// [`EmbpmError::SourceNotFound`], [`EmbpmError::RemoteFetchError`] or
    /// [`EmbpmError::NoMatchingVersion`]. On error `dest` must not look like a
    /// complete fetch; the caller discards it.
    fn fetch(
        &self,
        name: &str,
        spec: &VersionSpec,
        dest: &Path,
    ) -> impl Future<Output = Result<FetchedComponent, EmbpmError>> + Send;
}

/// Fetches through `git`, locating plain names through the `[sources]` table.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher {
    sources: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl GitFetcher {
    #[must_use]
    pub fn new(sources: BTreeMap<String, String>) -> Self {
        Self {
            sources,
            timeout: None,
        }
    }

    /// Deadline applied to every clone and tag fetch.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use the effective `[sources]` table of `settings`.
    pub fn from_settings(settings: &dyn SettingsStore) -> Self {
        Self::new(settings.merged_section(SOURCES_SECTION))
    }

    /// The source a request resolves to: the pin's own locator, else the configured
    /// source for `name`.
    pub fn locate(&self, name: &str, spec: &VersionSpec) -> Result<RemoteComponentSource, EmbpmError> {
        let source = match (spec.locator(), self.sources.get(name)) {
            (Some(locator), _) => RemoteComponentSource::create_from_name_and_spec(&locator.to_string(), name)?,
            (None, Some(locator)) => RemoteComponentSource::create_from_name_and_spec(locator, name)?,
            (None, None) => {
                return Err(EmbpmError::SourceNotFound {
                    name: name.to_string(),
                });
            }
        };
        Ok(source.with_timeout(self.timeout))
    }
}

impl ComponentFetcher for GitFetcher {
    async fn fetch(
        &self,
        name: &str,
        spec: &VersionSpec,
        dest: &Path,
    ) -> Result<FetchedComponent, EmbpmError> {
        crate::git::ensure_git_available()?;
        let source = self.locate(name, spec)?;
        let mut working = source.clone_into(dest).await?;

        // a pin's fragment may itself be a version spec (`#^1.0.0`) to select from tags
        let effective = if spec.is_pin() {
            source.version_spec()
        } else {
            spec.clone()
        };

        let version = if effective.is_pin() {
            effective.select(&[]).unwrap_or_else(|| Version::from_ref(DEFAULT_BRANCH_REF))
        } else {
            let available = working.available_versions().await?;
            match effective.select(&available) {
                Some(version) => version,
                None if available.is_empty() && effective == VersionSpec::Any => {
                    tracing::debug!(target: "source", "{name} has no version tags, using {DEFAULT_BRANCH_REF}");
                    Version::from_ref(DEFAULT_BRANCH_REF)
                }
                None => {
                    return Err(EmbpmError::NoMatchingVersion {
                        name: name.to_string(),
                        requirement: spec.to_string(),
                        available: available.iter().map(ToString::to_string).collect(),
                    });
                }
            }
        };

        working.checkout(&version).await?;
        let commit = working.commit().await.ok();
        tracing::info!(target: "source", "fetched {name} {version} from {}", source.locator());

        Ok(FetchedComponent {
            version,
            source: source.locator().to_string(),
            commit,
        })
    }
}
