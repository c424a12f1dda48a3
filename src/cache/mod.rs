//! Managed directories of installed components and targets.
//!
//! A [`ComponentStore`] is a directory whose children are installed entries named by
//! component (or target) name:
//!
//! ```text
//! embpm_modules/
//! ├── .locks/                 per-name lock files (see [`lock::CacheLock`])
//! ├── .staging/               in-progress fetches, never read as entries
//! ├── mbed-drivers/           managed entry
//! │   ├── module.json
//! │   └── .embpm-install.json install record: version, source, commit
//! └── my-lib -> ~/dev/my-lib  developer link
//! ```
//!
//! # Write protocol
//!
//! [`ComponentStore::materialize`] takes the in-process lock for the name (a
//! `tokio::sync::Mutex` from a shared `DashMap`, so tasks of this process queue up
//! cheaply) and then the cross-process [`CacheLock`]. The new content is written into
//! a fresh directory under `.staging/` and only renamed into place once complete, so
//! a reader never sees a half-fetched entry and a failed fetch leaves the previous
//! entry untouched. Linked entries are never replaced.

pub mod lock;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::constants::{INSTALL_RECORD, MODULE_MANIFEST, STAGING_DIR, TARGET_MANIFEST};
use crate::core::EmbpmError;
use crate::version::{Version, VersionSpec};
use lock::CacheLock;

/// Written into each managed entry after a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Installed version (a semantic version or a ref)
    pub version: String,
    /// Locator the entry was fetched from
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl InstallRecord {
    /// The recorded version; unparseable versions are refs.
    #[must_use]
    pub fn version(&self) -> Version {
        Version::parse(&self.version).unwrap_or_else(|_| Version::from_ref(&self.version))
    }
}

/// An entry found in a store.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub name: String,
    pub path: PathBuf,
    /// The entry is a symlink to a developer directory
    pub linked: bool,
    /// `None` for linked entries and for entries not installed by EMBPM
    pub record: Option<InstallRecord>,
}

impl StoreEntry {
    /// Installed version: the recorded one, else `declared` (the manifest's).
    #[must_use]
    pub fn installed_version(&self, declared: &Version) -> Version {
        self.record.as_ref().map_or_else(|| declared.clone(), InstallRecord::version)
    }

    /// Whether this entry can stand in for `spec` without fetching.
    ///
    /// Linked entries always can. A remote pin is satisfied only by content fetched
    /// from the same locator.
    #[must_use]
    pub fn satisfies(&self, spec: &VersionSpec, declared: &Version) -> bool {
        if self.linked {
            return true;
        }
        match spec.locator() {
            Some(locator) => {
                self.record.as_ref().is_some_and(|record| record.source == locator.to_string())
            }
            None => spec.matches(&self.installed_version(declared)),
        }
    }
}

/// A directory of installed entries, keyed by name.
///
/// Cloning is cheap and clones share the in-process entry locks.
#[derive(Debug, Clone)]
pub struct ComponentStore {
    root: PathBuf,
    manifest_file: &'static str,
    entry_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ComponentStore {
    pub fn new(root: impl Into<PathBuf>, manifest_file: &'static str) -> Self {
        Self {
            root: root.into(),
            manifest_file,
            entry_locks: Arc::new(DashMap::new()),
        }
    }

    /// A store of components (`module.json` entries).
    pub fn modules(root: impl Into<PathBuf>) -> Self {
        Self::new(root, MODULE_MANIFEST)
    }

    /// A store of targets (`target.json` entries).
    pub fn targets(root: impl Into<PathBuf>) -> Self {
        Self::new(root, TARGET_MANIFEST)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Find the installed entry for `name`.
    ///
    /// Returns `Ok(None)` when nothing usable is installed: no directory, a
    /// directory without a manifest, or a dangling link.
    pub fn lookup(&self, name: &str) -> Result<Option<StoreEntry>, EmbpmError> {
        let path = self.path_for(name);
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let linked = metadata.file_type().is_symlink();
        if !path.join(self.manifest_file).is_file() {
            tracing::debug!(target: "store", "{} has no {}, not installed", path.display(), self.manifest_file);
            return Ok(None);
        }

        let record = if linked {
            None
        } else {
            read_record(&path)
        };

        Ok(Some(StoreEntry {
            name: name.to_string(),
            path,
            linked,
            record,
        }))
    }

    /// Install `name` by running `populate` against a staging directory.
    ///
    /// `populate` receives a path that does not exist yet and must create it with the
    /// entry's content (including the manifest). Its [`InstallRecord`] is written
    /// into the entry, which then replaces any previous managed entry.
    ///
    /// # Errors
    ///
    /// Returns the error from `populate` (the staging directory is removed and the
    /// previous entry is left as it was), [`EmbpmError::ManifestNotFound`] when
    /// `populate` produced no manifest, or an error when `name` is a live link.
    pub async fn materialize<F, Fut>(&self, name: &str, populate: F) -> Result<StoreEntry, EmbpmError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<InstallRecord, EmbpmError>>,
    {
        let _guard = self.lock_entry(name).await?;

        let staging_root = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging_root).await?;
        let prefix = format!("{name}-");
        let staging = tempfile::Builder::new().prefix(&prefix).tempdir_in(&staging_root)?;
        let staged = staging.path().join(name);

        let record = populate(staged.clone()).await?;

        if !staged.join(self.manifest_file).is_file() {
            return Err(EmbpmError::ManifestNotFound {
                path: format!("{} ({})", record.source, self.manifest_file),
            });
        }
        let record_json = serde_json::to_string_pretty(&record).map_err(|e| EmbpmError::Other {
            message: format!("Failed to serialize install record: {e}"),
        })?;
        tokio::fs::write(staged.join(INSTALL_RECORD), record_json).await?;

        let final_path = self.path_for(name);
        self.clear_entry(name, &final_path).await?;
        tokio::fs::rename(&staged, &final_path).await?;
        drop(staging);

        tracing::debug!(
            target: "store",
            "installed {name} {} into {}",
            record.version,
            final_path.display()
        );

        Ok(StoreEntry {
            name: name.to_string(),
            path: final_path,
            linked: false,
            record: Some(record),
        })
    }

    /// Make `name` a link to the developer directory `source_dir`.
    ///
    /// Replaces whatever entry was there before.
    pub async fn link(&self, name: &str, source_dir: &Path) -> Result<StoreEntry, EmbpmError> {
        let _guard = self.lock_entry(name).await?;
        let link_path = self.path_for(name);

        match tokio::fs::symlink_metadata(&link_path).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                tokio::fs::remove_file(&link_path).await?;
            }
            Ok(_) => tokio::fs::remove_dir_all(&link_path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        create_dir_link(source_dir, &link_path)?;
        tracing::info!(target: "store", "linked {} -> {}", link_path.display(), source_dir.display());

        Ok(StoreEntry {
            name: name.to_string(),
            path: link_path,
            linked: true,
            record: None,
        })
    }

    /// Remove the entry for `name`. A link is removed without touching its target.
    ///
    /// Returns whether anything was removed.
    pub async fn remove(&self, name: &str) -> Result<bool, EmbpmError> {
        let _guard = self.lock_entry(name).await?;
        let path = self.path_for(name);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                tokio::fs::remove_file(&path).await?;
                Ok(true)
            }
            Ok(_) => {
                tokio::fs::remove_dir_all(&path).await?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn lock_entry(&self, name: &str) -> Result<(OwnedMutexGuard<()>, CacheLock), EmbpmError> {
        let mutex = self
            .entry_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        let file_lock = CacheLock::acquire(&self.root, name).await.map_err(|e| EmbpmError::Other {
            message: format!("{e:#}"),
        })?;
        Ok((guard, file_lock))
    }

    /// Remove a superseded managed entry (or a dangling link) before replacing it.
    async fn clear_entry(&self, name: &str, path: &Path) -> Result<(), EmbpmError> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                if tokio::fs::metadata(path).await.is_ok() {
                    return Err(EmbpmError::Other {
                        message: format!(
                            "'{name}' is linked to a development directory; refusing to replace it"
                        ),
                    });
                }
                tokio::fs::remove_file(path).await?;
            }
            Ok(_) => {
                tracing::debug!(target: "store", "superseding {}", path.display());
                tokio::fs::remove_dir_all(path).await?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

fn read_record(entry: &Path) -> Option<InstallRecord> {
    let content = std::fs::read_to_string(entry.join(INSTALL_RECORD)).ok()?;
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(target: "store", "ignoring unreadable install record in {}: {e}", entry.display());
            None
        }
    }
}

#[cfg(unix)]
fn create_dir_link(source: &Path, link: &Path) -> std::io::Result<()> {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn create_dir_link(source: &Path, link: &Path) -> std::io::Result<()> {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::os::windows::fs::symlink_dir(source, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ModuleFixture;
    use tempfile::TempDir;

    fn record(version: &str) -> InstallRecord {
        InstallRecord {
            version: version.to_string(),
            source: "owner/dummy".to_string(),
            commit: None,
        }
    }

    async fn install(store: &ComponentStore, name: &str, version: &str) -> StoreEntry {
        let (name_owned, version_owned) = (name.to_string(), version.to_string());
        store
            .materialize(name, |dest| async move {
                ModuleFixture::new(&name_owned, &version_owned).write_to(&dest).unwrap();
                Ok(record(&version_owned))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_absent() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::modules(temp.path());
        assert!(store.lookup("nothing").unwrap().is_none());

        std::fs::create_dir_all(temp.path().join("empty")).unwrap();
        assert!(store.lookup("empty").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_materialize_writes_record() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::modules(temp.path());
        install(&store, "dummy", "0.0.1").await;

        let entry = store.lookup("dummy").unwrap().unwrap();
        assert!(!entry.linked);
        assert_eq!(entry.record.unwrap().version(), Version::parse("0.0.1").unwrap());
        assert_eq!(std::fs::read_dir(temp.path().join(".staging")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_populate_keeps_previous_entry() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::modules(temp.path());
        install(&store, "dummy", "0.0.1").await;

        let result = store
            .materialize("dummy", |dest| async move {
                std::fs::create_dir_all(&dest).unwrap();
                std::fs::write(dest.join("partial"), "x").unwrap();
                Err(EmbpmError::RemoteFetchError {
                    url: "file:///nowhere".to_string(),
                    reason: "connection reset".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(EmbpmError::RemoteFetchError { .. })));
        assert_eq!(std::fs::read_dir(temp.path().join(".staging")).unwrap().count(), 0);
        let entry = store.lookup("dummy").unwrap().unwrap();
        assert_eq!(entry.record.unwrap().version, "0.0.1");
    }

    #[test]
    fn test_entry_satisfies() {
        let entry = StoreEntry {
            name: "dummy".to_string(),
            path: PathBuf::from("dummy"),
            linked: false,
            record: Some(record("0.0.2")),
        };
        let declared = Version::parse("0.0.1").unwrap();
        assert!(entry.satisfies(&VersionSpec::parse("^0.0.2").unwrap(), &declared));
        assert!(!entry.satisfies(&VersionSpec::parse("0.0.1").unwrap(), &declared));
        assert!(entry.satisfies(&VersionSpec::parse("owner/dummy").unwrap(), &declared));
        assert!(!entry.satisfies(&VersionSpec::parse("other/dummy").unwrap(), &declared));

        let linked = StoreEntry {
            linked: true,
            record: None,
            ..entry
        };
        assert!(linked.satisfies(&VersionSpec::parse("9.9.9").unwrap(), &declared));
    }

    #[tokio::test]
    async fn test_supersede() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::modules(temp.path());
        install(&store, "dummy", "0.0.1").await;
        install(&store, "dummy", "0.0.2").await;

        let entry = store.lookup("dummy").unwrap().unwrap();
        assert_eq!(entry.record.unwrap().version, "0.0.2");
    }

    #[tokio::test]
    async fn test_missing_manifest_rejected() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::modules(temp.path());
        let result = store
            .materialize("dummy", |dest| async move {
                std::fs::create_dir_all(&dest).unwrap();
                Ok(record("0.0.1"))
            })
            .await;
        assert!(matches!(result, Err(EmbpmError::ManifestNotFound { .. })));
        assert!(store.lookup("dummy").unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_linked_entry_never_replaced() {
        let temp = TempDir::new().unwrap();
        let dev = temp.path().join("dev/dummy");
        ModuleFixture::new("dummy", "9.9.9").write_to(&dev).unwrap();

        let store = ComponentStore::modules(temp.path().join("store"));
        store.link("dummy", &dev).await.unwrap();

        let entry = store.lookup("dummy").unwrap().unwrap();
        assert!(entry.linked);
        assert!(entry.record.is_none());

        let result = store
            .materialize("dummy", |dest| async move {
                ModuleFixture::new("dummy", "0.0.1").write_to(&dest).unwrap();
                Ok(record("0.0.1"))
            })
            .await;
        assert!(result.is_err());
        assert!(dev.join("module.json").exists());

        assert!(store.remove("dummy").await.unwrap());
        assert!(dev.join("module.json").exists());
        assert!(!store.remove("dummy").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_materialize_is_serialized() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let temp = TempDir::new().unwrap();
        let store = ComponentStore::modules(temp.path());
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let tasks = (0..4).map(|i| {
            let store = store.clone();
            let active = active.clone();
            let overlap = overlap.clone();
            async move {
                store
                    .materialize("shared", |dest| async move {
                        if active.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        ModuleFixture::new("shared", &format!("0.0.{i}")).write_to(&dest).unwrap();
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(record(&format!("0.0.{i}")))
                    })
                    .await
                    .unwrap();
            }
        });
        futures::future::join_all(tasks).await;

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert!(store.lookup("shared").unwrap().is_some());
    }
}
