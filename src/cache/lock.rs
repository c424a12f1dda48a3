//! File locking for store entries.
//!
//! Every write to a store entry (materialize, link, remove) happens while holding an
//! exclusive lock on `<store>/.locks/<name>.lock`, so two processes never write the
//! same destination at once and a removed entry is never read half-deleted. The lock
//! is released when the [`CacheLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::constants::LOCKS_DIR;

/// An exclusive file lock for one store entry.
pub struct CacheLock {
    _file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquires the exclusive lock for `name` under `store_dir`.
    ///
    /// Creates `<store_dir>/.locks/` as needed. Waits for as long as another process
    /// holds the lock; the wait happens on a blocking thread so the runtime keeps
    /// running other tasks.
    ///
    /// ```rust,no_run
    /// use embpm_cli::cache::lock::CacheLock;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let lock = CacheLock::acquire(Path::new("embpm_modules"), "mbed-drivers").await?;
    /// // ... write embpm_modules/mbed-drivers ...
    /// drop(lock);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the locks directory or lock file cannot be created, or the file
    /// system does not support locking.
    pub async fn acquire(store_dir: &Path, name: &str) -> Result<Self> {
        let locks_dir = store_dir.join(LOCKS_DIR);
        tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotADirectory {
                anyhow::anyhow!(
                    "Cannot create directory: store path is not a directory ({})",
                    store_dir.display()
                )
            } else if e.kind() == std::io::ErrorKind::PermissionDenied {
                anyhow::anyhow!(
                    "Permission denied: cannot create locks directory at {}",
                    locks_dir.display()
                )
            } else {
                anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
            }
        })?;

        let lock_path = locks_dir.join(format!("{name}.lock"));
        let lock_path_clone = lock_path.clone();
        let name = name.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive().with_context(|| format!("Failed to acquire lock for: {name}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "store", "locked {}", lock_path.display());

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self._file.unlock() {
            tracing::warn!(target: "store", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
