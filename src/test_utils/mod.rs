//! Test utilities for EMBPM
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`TestGit`] builds throwaway git repositories with a fixed identity
//! - [`ModuleFixture`] / [`TargetFixture`] write `module.json` / `target.json`
//! - [`GitRepoFixture`] publishes tagged releases reachable over `file://`
//! - [`FakeFetcher`] serves releases from memory and counts fetches
//!
//! # Example
//!
//! ```rust,no_run
//! use embpm_cli::test_utils::{GitRepoFixture, ModuleFixture};
//!
//! # fn example(dir: &std::path::Path) -> anyhow::Result<()> {
//! let repo = GitRepoFixture::component(
//!     dir,
//!     &[("v0.0.1", ModuleFixture::new("testing-dummy", "0.0.1"))],
//! )?;
//! println!("locator: {}", repo.url());
//! # Ok(())
//! # }
//! ```

pub mod fake_fetcher;
pub mod fixtures;
pub mod git_helper;

pub use fake_fetcher::FakeFetcher;
pub use fixtures::{GitRepoFixture, ModuleFixture, TargetFixture};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when set, otherwise uses `level`; with neither, logging
/// stays off.
///
/// ```bash
/// RUST_LOG=embpm_cli=debug,git=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
