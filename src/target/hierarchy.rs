//! Resolution of a target's inheritance chain.
//!
//! The walk is an explicit state machine:
//!
//! ```text
//!              found, has base                found, no base
//!   Resolving ─────────────────► Resolving   ─────────────────► Resolved
//!       │
//!       ├── not installed / fetch failed ───► MissingLink
//!       └── name seen before, bad manifest ─► Error
//! ```
//!
//! Whatever the terminal state, the targets resolved so far are returned together
//! with every error met on the way, so a caller can show a partial hierarchy and
//! report what is missing.
//!
//! With `install_missing = false` the walk only looks at the target store and never
//! touches the network. Links it could not find are reported as
//! [`EmbpmError::MissingTargetLink`] with `attempted: false`.

use std::path::Path;

use super::spec::TargetSpec;
use crate::cache::{ComponentStore, InstallRecord};
use crate::component::Target;
use crate::core::EmbpmError;
use crate::source::ComponentFetcher;
use crate::version::VersionSpec;

/// A hierarchy link that could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingTarget {
    pub name: String,
    pub requirement: VersionSpec,
    /// Whether a fetch was tried
    pub attempted: bool,
}

impl MissingTarget {
    fn to_error(&self) -> EmbpmError {
        EmbpmError::MissingTargetLink {
            name: self.name.clone(),
            requirement: self.requirement.to_string(),
            attempted: self.attempted,
        }
    }
}

/// State of a hierarchy walk.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkState {
    /// About to look up this spec
    Resolving(TargetSpec),
    /// The chain ends at a target with no base
    Resolved,
    /// The chain ends at a link that could not be resolved
    MissingLink(MissingTarget),
    /// The walk stopped on an error (cycle, unusable manifest)
    Error(String),
}

impl WalkState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Resolving(_))
    }
}

/// Data threaded through the walk.
#[derive(Debug, Default)]
struct HierarchyWalk {
    chain: Vec<Target>,
    visited: Vec<String>,
    errors: Vec<EmbpmError>,
}

/// A resolved target hierarchy: `[self, base, base-of-base, ...]`.
#[derive(Debug, Clone)]
pub struct DerivedTarget {
    pub hierarchy: Vec<Target>,
    /// Set when the chain ends at an unresolved base
    pub missing: Option<MissingTarget>,
}

/// One line of a hierarchy listing.
#[derive(Debug, Clone, Copy)]
pub enum HierarchyEntry<'a> {
    Resolved(&'a Target),
    Missing {
        name: &'a str,
        requirement: &'a VersionSpec,
    },
}

impl DerivedTarget {
    /// The requested target.
    #[must_use]
    pub fn leaf(&self) -> Option<&Target> {
        self.hierarchy.first()
    }

    /// Resolved entries in order, then the missing base if there is one.
    pub fn entries(&self) -> impl Iterator<Item = HierarchyEntry<'_>> {
        self.hierarchy.iter().map(HierarchyEntry::Resolved).chain(self.missing.iter().map(|m| {
            HierarchyEntry::Missing {
                name: &m.name,
                requirement: &m.requirement,
            }
        }))
    }

    /// The unresolved base spec at the end of the chain, if the hierarchy is
    /// incomplete.
    #[must_use]
    pub fn base_target_spec(&self) -> Option<TargetSpec> {
        self.missing.as_ref().map(|m| TargetSpec::new(m.name.clone(), m.requirement.clone()))
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_none()
    }
}

/// Result of [`TargetHierarchyResolver::get_derived_target`].
#[derive(Debug)]
pub struct HierarchyOutcome {
    /// `None` only when the requested target itself could not be resolved
    pub derived: Option<DerivedTarget>,
    pub errors: Vec<EmbpmError>,
    /// The terminal state the walk stopped in
    pub state: WalkState,
}

enum Lookup {
    Found(Target),
    NotInstalled,
    FetchFailed(EmbpmError),
}

/// Walks base-target chains against a target store, fetching missing links on
/// request.
pub struct TargetHierarchyResolver<'a, F> {
    store: &'a ComponentStore,
    fetcher: &'a F,
}

impl<'a, F: ComponentFetcher> TargetHierarchyResolver<'a, F> {
    pub fn new(store: &'a ComponentStore, fetcher: &'a F) -> Self {
        Self {
            store,
            fetcher,
        }
    }

    /// Resolve the hierarchy of `spec`.
    ///
    /// Never fails as a whole: errors are collected into the outcome next to the
    /// partial hierarchy.
    pub async fn get_derived_target(&self, spec: &TargetSpec, install_missing: bool) -> HierarchyOutcome {
        let mut walk = HierarchyWalk::default();
        let mut state = WalkState::Resolving(spec.clone());

        while let WalkState::Resolving(current) = state {
            state = self.step(&mut walk, current, install_missing).await;
        }

        tracing::debug!(
            target: "target",
            "hierarchy of {} stopped in {:?} after {} target(s)",
            spec.name,
            state,
            walk.chain.len()
        );

        let missing = match &state {
            WalkState::MissingLink(missing) => Some(missing.clone()),
            _ => None,
        };
        let derived = if walk.chain.is_empty() {
            None
        } else {
            Some(DerivedTarget {
                hierarchy: walk.chain,
                missing,
            })
        };

        HierarchyOutcome {
            derived,
            errors: walk.errors,
            state,
        }
    }

    async fn step(&self, walk: &mut HierarchyWalk, current: TargetSpec, install_missing: bool) -> WalkState {
        if walk.visited.iter().any(|name| *name == current.name) {
            let mut chain = walk.visited.clone();
            chain.push(current.name.clone());
            let error = EmbpmError::CyclicTargetChain {
                chain,
            };
            let message = error.to_string();
            walk.errors.push(error);
            return WalkState::Error(message);
        }
        walk.visited.push(current.name.clone());

        match self.find(&current, install_missing).await {
            Ok(Lookup::Found(target)) => {
                let next = target.base_spec.clone();
                tracing::trace!(target: "target", "resolved {} {}", target.name, target.version);
                walk.chain.push(target);
                match next {
                    Some(base) => WalkState::Resolving(base),
                    None => WalkState::Resolved,
                }
            }
            Ok(Lookup::NotInstalled) => record_missing(walk, current, false),
            Ok(Lookup::FetchFailed(cause)) => {
                tracing::warn!(target: "target", "could not install target {}: {cause}", current.name);
                record_missing(walk, current, true)
            }
            Err(error) => {
                let message = error.to_string();
                walk.errors.push(error);
                WalkState::Error(message)
            }
        }
    }

    async fn find(&self, spec: &TargetSpec, install_missing: bool) -> Result<Lookup, EmbpmError> {
        if let Some(entry) = self.store.lookup(&spec.name)? {
            let target = load_named(&entry.path, &spec.name)?;
            if entry.satisfies(&spec.requirement, &target.version) {
                return Ok(Lookup::Found(target));
            }
            tracing::debug!(
                target: "target",
                "installed {} {} does not satisfy {}",
                spec.name,
                entry.installed_version(&target.version),
                spec.requirement
            );
        }

        if !install_missing {
            return Ok(Lookup::NotInstalled);
        }

        let fetcher = self.fetcher;
        let materialized = self
            .store
            .materialize(&spec.name, |dest| async move {
                fetcher.fetch(&spec.name, &spec.requirement, &dest).await.map(InstallRecord::from)
            })
            .await;

        match materialized {
            Ok(entry) => load_named(&entry.path, &spec.name).map(Lookup::Found),
            Err(cause) => Ok(Lookup::FetchFailed(cause)),
        }
    }
}

fn record_missing(walk: &mut HierarchyWalk, current: TargetSpec, attempted: bool) -> WalkState {
    let missing = MissingTarget {
        name: current.name,
        requirement: current.requirement,
        attempted,
    };
    walk.errors.push(missing.to_error());
    WalkState::MissingLink(missing)
}

/// Load the target at `path`, requiring its manifest to carry `name`.
fn load_named(path: &Path, name: &str) -> Result<Target, EmbpmError> {
    let target = Target::load(path)?;
    if target.name != name {
        return Err(EmbpmError::InvalidManifest {
            path: path.display().to_string(),
            reason: format!("expected target '{name}', manifest names '{}'", target.name),
        });
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeFetcher, TargetFixture};
    use tempfile::TempDir;

    /// A project target store with `chain[i]` inheriting from `chain[i + 1]`,
    /// each linked from a developer directory.
    async fn linked_chain(temp: &TempDir, chain: &[&str], base_of_last: Option<&str>) -> ComponentStore {
        let store = ComponentStore::targets(temp.path().join("embpm_targets"));
        for (i, name) in chain.iter().enumerate() {
            let mut fixture = TargetFixture::new(name, "1.0.0");
            if let Some(base) = chain.get(i + 1).copied().or(base_of_last) {
                fixture = fixture.inherits(base, "*");
            }
            let dev = temp.path().join("dev").join(name);
            fixture.write_to(&dev).unwrap();
            store.link(name, &dev).await.unwrap();
        }
        store
    }

    fn spec(text: &str) -> TargetSpec {
        TargetSpec::parse(text).unwrap()
    }

    #[tokio::test]
    async fn test_linked_chain_resolves() {
        let temp = TempDir::new().unwrap();
        let store = linked_chain(&temp, &["board", "mcu-family", "arch"], None).await;
        let fetcher = FakeFetcher::new();

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("board,*"), false)
            .await;

        assert_eq!(outcome.state, WalkState::Resolved);
        assert!(outcome.errors.is_empty());
        let derived = outcome.derived.unwrap();
        assert_eq!(derived.hierarchy.len(), 3);
        assert!(derived.hierarchy.iter().all(|t| t.installed_linked));
        assert!(derived.is_complete());
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_base_is_reported_not_fetched() {
        let temp = TempDir::new().unwrap();
        let store = linked_chain(&temp, &["board", "mcu-family"], Some("arch")).await;
        let fetcher = FakeFetcher::new().target(TargetFixture::new("arch", "1.0.0"));

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("board,*"), false)
            .await;

        let derived = outcome.derived.unwrap();
        assert_eq!(derived.hierarchy.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        match &outcome.errors[0] {
            EmbpmError::MissingTargetLink {
                name,
                attempted,
                ..
            } => {
                assert_eq!(name, "arch");
                assert!(!attempted);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(derived.base_target_spec().unwrap().name, "arch");
        assert_eq!(derived.entries().count(), 3);
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_install_missing_fetches_base() {
        let temp = TempDir::new().unwrap();
        let store = linked_chain(&temp, &["board"], Some("arch")).await;
        let fetcher = FakeFetcher::new()
            .target(TargetFixture::new("arch", "0.9.0"))
            .target(TargetFixture::new("arch", "1.2.0"));

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("board,*"), true)
            .await;

        assert_eq!(outcome.state, WalkState::Resolved);
        let derived = outcome.derived.unwrap();
        assert_eq!(derived.hierarchy[1].name, "arch");
        assert_eq!(derived.hierarchy[1].version.to_string(), "1.2.0");
        assert!(!derived.hierarchy[1].installed_linked);
        assert_eq!(fetcher.fetches_of("arch"), 1);

        // second walk reuses the installed base
        let again = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("board,*"), true)
            .await;
        assert!(again.errors.is_empty());
        assert_eq!(fetcher.fetches_of("arch"), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_attempted_missing_link() {
        let temp = TempDir::new().unwrap();
        let store = linked_chain(&temp, &["board"], Some("nowhere")).await;
        let fetcher = FakeFetcher::new();

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("board,*"), true)
            .await;

        assert!(matches!(
            outcome.state,
            WalkState::MissingLink(MissingTarget {
                attempted: true,
                ..
            })
        ));
        assert_eq!(outcome.errors.len(), 1);
        assert!(!store.root().join("nowhere").exists());
    }

    #[tokio::test]
    async fn test_missing_requested_target() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::targets(temp.path().join("embpm_targets"));
        let fetcher = FakeFetcher::new();

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("x86-osx,*"), false)
            .await;

        assert!(outcome.derived.is_none());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = linked_chain(&temp, &["a", "b", "c"], Some("a")).await;
        let fetcher = FakeFetcher::new();

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("a,*"), true)
            .await;

        assert!(matches!(outcome.state, WalkState::Error(_)));
        assert_eq!(outcome.derived.unwrap().hierarchy.len(), 3);
        match &outcome.errors[..] {
            [EmbpmError::CyclicTargetChain {
                chain,
            }] => assert_eq!(chain, &["a", "b", "c", "a"]),
            other => panic!("unexpected errors {other:?}"),
        }
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_unsatisfying_installed_target_is_superseded() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::targets(temp.path().join("embpm_targets"));
        let fetcher = FakeFetcher::new()
            .target(TargetFixture::new("arch", "1.0.0"))
            .target(TargetFixture::new("arch", "2.0.0"));
        let resolver = TargetHierarchyResolver::new(&store, &fetcher);

        let first = resolver.get_derived_target(&spec("arch,1.0.0"), true).await;
        assert!(first.errors.is_empty());

        let display = resolver.get_derived_target(&spec("arch,^2.0.0"), false).await;
        assert!(display.derived.is_none());

        let second = resolver.get_derived_target(&spec("arch,^2.0.0"), true).await;
        assert!(second.errors.is_empty());
        assert_eq!(second.derived.unwrap().hierarchy[0].version.to_string(), "2.0.0");
        assert_eq!(fetcher.fetches_of("arch"), 2);
    }

    #[tokio::test]
    async fn test_fetched_target_name_must_match() {
        let temp = TempDir::new().unwrap();
        let store = ComponentStore::targets(temp.path().join("embpm_targets"));
        let dev = temp.path().join("dev/impostor");
        TargetFixture::new("someone-else", "1.0.0").write_to(&dev).unwrap();
        store.link("impostor", &dev).await.unwrap();
        let fetcher = FakeFetcher::new();

        let outcome = TargetHierarchyResolver::new(&store, &fetcher)
            .get_derived_target(&spec("impostor,*"), false)
            .await;
        assert!(matches!(outcome.state, WalkState::Error(_)));
        assert!(matches!(outcome.errors[..], [EmbpmError::InvalidManifest { .. }]));
    }
}
