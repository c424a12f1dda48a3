use anyhow::Result;
use std::collections::BTreeMap;
use tempfile::TempDir;

use embpm_cli::cache::ComponentStore;
use embpm_cli::core::EmbpmError;
use embpm_cli::source::GitFetcher;
use embpm_cli::target::{HierarchyEntry, TargetFilter, TargetHierarchyResolver, TargetSpec, WalkState};
use embpm_cli::test_utils::{GitRepoFixture, TargetFixture};

/// Publish `frdm-k64f-gcc -> kinetis-gcc -> mbed-gcc` and return a fetcher for it.
fn publish_chain(temp: &TempDir) -> Result<GitFetcher> {
    let sources = temp.path().join("sources");
    let leaf = GitRepoFixture::target(
        &sources.join("target-frdm-k64f-gcc"),
        &[
            ("v0.1.0", TargetFixture::new("frdm-k64f-gcc", "0.1.0").inherits("kinetis-gcc", "^1.0.0")),
            (
                "v0.2.0",
                TargetFixture::new("frdm-k64f-gcc", "0.2.0").inherits("kinetis-gcc", "^1.0.0").similar_to("k64f"),
            ),
        ],
    )?;
    let middle = GitRepoFixture::target(
        &sources.join("target-kinetis-gcc"),
        &[
            ("v1.0.0", TargetFixture::new("kinetis-gcc", "1.0.0").inherits("mbed-gcc", "*")),
            ("v2.0.0", TargetFixture::new("kinetis-gcc", "2.0.0").inherits("mbed-gcc", "*")),
        ],
    )?;
    let root = GitRepoFixture::target(
        &sources.join("target-mbed-gcc"),
        &[("v0.5.0", TargetFixture::new("mbed-gcc", "0.5.0").similar_to("gcc"))],
    )?;

    Ok(GitFetcher::new(BTreeMap::from([
        ("frdm-k64f-gcc".to_string(), leaf.url()),
        ("kinetis-gcc".to_string(), middle.url()),
        ("mbed-gcc".to_string(), root.url()),
    ])))
}

#[tokio::test]
async fn test_install_missing_fetches_whole_chain() -> Result<()> {
    let temp = TempDir::new()?;
    let fetcher = publish_chain(&temp)?;
    let store = ComponentStore::targets(temp.path().join("project/embpm_targets"));
    let resolver = TargetHierarchyResolver::new(&store, &fetcher);
    let spec = TargetSpec::parse("frdm-k64f-gcc,*")?;

    // nothing installed: display mode reports the requested target as unattempted
    let before = resolver.get_derived_target(&spec, false).await;
    assert!(before.derived.is_none());
    assert!(matches!(
        before.errors.as_slice(),
        [EmbpmError::MissingTargetLink {
            attempted: false,
            ..
        }]
    ));

    let outcome = resolver.get_derived_target(&spec, true).await;
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.state, WalkState::Resolved);

    let derived = outcome.derived.expect("hierarchy");
    let lines: Vec<String> = derived
        .entries()
        .map(|entry| match entry {
            HierarchyEntry::Resolved(target) => format!("{} {}", target.name, target.version),
            HierarchyEntry::Missing {
                name,
                ..
            } => format!("{name} missing"),
        })
        .collect();
    assert_eq!(lines, vec!["frdm-k64f-gcc 0.2.0", "kinetis-gcc 1.0.0", "mbed-gcc 0.5.0"]);

    let filter = TargetFilter::from_derived(&derived);
    for identifier in ["frdm-k64f-gcc", "k64f", "kinetis-gcc", "mbed-gcc", "gcc"] {
        assert!(filter.matches(identifier), "{identifier}");
    }

    // installed now: display mode resolves the same chain without a fetcher
    let offline = TargetHierarchyResolver::new(&store, &GitFetcher::default()).get_derived_target(&spec, false).await;
    assert!(offline.errors.is_empty(), "{:?}", offline.errors);
    assert_eq!(offline.derived.map(|d| d.hierarchy.len()), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_partially_installed_chain_reports_missing_base() -> Result<()> {
    let temp = TempDir::new()?;
    let fetcher = publish_chain(&temp)?;
    let store = ComponentStore::targets(temp.path().join("project/embpm_targets"));
    let spec = TargetSpec::parse("frdm-k64f-gcc,*")?;
    TargetHierarchyResolver::new(&store, &fetcher).get_derived_target(&spec, true).await;

    assert!(store.remove("mbed-gcc").await?);

    let outcome = TargetHierarchyResolver::new(&store, &fetcher).get_derived_target(&spec, false).await;
    let derived = outcome.derived.expect("partial hierarchy");
    assert_eq!(derived.hierarchy.len(), 2);
    assert_eq!(derived.base_target_spec().map(|s| s.name), Some("mbed-gcc".to_string()));
    match outcome.errors.as_slice() {
        [EmbpmError::MissingTargetLink {
            name,
            attempted,
            ..
        }] => {
            assert_eq!(name, "mbed-gcc");
            assert!(!attempted);
        }
        other => panic!("expected one missing link, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_unreachable_base_is_attempted_missing_link() -> Result<()> {
    let temp = TempDir::new()?;
    let leaf = GitRepoFixture::target(
        &temp.path().join("sources/orphan"),
        &[("v1.0.0", TargetFixture::new("orphan", "1.0.0").inherits("no-such-base", "*"))],
    )?;
    let fetcher = GitFetcher::new(BTreeMap::from([("orphan".to_string(), leaf.url())]));
    let store = ComponentStore::targets(temp.path().join("project/embpm_targets"));

    let outcome =
        TargetHierarchyResolver::new(&store, &fetcher).get_derived_target(&TargetSpec::parse("orphan,*")?, true).await;

    assert_eq!(outcome.derived.as_ref().map(|d| d.hierarchy.len()), Some(1));
    assert!(matches!(outcome.state, WalkState::MissingLink(ref missing) if missing.attempted));
    assert!(outcome.state.is_terminal());
    assert_eq!(outcome.errors.len(), 1);
    Ok(())
}
