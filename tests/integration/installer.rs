use anyhow::Result;
use std::collections::BTreeMap;
use tempfile::TempDir;

use embpm_cli::cache::ComponentStore;
use embpm_cli::core::EmbpmError;
use embpm_cli::installer::{InstallOptions, InstallOrigin, InstallRequest, Installer};
use embpm_cli::source::GitFetcher;
use embpm_cli::test_utils::{FakeFetcher, GitRepoFixture, ModuleFixture};
use embpm_cli::version::VersionSpec;

struct Stores {
    temp: TempDir,
    local: ComponentStore,
    global: ComponentStore,
}

fn stores() -> Result<Stores> {
    let temp = TempDir::new()?;
    let local = ComponentStore::modules(temp.path().join("project/embpm_modules"));
    let global = ComponentStore::modules(temp.path().join("home/modules"));
    Ok(Stores {
        temp,
        local,
        global,
    })
}

fn request(name: &str, spec: &str) -> Result<InstallRequest> {
    Ok(InstallRequest {
        name: name.to_string(),
        spec: VersionSpec::parse(spec)?,
        options: InstallOptions::default(),
    })
}

#[tokio::test]
async fn test_unsatisfiable_dependency_does_not_stop_siblings() -> Result<()> {
    let stores = stores()?;
    let sources = stores.temp.path().join("sources");

    let root = GitRepoFixture::component(
        &sources.join("root-lib"),
        &[(
            "v1.0.0",
            ModuleFixture::new("root-lib", "1.0.0").dependency("too-new", "^5.0.0").dependency("fine", "~0.2.0"),
        )],
    )?;
    let too_new = GitRepoFixture::component(
        &sources.join("too-new"),
        &[("v1.0.0", ModuleFixture::new("too-new", "1.0.0")), ("v1.1.0", ModuleFixture::new("too-new", "1.1.0"))],
    )?;
    let fine = GitRepoFixture::component(
        &sources.join("fine"),
        &[("v0.2.0", ModuleFixture::new("fine", "0.2.0")), ("v0.2.7", ModuleFixture::new("fine", "0.2.7"))],
    )?;

    let fetcher = GitFetcher::new(BTreeMap::from([
        ("root-lib".to_string(), root.url()),
        ("too-new".to_string(), too_new.url()),
        ("fine".to_string(), fine.url()),
    ]));
    let installer = Installer::with_stores(stores.local.clone(), stores.global.clone(), &fetcher);

    let outcome = installer.install_component(&request("root-lib", "*")?).await;

    match &outcome.errors[..] {
        [EmbpmError::NoMatchingVersion {
            name,
            available,
            ..
        }] => {
            assert_eq!(name, "too-new");
            assert_eq!(available, &["1.0.0", "1.1.0"]);
        }
        other => panic!("expected one NoMatchingVersion, got {other:?}"),
    }
    assert_eq!(outcome.components["fine"].version.to_string(), "0.2.7");
    assert!(!outcome.components.contains_key("too-new"));

    // the failed fetch leaves no entry behind
    assert!(stores.local.lookup("too-new")?.is_none());
    let staging = stores.local.root().join(".staging");
    let leftovers = std::fs::read_dir(&staging).map(|entries| entries.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
    Ok(())
}

#[tokio::test]
async fn test_remote_pin_installs_tagged_version() -> Result<()> {
    let stores = stores()?;
    let repo = GitRepoFixture::component(
        &stores.temp.path().join("sources/testing-dummy"),
        &[
            ("v0.0.1", ModuleFixture::new("testing-dummy", "0.0.1")),
            ("v0.0.2", ModuleFixture::new("testing-dummy", "0.0.2")),
        ],
    )?;
    let fetcher = GitFetcher::default();
    let installer = Installer::with_stores(stores.local.clone(), stores.global.clone(), &fetcher);

    let outcome = installer.install_component(&request("testing-dummy", &format!("{}#0.0.1", repo.url()))?).await;

    assert!(outcome.is_success(), "{:?}", outcome.errors);
    let installed = &outcome.components["testing-dummy"];
    assert_eq!(installed.version.to_string(), "0.0.1");
    assert_eq!(installed.source.as_deref(), Some(format!("{}#0.0.1", repo.url()).as_str()));
    Ok(())
}

#[tokio::test]
async fn test_second_install_fetches_nothing() -> Result<()> {
    let stores = stores()?;
    let fetcher = FakeFetcher::new()
        .component(ModuleFixture::new("app-lib", "2.0.0").dependency("a", "^1.0.0").dependency("b", ">=0.3.0"))
        .component(ModuleFixture::new("a", "1.0.0").dependency("b", ">=0.3.0"))
        .component(ModuleFixture::new("a", "1.4.2").dependency("b", ">=0.3.0"))
        .component(ModuleFixture::new("b", "0.3.1"))
        .component(ModuleFixture::new("b", "0.4.0"));
    let installer = Installer::with_stores(stores.local.clone(), stores.global.clone(), &fetcher);
    let req = request("app-lib", "^2.0.0")?;

    let first = installer.install_component(&req).await;
    assert!(first.is_success(), "{:?}", first.errors);
    let fetches_after_first = fetcher.fetch_count();
    assert_eq!(fetches_after_first, 3);

    let second = installer.install_component(&req).await;
    assert!(second.is_success(), "{:?}", second.errors);
    assert_eq!(fetcher.fetch_count(), fetches_after_first);

    let versions = |outcome: &embpm_cli::installer::InstallOutcome| -> Vec<String> {
        outcome.components.values().map(|c| format!("{} {}", c.name, c.version)).collect()
    };
    assert_eq!(versions(&first), versions(&second));
    assert!(second.components.values().all(|c| c.origin == InstallOrigin::Reused));
    Ok(())
}
