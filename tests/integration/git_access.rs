use anyhow::Result;
use tempfile::TempDir;

use embpm_cli::source::RemoteComponentSource;
use embpm_cli::test_utils::{GitRepoFixture, ModuleFixture};
use embpm_cli::version::{Version, VersionSpec};

fn testing_dummy(temp: &TempDir) -> Result<GitRepoFixture> {
    GitRepoFixture::component(
        &temp.path().join("sources/testing-dummy"),
        &[
            ("v0.0.1", ModuleFixture::new("testing-dummy", "0.0.1")),
            ("v0.0.2", ModuleFixture::new("testing-dummy", "0.0.2")),
            ("not-a-version", ModuleFixture::new("testing-dummy", "0.0.3-dev")),
        ],
    )
}

#[tokio::test]
async fn test_clone_lists_versions_and_fragment_selects() -> Result<()> {
    let temp = TempDir::new()?;
    let repo = testing_dummy(&temp)?;

    let source = RemoteComponentSource::create_from_name_and_spec(&repo.url(), "testing-dummy")?;
    assert_eq!(source.version_spec(), VersionSpec::Any);

    let mut working = source.clone(&temp.path().join("cache")).await?;
    assert!(working.directory().join(".git").exists());

    let versions = working.available_versions().await?;
    assert_eq!(versions, vec![Version::parse("0.0.1")?, Version::parse("0.0.2")?]);

    let pinned =
        RemoteComponentSource::create_from_name_and_spec(&format!("{}#0.0.1", repo.url()), "testing-dummy")?;
    let spec = pinned.version_spec();
    assert_eq!(spec.select(&versions), Some(Version::parse("0.0.1")?));

    let directory = working.directory().to_path_buf();
    working.remove().await?;
    assert!(!directory.exists());
    Ok(())
}

#[tokio::test]
async fn test_each_clone_is_independent() -> Result<()> {
    let temp = TempDir::new()?;
    let repo = testing_dummy(&temp)?;
    let source = RemoteComponentSource::create_from_name_and_spec(&repo.url(), "testing-dummy")?;
    let cache = temp.path().join("cache");

    let mut first = source.clone(&cache).await?;
    let mut second = source.clone(&cache).await?;
    assert_ne!(first.directory(), second.directory());

    first.available_versions().await?;
    second.available_versions().await?;

    first.checkout(&Version::parse("0.0.1")?).await?;
    second.checkout(&Version::parse("0.0.2")?).await?;
    let first_manifest = std::fs::read_to_string(first.directory().join("module.json"))?;
    let second_manifest = std::fs::read_to_string(second.directory().join("module.json"))?;
    assert!(first_manifest.contains("0.0.1"));
    assert!(second_manifest.contains("0.0.2"));
    Ok(())
}

#[tokio::test]
async fn test_failed_clone_leaves_nothing() -> Result<()> {
    let temp = TempDir::new()?;
    let missing = format!("file://{}", temp.path().join("no-such-repo").display());
    let source = RemoteComponentSource::create_from_name_and_spec(&missing, "no-such-repo")?;

    let dest = temp.path().join("dest");
    assert!(source.clone_into(&dest).await.is_err());
    assert!(!dest.exists());
    Ok(())
}
