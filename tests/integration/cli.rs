use anyhow::Result;
use predicates::prelude::*;

use crate::common::TestProject;
use embpm_cli::config::{BUILD_SECTION, Scope, SettingsStore, TARGET_KEY, TARGET_SET_EXPLICITLY_KEY};
use embpm_cli::test_utils::{GitRepoFixture, ModuleFixture, TargetFixture};

#[test]
fn test_invalid_target_exits_one_and_writes_nothing() {
    let project = TestProject::new().unwrap();

    for spec in ["Uppercase", "1leading-digit", "name,Not A Version", "name,owner/proj/extra"] {
        project
            .embpm()
            .args(["target", spec])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(format!("Invalid target: \"{spec}\"")));
    }

    assert!(!project.local_config_path().exists());
    assert!(!project.global_config_path().exists());
}

#[tokio::test]
async fn test_set_target_without_module_skips_install() -> Result<()> {
    let project = TestProject::new()?;

    project.embpm().args(["target", "x86-linux-native"]).assert().success();

    let settings = project.settings().await?;
    assert_eq!(settings.lookup_str(BUILD_SECTION, TARGET_KEY).as_deref(), Some("x86-linux-native,*"));
    assert_eq!(
        settings.get(Scope::Local, BUILD_SECTION, TARGET_SET_EXPLICITLY_KEY),
        Some(toml::Value::Boolean(true))
    );
    assert!(!project.project_path().join("embpm_targets").exists());
    Ok(())
}

#[tokio::test]
async fn test_set_global_target() -> Result<()> {
    let project = TestProject::new()?;

    project.embpm().args(["target", "-g", "k64f,ARMmbed/target-k64f"]).assert().success();

    let settings = project.settings().await?;
    assert_eq!(
        settings.get(Scope::Global, BUILD_SECTION, TARGET_KEY),
        Some(toml::Value::String("k64f,ARMmbed/target-k64f".to_string()))
    );
    assert!(settings.get(Scope::Local, BUILD_SECTION, TARGET_KEY).is_none());
    Ok(())
}

#[test]
fn test_display_without_target() {
    let project = TestProject::new().unwrap();
    project.embpm().arg("target").assert().success().stdout(predicate::str::contains("no target set"));
}

#[test]
fn test_display_exit_code_counts_errors() {
    let project = TestProject::new().unwrap();
    let targets = project.project_path().join("embpm_targets");
    TargetFixture::new("frdm-k64f-gcc", "0.1.0")
        .inherits("kinetis-gcc", "^1.0.0")
        .write_to(&targets.join("frdm-k64f-gcc"))
        .unwrap();

    project.embpm().args(["target", "-n", "frdm-k64f-gcc"]).assert().success();

    project
        .embpm()
        .arg("target")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("frdm-k64f-gcc 0.1.0"))
        .stdout(predicate::str::contains("kinetis-gcc ^1.0.0 missing"));
}

#[cfg(unix)]
#[test]
fn test_display_shows_linked_target_path() {
    let project = TestProject::new().unwrap();
    let dev = project.sources_path().join("my-board");
    TargetFixture::new("my-board", "0.0.0").write_to(&dev).unwrap();

    project.embpm().arg("link-target").arg("--dir").arg(&dev).assert().success();
    project.embpm().args(["link-target", "my-board"]).assert().success();
    project.embpm().args(["target", "my-board"]).assert().success();

    let real = dev.canonicalize().unwrap();
    project
        .embpm()
        .arg("target")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("my-board 0.0.0 -> {}", real.display())));
}

#[test]
fn test_set_target_in_module_installs_hierarchy() {
    let project = TestProject::new().unwrap();
    let board = GitRepoFixture::target(
        &project.sources_path().join("target-board"),
        &[("v1.2.0", TargetFixture::new("board", "1.2.0").inherits("board-base", "*"))],
    )
    .unwrap();
    let base = GitRepoFixture::target(
        &project.sources_path().join("target-board-base"),
        &[("v0.1.0", TargetFixture::new("board-base", "0.1.0"))],
    )
    .unwrap();
    project
        .write_global_config(&format!("[sources]\nboard = \"{}\"\nboard-base = \"{}\"\n", board.url(), base.url()))
        .unwrap();
    ModuleFixture::new("app", "1.0.0").application().write_to(project.project_path()).unwrap();

    project.embpm().args(["target", "board"]).assert().success();

    let targets = project.project_path().join("embpm_targets");
    assert!(targets.join("board/target.json").is_file());
    assert!(targets.join("board-base/target.json").is_file());
}

#[test]
fn test_global_target_installs_into_project() {
    let project = TestProject::new().unwrap();
    let board = GitRepoFixture::target(
        &project.sources_path().join("target-board"),
        &[("v1.0.0", TargetFixture::new("board", "1.0.0"))],
    )
    .unwrap();
    project.write_global_config(&format!("[sources]\nboard = \"{}\"\n", board.url())).unwrap();
    ModuleFixture::new("app", "1.0.0").application().write_to(project.project_path()).unwrap();

    project.embpm().args(["target", "-g", "board"]).assert().success();

    assert!(project.project_path().join("embpm_targets/board/target.json").is_file());
    assert!(!project.home_path().join("targets/board").exists());
    assert!(!project.local_config_path().exists());

    project
        .embpm()
        .arg("target")
        .assert()
        .success()
        .stdout(predicate::str::contains("board 1.0.0"))
        .stdout(predicate::str::contains("missing").not());
}

#[test]
fn test_failed_target_install_exits_one() {
    let project = TestProject::new().unwrap();
    ModuleFixture::new("app", "1.0.0").application().write_to(project.project_path()).unwrap();

    project
        .embpm()
        .args(["target", "unknown-board"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("link-target"));

    // the setting is kept even though the hierarchy could not be installed
    assert!(project.local_config_path().exists());
}

#[test]
fn test_install_reports_missing_source() {
    let project = TestProject::new().unwrap();
    ModuleFixture::new("app", "1.0.0")
        .application()
        .dependency("not-configured", "*")
        .write_to(project.project_path())
        .unwrap();

    project
        .embpm()
        .arg("install")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not-configured"));
}
