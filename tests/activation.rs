#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use hearth_migrate::migration::activate_staged_import;
use hearth_migrate::{DataLayout, DeviceCategory, MigrationStep, StepOutcome};
use tempfile::tempdir;

#[path = "util.rs"]
mod util;

use util::{snapshot_tree, write_file, Harness};

#[tokio::test]
async fn staged_import_replaces_root_exactly() -> Result<()> {
    let tmp = tempdir()?;
    let layout = DataLayout::new(tmp.path().join("data"));
    let root = layout.root();

    // Y: current contents of the root.
    write_file(&root.join("hearth.json"), br#"{"version":"0.9.0"}"#);
    write_file(&root.join("app-data/nextcloud/config.php"), b"old-config");
    write_file(&root.join("db/user.json.migrated"), b"{}");

    // X: a complete replacement staged by the import process.
    let staged = layout.import_dir();
    write_file(&staged.join("app-data/bitcoin/bitcoin.conf"), b"rpcport=8332");
    write_file(&staged.join("secrets/jwt"), b"secret");
    std::fs::create_dir_all(staged.join("empty-dir"))?;
    let expected = snapshot_tree(&staged);

    let harness = Harness::new(DeviceCategory::Home);
    let report = harness.pipeline(root).run().await?;

    assert_eq!(
        report.outcome(MigrationStep::ActivateStagedImport),
        Some(&StepOutcome::Applied)
    );
    assert_eq!(snapshot_tree(root), expected, "root holds exactly the staged tree");
    assert!(!layout.import_dir().exists(), "import dir consumed");
    assert!(!layout.import_temp_dir().exists(), "temp sibling removed");
    assert!(!layout.import_archive_dir().exists(), "old tree removed");
    Ok(())
}

#[test]
fn activation_without_staged_import_leaves_root_untouched() {
    let tmp = tempdir().unwrap();
    let layout = DataLayout::new(tmp.path().join("data"));
    write_file(&layout.root().join("a/b.txt"), b"b");
    let before = snapshot_tree(layout.root());

    activate_staged_import(&layout).unwrap();

    assert_eq!(snapshot_tree(layout.root()), before);
    assert!(!layout.import_temp_dir().exists());
}

#[tokio::test]
async fn promotion_interrupted_between_phases_completes_on_next_boot() -> Result<()> {
    let tmp = tempdir()?;
    let layout = DataLayout::new(tmp.path().join("data"));

    // A previous boot moved the import to the temp sibling and archived the
    // old root, then died before the final rename.
    write_file(&layout.import_temp_dir().join("state/marker"), b"imported");
    write_file(&layout.import_archive_dir().join("old"), b"old");
    let expected = snapshot_tree(&layout.import_temp_dir());

    let harness = Harness::new(DeviceCategory::Home);
    let report = harness.pipeline(layout.root()).run().await?;

    assert_eq!(
        report.outcome(MigrationStep::ActivateStagedImport),
        Some(&StepOutcome::Applied)
    );
    assert_eq!(snapshot_tree(layout.root()), expected);
    assert!(!layout.import_temp_dir().exists());
    assert!(!layout.import_archive_dir().exists());
    Ok(())
}

#[tokio::test]
async fn activated_legacy_file_is_picked_up_by_the_upgrader() -> Result<()> {
    let tmp = tempdir()?;
    let layout = DataLayout::new(tmp.path().join("data"));
    write_file(
        &layout.import_dir().join("db/user.json"),
        br#"{"name":"Imported","password":"h","repos":["r"]}"#,
    );

    let harness = Harness::new(DeviceCategory::Home);
    let report = harness.pipeline(layout.root()).run().await?;

    assert_eq!(
        report.outcome(MigrationStep::UpgradeLegacyData),
        Some(&StepOutcome::Applied)
    );
    assert_eq!(
        harness.users.state.lock().unwrap().name.as_deref(),
        Some("Imported")
    );
    assert!(layout.legacy_user_tombstone().exists());
    Ok(())
}

#[tokio::test]
async fn root_given_with_trailing_separator_is_activated() -> Result<()> {
    let tmp = tempdir()?;
    let plain = tmp.path().join("data");
    let mut raw = plain.clone().into_os_string();
    raw.push("/");
    let root = std::path::PathBuf::from(raw);

    write_file(&plain.join("old.txt"), b"old");
    write_file(&plain.join("import/new.txt"), b"new");

    let harness = Harness::new(DeviceCategory::Home);
    let report = harness.pipeline(&root).run().await?;

    assert_eq!(
        report.outcome(MigrationStep::ActivateStagedImport),
        Some(&StepOutcome::Applied)
    );
    assert_eq!(std::fs::read(plain.join("new.txt"))?, b"new");
    assert!(!plain.join("old.txt").exists());
    assert!(!plain.join("import").exists());
    assert!(!plain.join("-import-temp").exists());
    assert!(!tmp.path().join("data-import-temp").exists());
    Ok(())
}
