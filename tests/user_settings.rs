// tests/user_settings.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use ipack::config::{PackageManager, UserSettings, UserSettingsStore};
use ipack::fs::mock::MockFileSystem;
use ipack::fs::FileSystem;

type TestResult = Result<(), Box<dyn Error>>;

const PATH: &str = "/home/dev/ipack/settings.toml";

fn store() -> (UserSettingsStore, MockFileSystem) {
    let fs = MockFileSystem::new();
    (UserSettingsStore::new(PATH, Arc::new(fs.clone())), fs)
}

#[test]
fn missing_file_reads_as_defaults() {
    let (store, _) = store();
    let settings = store.try_read();
    assert_eq!(settings, UserSettings::default());
    assert_eq!(settings.package_manager, PackageManager::Yarn);
    assert!(!settings.mute_notification);
}

#[test]
fn garbage_reads_as_defaults() {
    let (store, fs) = store();
    fs.add_file(PATH, "packageManager = [not toml");
    assert_eq!(store.try_read(), UserSettings::default());
}

#[test]
fn set_persists_and_returns_new_settings() -> TestResult {
    let (store, fs) = store();

    let updated = store.set("package-manager", "NPM")?;
    assert_eq!(updated.package_manager, PackageManager::Npm);
    assert_eq!(fs.written(), vec![Path::new(PATH).to_path_buf()]);

    let updated = store.set("mute-notification", "true")?;
    assert_eq!(updated.package_manager, PackageManager::Npm);
    assert!(updated.mute_notification);

    assert_eq!(store.try_read(), updated);
    Ok(())
}

#[test]
fn invalid_keys_and_values_are_rejected_without_writing() {
    let (store, fs) = store();
    assert!(store.set("theme", "dark").is_err());
    assert!(store.set("package-manager", "pnpm").is_err());
    assert!(store.set("mute-notification", "maybe").is_err());
    assert!(fs.written().is_empty());

    assert!(UserSettingsStore::validate("package-manager", "disabled"));
    assert!(!UserSettingsStore::validate("packageManager", "yarn"));
}

#[test]
fn unknown_entries_survive_a_write() -> TestResult {
    let (store, fs) = store();
    fs.add_file(PATH, "editor = \"vim\"\nmuteNotification = true\n");

    store.set("package-manager", "disabled")?;
    let text = fs.read_to_string(Path::new(PATH))?;
    assert!(text.contains("editor = \"vim\""));

    let settings = store.try_read();
    assert_eq!(settings.package_manager, PackageManager::Disabled);
    assert!(settings.mute_notification);
    Ok(())
}

#[test]
fn package_manager_parses_case_insensitively() {
    assert_eq!("Yarn".parse::<PackageManager>(), Ok(PackageManager::Yarn));
    assert_eq!(" npm ".parse::<PackageManager>(), Ok(PackageManager::Npm));
    assert!("bun".parse::<PackageManager>().is_err());
    assert_eq!(PackageManager::Disabled.to_string(), "disabled");
}
