// src/config/user.rs

//! Global user preferences (`~/ipack/settings.toml`).
//!
//! Unrelated to any one project. Reads never fail; writes merge into the
//! existing file and replace it atomically.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{IpackError, Result};
use crate::fs::FileSystem;

pub const PACKAGE_MANAGER_KEY: &str = "package-manager";
pub const MUTE_NOTIFICATION_KEY: &str = "mute-notification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Yarn,
    Npm,
    Disabled,
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yarn" => Ok(PackageManager::Yarn),
            "npm" => Ok(PackageManager::Npm),
            "disabled" => Ok(PackageManager::Disabled),
            other => Err(format!(
                "invalid package manager: {other} (expected \"yarn\", \"npm\" or \"disabled\")"
            )),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageManager::Yarn => "yarn",
            PackageManager::Npm => "npm",
            PackageManager::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub package_manager: PackageManager,
    pub mute_notification: bool,
}

/// A validated `(key, value)` pair from the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SettingValue {
    PackageManager(PackageManager),
    MuteNotification(bool),
}

impl SettingValue {
    fn parse(key: &str, value: &str) -> Option<Self> {
        match key {
            PACKAGE_MANAGER_KEY => value.parse().ok().map(SettingValue::PackageManager),
            MUTE_NOTIFICATION_KEY => match value.trim().to_lowercase().as_str() {
                "true" => Some(SettingValue::MuteNotification(true)),
                "false" => Some(SettingValue::MuteNotification(false)),
                _ => None,
            },
            _ => None,
        }
    }

    fn stored_key(&self) -> &'static str {
        match self {
            SettingValue::PackageManager(_) => "packageManager",
            SettingValue::MuteNotification(_) => "muteNotification",
        }
    }

    fn to_toml(&self) -> toml::Value {
        match self {
            SettingValue::PackageManager(pm) => toml::Value::String(pm.to_string()),
            SettingValue::MuteNotification(b) => toml::Value::Boolean(*b),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSettingsStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl UserSettingsStore {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    /// `~/ipack/settings.toml`, if a home folder is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join("ipack").join("settings.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn available_keys() -> [&'static str; 2] {
        [PACKAGE_MANAGER_KEY, MUTE_NOTIFICATION_KEY]
    }

    /// Whether `key` is recognised and `value` is acceptable for it.
    pub fn validate(key: &str, value: &str) -> bool {
        SettingValue::parse(key, value).is_some()
    }

    /// Read the settings, falling back to defaults on any failure.
    pub fn try_read(&self) -> UserSettings {
        let text = match self.fs.read_to_string(&self.path) {
            Ok(t) => t,
            Err(err) => {
                debug!(path = ?self.path, error = %err, "no user settings; using defaults");
                return UserSettings::default();
            }
        };

        toml::from_str(&text).unwrap_or_else(|err| {
            debug!(path = ?self.path, error = %err, "unreadable user settings; using defaults");
            UserSettings::default()
        })
    }

    /// Validate and persist one setting, keeping every other entry of the
    /// file (including unknown ones).
    pub fn set(&self, key: &str, value: &str) -> Result<UserSettings> {
        let setting = SettingValue::parse(key, value).ok_or_else(|| {
            IpackError::Config(format!(
                "invalid setting '{key}' = '{value}' (available keys: {})",
                Self::available_keys().join(", ")
            ))
        })?;

        let mut table: toml::Table = self
            .fs
            .read_to_string(&self.path)
            .ok()
            .and_then(|text| toml::from_str(&text).ok())
            .unwrap_or_default();
        table.insert(setting.stored_key().to_string(), setting.to_toml());

        let text = toml::to_string(&table)?;
        self.fs.write(&self.path, text.as_bytes())?;
        info!(path = ?self.path, key, "saved user setting");

        Ok(self.try_read())
    }
}
