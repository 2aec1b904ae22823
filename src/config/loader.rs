// src/config/loader.rs

use std::path::Path;

use tracing::debug;

use crate::config::model::{DESCRIPTOR_SECTION, ProjectDescriptor};
use crate::config::settings::Settings;
use crate::errors::Result;
use crate::fs::FileSystem;

/// Parse the descriptor section out of `package.json` text.
///
/// Returns `Ok(None)` when the section is absent.
pub fn parse_descriptor(package_json: &str) -> Result<Option<ProjectDescriptor>> {
    let mut json: serde_json::Value = serde_json::from_str(package_json)?;
    match json.get_mut(DESCRIPTOR_SECTION).map(serde_json::Value::take) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(section) => Ok(Some(serde_json::from_value(section)?)),
    }
}

impl Settings {
    /// Read settings from `<root>/package.json`.
    ///
    /// Never fails: a missing file, unreadable JSON or a missing section all
    /// fall back to the default descriptor.
    pub fn try_read_from_package_json(root: &Path, fs: &dyn FileSystem) -> Settings {
        let path = root.join("package.json");

        let descriptor = match fs.read_to_string(&path) {
            Ok(text) => match parse_descriptor(&text) {
                Ok(Some(d)) => d,
                Ok(None) => {
                    debug!(?path, "no `{DESCRIPTOR_SECTION}` section; using defaults");
                    ProjectDescriptor::default()
                }
                Err(err) => {
                    debug!(?path, error = %err, "unparsable package.json; using defaults");
                    ProjectDescriptor::default()
                }
            },
            Err(err) => {
                debug!(?path, error = %err, "no package.json; using defaults");
                ProjectDescriptor::default()
            }
        };

        Settings::new(root, descriptor)
    }
}
