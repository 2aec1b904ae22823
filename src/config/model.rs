// src/config/model.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the `package.json` section holding the project descriptor.
pub const DESCRIPTOR_SECTION: &str = "ipack";

/// Sparse project descriptor as read from the `ipack` section of
/// `package.json`:
///
/// ```json
/// {
///   "ipack": {
///     "input": "client",
///     "output": "wwwroot",
///     "jsOut": "app.js",
///     "concat": { "vendor": ["jquery", "lodash"] },
///     "alias": { "vue": "vue/dist/vue.common" },
///     "externals": { "jquery": "$" }
///   }
/// }
/// ```
///
/// Every field is optional; `Settings::new` fills in the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Target name to module specifier(s).
    #[serde(default)]
    pub concat: BTreeMap<String, ConcatEntry>,

    /// Specifier to replacement specifier, applied before resolution.
    #[serde(default)]
    pub alias: BTreeMap<String, String>,

    /// Specifier to global variable name; such modules are not inlined.
    #[serde(default)]
    pub externals: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js_out: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_out: Option<String>,
}

/// A concat list as written by the user.
///
/// Only `Many` is the documented shape. `One` is accepted with a warning and
/// `Malformed` keeps anything else around so it can be reported instead of
/// failing the whole descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConcatEntry {
    Many(Vec<String>),
    One(String),
    Malformed(serde_json::Value),
}

impl From<Vec<&str>> for ConcatEntry {
    fn from(modules: Vec<&str>) -> Self {
        ConcatEntry::Many(modules.into_iter().map(str::to_string).collect())
    }
}
