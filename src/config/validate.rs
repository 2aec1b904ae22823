// src/config/validate.rs

use std::fmt;

use tracing::warn;

use crate::config::model::ConcatEntry;
use crate::config::settings::Settings;

/// One named concatenation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// Name as written in the descriptor (e.g. `vendor`).
    pub name: String,
    /// Output file name, always ending in `.js` (e.g. `vendor.js`).
    pub file_name: String,
    /// Module specifiers in concatenation order. Never empty.
    pub modules: Vec<String>,
}

/// Non-fatal descriptor problems. Logged, never returned as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The list is empty; the target is skipped.
    EmptyConcatList { target: String },
    /// A bare string was given; it is treated as a one-element list.
    StringConcatList { target: String },
    /// Neither a string nor a list of strings; the target is skipped.
    MalformedConcatList { target: String },
    /// The output file name is the JS bundle's; the target is skipped.
    ConcatNameCollision { target: String, file_name: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::EmptyConcatList { target } => {
                write!(f, "concat list for '{target}' is empty")
            }
            ConfigWarning::StringConcatList { target } => {
                write!(f, "concat list for '{target}' is a string instead of a string[]")
            }
            ConfigWarning::MalformedConcatList { target } => {
                write!(f, "concat list for '{target}' is not a string[]")
            }
            ConfigWarning::ConcatNameCollision { target, file_name } => {
                write!(f, "concat target '{target}' would overwrite the JS bundle '{file_name}'")
            }
        }
    }
}

impl ConfigWarning {
    pub fn target(&self) -> &str {
        match self {
            ConfigWarning::EmptyConcatList { target }
            | ConfigWarning::StringConcatList { target }
            | ConfigWarning::MalformedConcatList { target }
            | ConfigWarning::ConcatNameCollision { target, .. } => target,
        }
    }

    /// Whether the target is dropped because of this warning.
    pub fn excludes_target(&self) -> bool {
        !matches!(self, ConfigWarning::StringConcatList { .. })
    }
}

fn target_file_name(name: &str) -> String {
    if name.ends_with(".js") {
        name.to_string()
    } else {
        format!("{name}.js")
    }
}

impl Settings {
    /// Normalise the concat map into build targets, in name order.
    ///
    /// Every warning is logged here as well as returned so callers can count
    /// them.
    pub fn concat_targets(&self) -> (Vec<BuildTarget>, Vec<ConfigWarning>) {
        let mut targets = Vec::new();
        let mut warnings = Vec::new();

        for (name, entry) in self.concat() {
            let modules = match entry {
                ConcatEntry::Many(list) if list.is_empty() => {
                    warnings.push(ConfigWarning::EmptyConcatList {
                        target: name.clone(),
                    });
                    continue;
                }
                ConcatEntry::Many(list) => list.clone(),
                ConcatEntry::One(single) if single.trim().is_empty() => {
                    warnings.push(ConfigWarning::EmptyConcatList {
                        target: name.clone(),
                    });
                    continue;
                }
                ConcatEntry::One(single) => {
                    warnings.push(ConfigWarning::StringConcatList {
                        target: name.clone(),
                    });
                    vec![single.clone()]
                }
                ConcatEntry::Malformed(_) => {
                    warnings.push(ConfigWarning::MalformedConcatList {
                        target: name.clone(),
                    });
                    continue;
                }
            };

            let file_name = target_file_name(name);
            if file_name == self.js_out() {
                warnings.push(ConfigWarning::ConcatNameCollision {
                    target: name.clone(),
                    file_name,
                });
                continue;
            }

            targets.push(BuildTarget {
                name: name.clone(),
                file_name,
                modules,
            });
        }

        for w in &warnings {
            warn!(target_name = %w.target(), "{w}");
        }

        (targets, warnings)
    }
}
