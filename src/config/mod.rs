// src/config/mod.rs

//! Project and user configuration.
//!
//! Responsibilities:
//! - Define the `package.json` descriptor model (`model.rs`).
//! - Derive every path the pipelines need from it (`settings.rs`).
//! - Read the descriptor leniently from disk (`loader.rs`).
//! - Normalise concat lists into build targets (`validate.rs`).
//! - Persist global user preferences (`user.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod user;
pub mod validate;

pub use model::{ConcatEntry, ProjectDescriptor, DESCRIPTOR_SECTION};
pub use settings::Settings;
pub use user::{PackageManager, UserSettings, UserSettingsStore};
pub use validate::{BuildTarget, ConfigWarning};
