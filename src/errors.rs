// src/errors.rs

//! Crate-wide error type and aliases.
//!
//! Only genuine failures live here. Missing entries and malformed concat
//! lists are warnings: they are logged and counted, never returned.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpackError {
    #[error("cannot resolve module '{specifier}' from {basedir:?}")]
    Resolution { specifier: String, basedir: PathBuf },

    #[error("{stage} failed: {message}")]
    Transform { stage: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IpackError {
    pub fn resolution(specifier: impl Into<String>, basedir: impl Into<PathBuf>) -> Self {
        IpackError::Resolution {
            specifier: specifier.into(),
            basedir: basedir.into(),
        }
    }

    pub fn transform(stage: impl Into<String>, message: impl Into<String>) -> Self {
        IpackError::Transform {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, IpackError>;
