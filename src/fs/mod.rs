// src/fs/mod.rs

//! Filesystem seam used by the resolver, the pipelines and the output sink.
//!
//! Everything that touches project files goes through [`FileSystem`], so
//! resolution and settings can be tested against [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write `contents` to `path`, creating parent folders.
    ///
    /// Implementations must never leave a half-written file behind: either
    /// the previous contents survive or the new contents are complete.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

/// The real disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

/// Sibling temp file an artifact is staged in before the rename.
fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .with_context(|| format!("artifact path has no file name: {}", path.display()))?;
    let mut staged = name.to_os_string();
    staged.push(".ipack-tmp");
    Ok(path.with_file_name(staged))
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating folder {}", parent.display()))?;
        }

        let staged = staging_path(path)?;
        let mut file = fs::File::create(&staged)
            .with_context(|| format!("creating {}", staged.display()))?;
        if let Err(err) = file.write_all(contents) {
            drop(file);
            let _ = fs::remove_file(&staged);
            return Err(err).with_context(|| format!("writing {}", staged.display()));
        }
        drop(file);

        fs::rename(&staged, path).with_context(|| format!("replacing {}", path.display()))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("resolving {}", path.display()))
    }
}
