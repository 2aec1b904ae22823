// src/fs/mock.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::FileSystem;

#[derive(Debug, Clone)]
enum Entry {
    File(Vec<u8>),
    Dir,
}

/// In-memory project tree keyed by full path.
///
/// Adding a file also creates its parent folders. Clones share the same
/// tree, so a test can keep a handle after passing one to a resolver or a
/// sink. Stick to absolute paths like `/proj/client/js/index.ts`.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, Entry>>>,
    writes: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut entries = self.entries();
        for folder in path.ancestors().skip(1).filter(|a| !a.as_os_str().is_empty()) {
            entries.entry(folder.to_path_buf()).or_insert(Entry::Dir);
        }
        entries.insert(path.to_path_buf(), Entry::File(content.into()));
    }

    /// Forget a file, e.g. to simulate a deleted source.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.entries().remove(path.as_ref());
    }

    /// Paths passed to `write`, in call order.
    pub fn written(&self) -> Vec<PathBuf> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.entries().get(path) {
            Some(Entry::File(bytes)) => String::from_utf8(bytes.clone())
                .map_err(|e| anyhow!("{} is not UTF-8: {e}", path.display())),
            Some(Entry::Dir) => Err(anyhow!("{} is a folder", path.display())),
            None => Err(anyhow!("{} does not exist", path.display())),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_path_buf());
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(Entry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(Entry::Dir))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        if self.entries().contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("{} does not exist", path.display()))
        }
    }
}
