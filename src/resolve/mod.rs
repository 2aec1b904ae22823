// src/resolve/mod.rs

//! Node-style module resolution.
//!
//! `resolve(specifier, basedir)` is a pure function of the specifier, the
//! base folder, the configured extension / main-field order and the state of
//! the filesystem. Nothing here caches on its own; callers that want to reuse
//! lookups within one build pass a [`ResolutionCache`].

pub mod package;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::errors::{IpackError, Result};
use crate::fs::FileSystem;

/// Extension and `package.json` field order used by one resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Tried in order after the bare path, e.g. `[".ts", ".js"]`.
    pub extensions: Vec<String>,
    /// `package.json` fields tried in order, e.g. `["unpkg", "browser", "main"]`.
    pub main_fields: Vec<String>,
}

impl ResolverOptions {
    pub fn new<E, M>(extensions: E, main_fields: M) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            main_fields: main_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Options used when bundling the project's own script tree.
    pub fn for_bundle() -> Self {
        Self::new([".ts", ".tsx", ".js", ".json"], ["browser", "main"])
    }

    /// Options used when resolving concat targets (plain vendor scripts).
    pub fn for_concat() -> Self {
        Self::new([".js"], ["unpkg", "browser", "main"])
    }
}

/// A specifier bound to the file it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedModule {
    pub specifier: String,
    pub path: PathBuf,
    /// `/`-prefixed, `/`-separated path relative to the project root, used as
    /// the source-map key (e.g. `/node_modules/jquery/dist/jquery.js`).
    pub key: String,
}

/// Lookups memoised for the duration of a single build.
pub type ResolutionCache = HashMap<(String, PathBuf), PathBuf>;

#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    options: ResolverOptions,
    fs: Arc<dyn FileSystem>,
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>, options: ResolverOptions, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            options,
            fs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve `specifier` as seen from a file located in `basedir`.
    pub fn resolve(&self, specifier: &str, basedir: &Path) -> Result<PathBuf> {
        let found = if is_path_like(specifier) {
            let candidate = normalize(&basedir.join(specifier));
            self.load_as_file(&candidate)
                .or_else(|| self.load_as_directory(&candidate))
        } else {
            self.load_from_node_modules(specifier, basedir)
        };

        match found {
            Some(path) => {
                trace!(specifier, ?basedir, ?path, "resolved");
                Ok(path)
            }
            None => Err(IpackError::resolution(specifier, basedir)),
        }
    }

    /// Like [`Resolver::resolve`], memoising into `cache`.
    pub fn resolve_cached(
        &self,
        cache: &mut ResolutionCache,
        specifier: &str,
        basedir: &Path,
    ) -> Result<PathBuf> {
        let key = (specifier.to_string(), basedir.to_path_buf());
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }
        let path = self.resolve(specifier, basedir)?;
        cache.insert(key, path.clone());
        Ok(path)
    }

    /// Resolve and attach the project-relative key.
    pub fn resolve_module(&self, specifier: &str, basedir: &Path) -> Result<ResolvedModule> {
        let path = self.resolve(specifier, basedir)?;
        Ok(ResolvedModule {
            specifier: specifier.to_string(),
            key: module_key(&self.root, &path),
            path,
        })
    }

    fn load_as_file(&self, path: &Path) -> Option<PathBuf> {
        if self.fs.is_file(path) {
            return Some(path.to_path_buf());
        }
        let base = path.as_os_str().to_string_lossy();
        self.options
            .extensions
            .iter()
            .map(|ext| PathBuf::from(format!("{base}{ext}")))
            .find(|candidate| self.fs.is_file(candidate))
    }

    fn load_index(&self, dir: &Path) -> Option<PathBuf> {
        self.load_as_file(&dir.join("index"))
    }

    fn load_as_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !self.fs.is_dir(dir) {
            return None;
        }

        let manifest = dir.join("package.json");
        if self.fs.is_file(&manifest) {
            if let Ok(text) = self.fs.read_to_string(&manifest) {
                for main in package::main_entries(&text, &self.options.main_fields) {
                    let target = normalize(&dir.join(&main));
                    if let Some(found) = self
                        .load_as_file(&target)
                        .or_else(|| self.load_index(&target))
                    {
                        return Some(found);
                    }
                }
            }
        }

        self.load_index(dir)
    }

    fn load_from_node_modules(&self, specifier: &str, basedir: &Path) -> Option<PathBuf> {
        for dir in basedir.ancestors() {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                continue;
            }
            let candidate = dir.join("node_modules").join(specifier);
            if let Some(found) = self
                .load_as_file(&candidate)
                .or_else(|| self.load_as_directory(&candidate))
            {
                return Some(found);
            }
        }
        None
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Lexically remove `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `/`-separated path of `path` relative to `root`, always `/`-prefixed.
///
/// Paths outside `root` keep their full form.
pub fn module_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}
