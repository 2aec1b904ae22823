// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::{EventKind, ModifyKind};
use notify::Event;

use crate::errors::Result;
use crate::pipeline::ChangeSet;
use crate::types::PipelineKind;

/// Filesystem scope of one pipeline: a folder and the globs (relative to
/// it) whose changes should trigger a rebuild.
#[derive(Clone)]
pub struct WatchSpec {
    kind: PipelineKind,
    root: PathBuf,
    globs: Vec<String>,
}

impl fmt::Debug for WatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSpec")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("globs", &self.globs)
            .finish()
    }
}

impl PartialEq for WatchSpec {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.root == other.root && self.globs == other.globs
    }
}

impl WatchSpec {
    pub fn new(kind: PipelineKind, root: impl Into<PathBuf>, globs: Vec<String>) -> Self {
        Self {
            kind,
            root: root.into(),
            globs,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    /// Compile the globs into a matcher.
    pub fn matcher(&self) -> Result<WatchMatcher> {
        let mut builder = GlobSetBuilder::new();
        for pat in &self.globs {
            let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .with_context(|| format!("building watch globset for {}", self.kind))?;
        Ok(WatchMatcher {
            root: self.root.clone(),
            set,
        })
    }
}

/// Compiled form of a [`WatchSpec`].
#[derive(Debug, Clone)]
pub struct WatchMatcher {
    root: PathBuf,
    set: GlobSet,
}

impl WatchMatcher {
    /// Whether `path` (absolute, or relative to the watched folder) is in
    /// scope.
    pub fn matches(&self, path: &Path) -> bool {
        let rel = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => return false,
            }
        } else {
            path
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        self.set.is_match(rel.as_str())
    }

    /// The part of `event` that concerns this scope, if any.
    ///
    /// Access events never count. Creates, removes and renames mark the
    /// change as structural.
    pub fn change_for(&self, event: &Event) -> Option<ChangeSet> {
        let structural = match event.kind {
            EventKind::Access(_) => return None,
            EventKind::Create(_) | EventKind::Remove(_) => true,
            EventKind::Modify(ModifyKind::Name(_)) => true,
            _ => false,
        };
        let paths: Vec<&PathBuf> = event.paths.iter().filter(|p| self.matches(p)).collect();
        if paths.is_empty() {
            return None;
        }
        let mut change = ChangeSet::paths(paths.into_iter().cloned());
        change.structural = structural;
        Some(change)
    }

    /// All in-scope changes of one debounced batch, merged.
    pub fn change_for_batch<'a>(&self, events: impl IntoIterator<Item = &'a Event>) -> Option<ChangeSet> {
        events
            .into_iter()
            .filter_map(|event| self.change_for(event))
            .reduce(|mut merged, change| {
                merged.merge(change);
                merged
            })
    }
}
