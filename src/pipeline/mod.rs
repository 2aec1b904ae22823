// src/pipeline/mod.rs

//! The three build pipelines.
//!
//! Each pipeline owns its inputs and its artifact names; none reads another
//! one's output. A build attempt always returns a [`PipelineReport`] instead
//! of an error, so a failure in one pipeline can never stop another.
//!
//! - [`js`] bundles the script module graph (with an incremental cache).
//! - [`css`] compiles the stylesheet entry and post-processes it.
//! - [`concat`] concatenates vendor modules into named targets.

pub mod concat;
pub mod css;
pub mod graph;
pub mod js;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::config::Settings;
use crate::events::BuildEventHub;
use crate::fs::FileSystem;
use crate::output::ArtifactSink;
use crate::transform::{BoxFuture, Toolchain};
use crate::types::{BuildFlags, PipelineKind};
use crate::watch::WatchSpec;

pub use concat::ConcatPipeline;
pub use css::CssPipeline;
pub use js::JsPipeline;

/// Files that changed since the previous build of a pipeline.
///
/// An empty `paths` set means "unknown / everything", which is what the
/// initial build and manual rebuilds use. `structural` is set when files
/// were created or removed, which can change how specifiers resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub paths: BTreeSet<PathBuf>,
    pub structural: bool,
}

impl ChangeSet {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            structural: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.paths.is_empty()
    }

    /// Fold a later change set into this one.
    ///
    /// A full rebuild absorbs everything.
    pub fn merge(&mut self, other: ChangeSet) {
        if self.is_full() || other.is_full() {
            self.paths.clear();
        } else {
            self.paths.extend(other.paths);
        }
        self.structural |= other.structural;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Succeeded,
    Failed,
    /// Nothing to build (missing entry, no concat targets).
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub kind: PipelineKind,
    pub status: BuildStatus,
    /// Artifact paths relative to the output folder, in emission order.
    pub artifacts: Vec<String>,
    pub warnings: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn skipped(kind: PipelineKind, warnings: usize) -> Self {
        Self {
            kind,
            status: BuildStatus::Skipped,
            artifacts: Vec::new(),
            warnings,
            errors: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == BuildStatus::Failed
    }
}

/// Everything a pipeline needs from the run, passed in explicitly.
#[derive(Clone)]
pub struct PipelineContext {
    pub settings: Arc<Settings>,
    pub flags: BuildFlags,
    pub toolchain: Arc<Toolchain>,
    pub sink: Arc<dyn ArtifactSink>,
    pub hub: BuildEventHub,
    pub fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("root", &self.settings.root())
            .field("flags", &self.flags)
            .field("sink", &self.sink.describe())
            .finish_non_exhaustive()
    }
}

pub trait Pipeline: Send {
    fn kind(&self) -> PipelineKind;

    /// The filesystem scope that should retrigger this pipeline, or `None`
    /// when it is not watched.
    fn watch_spec(&self) -> Option<WatchSpec>;

    fn build<'a>(&'a mut self, changes: &'a ChangeSet) -> BoxFuture<'a, PipelineReport>;
}

/// Turn the result of one build attempt into a report, logging the outcome
/// and publishing a build-done event on success.
pub(crate) fn finish(
    ctx: &PipelineContext,
    kind: PipelineKind,
    started: Instant,
    outcome: crate::errors::Result<Vec<String>>,
    warnings: usize,
) -> PipelineReport {
    let elapsed = started.elapsed();
    match outcome {
        Ok(artifacts) => {
            info!(pipeline = %kind, ?artifacts, elapsed_ms = elapsed.as_millis() as u64, "build finished");
            ctx.hub.publish();
            PipelineReport {
                kind,
                status: BuildStatus::Succeeded,
                artifacts,
                warnings,
                errors: 0,
                elapsed,
            }
        }
        Err(err) => {
            error!(pipeline = %kind, error = %err, elapsed_ms = elapsed.as_millis() as u64, "build failed");
            PipelineReport {
                kind,
                status: BuildStatus::Failed,
                artifacts: Vec::new(),
                warnings,
                errors: 1,
                elapsed,
            }
        }
    }
}

/// Make a bundle source path readable in browser devtools.
///
/// `node_modules/...` becomes `../node_modules/...`, paths under
/// `tree_prefix` (e.g. `client/js/`) lose that prefix, anything else is
/// returned as is.
pub fn rewrite_source_path(source: &str, tree_prefix: &str) -> String {
    if source.starts_with("node_modules") {
        format!("../{source}")
    } else if let Some(rest) = source.strip_prefix(tree_prefix) {
        rest.to_string()
    } else {
        source.to_string()
    }
}

/// `/`-separated path of `path` relative to `root`, without a leading slash.
///
/// Paths outside `root` are returned unchanged.
pub(crate) fn project_relative(root: &Path, path: &Path) -> String {
    if path.strip_prefix(root).is_err() {
        return path.to_string_lossy().into_owned();
    }
    crate::resolve::module_key(root, path)
        .trim_start_matches('/')
        .to_string()
}
