// src/pipeline/css.rs

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::output::BuildArtifact;
use crate::pipeline::{finish, project_relative, rewrite_source_path, ChangeSet, Pipeline, PipelineContext, PipelineReport};
use crate::sourcemap::compose;
use crate::transform::{BoxFuture, CodeKind, POSTCSS_PLACEHOLDER};
use crate::types::PipelineKind;
use crate::watch::WatchSpec;

/// Folder the post-processor's own lines are filed under in the map.
const POSTCSS_SOURCE_FOLDER: &str = "__PostCSS";

/// Compiles `<input>/css/index.scss`, post-processes it and emits
/// `css/<cssOut>` with its map.
pub struct CssPipeline {
    ctx: PipelineContext,
    entry: PathBuf,
    entry_missing: bool,
}

impl std::fmt::Debug for CssPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CssPipeline")
            .field("entry", &self.entry)
            .field("entry_missing", &self.entry_missing)
            .finish()
    }
}

impl CssPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let entry = ctx.settings.css_entry();
        let entry_missing = !ctx.fs.is_file(&entry);
        if entry_missing {
            warn!(entry = %entry.display(), "CSS entry was not found; skipping CSS build");
        }
        Self {
            ctx,
            entry,
            entry_missing,
        }
    }

    pub fn entry_missing(&self) -> bool {
        self.entry_missing
    }

    fn map_source_name(root: &Path, tree_prefix: &str, source: &str) -> String {
        if source == POSTCSS_PLACEHOLDER {
            return format!("{POSTCSS_SOURCE_FOLDER}/{POSTCSS_PLACEHOLDER}");
        }
        let path = Path::new(source);
        let relative = if path.is_absolute() {
            project_relative(root, path)
        } else {
            source.to_string()
        };
        rewrite_source_path(&relative, tree_prefix)
    }

    async fn run(&self) -> Result<Vec<String>> {
        let toolchain = &self.ctx.toolchain;
        let settings = &self.ctx.settings;

        let compiled = toolchain.style.compile(&self.entry).await?;
        debug!(files = compiled.files.len(), "stylesheet compiled");
        let mut code = compiled.code;
        let mut map = compiled.map;

        for stage in &toolchain.post_processors {
            let out = stage.process(&code).await?;
            if let Some(stage_map) = &out.map {
                map = compose(stage_map, &map);
            }
            code = out.code;
        }

        let finished = toolchain
            .finisher(self.ctx.flags.production)
            .minify(&code, CodeKind::Style)
            .await?;
        if let Some(stage_map) = &finished.map {
            map = compose(stage_map, &map);
        }
        let mut code = finished.code;

        let file_name = settings.css_out();
        let tree_prefix = format!("{}/css/", settings.input());
        let root = settings.root().to_path_buf();
        map.map_sources(|s| Self::map_source_name(&root, &tree_prefix, s));
        map.file = Some(file_name.to_string());

        if !code.is_empty() && !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&format!("/*# sourceMappingURL={file_name}.map */\n"));

        let artifact = BuildArtifact::new(settings.css_artifact_path(), code, Some(map));
        let path = artifact.path.clone();
        self.ctx.sink.emit(artifact).await?;
        Ok(vec![path])
    }
}

impl Pipeline for CssPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Css
    }

    fn watch_spec(&self) -> Option<WatchSpec> {
        if self.entry_missing {
            return None;
        }
        Some(WatchSpec::new(
            PipelineKind::Css,
            self.ctx.settings.input_css_folder(),
            self.ctx.settings.css_watch_globs(),
        ))
    }

    /// The stylesheet is always recompiled in full; `changes` only says
    /// that something in the tree moved.
    fn build<'a>(&'a mut self, _changes: &'a ChangeSet) -> BoxFuture<'a, PipelineReport> {
        Box::pin(async move {
            if self.entry_missing {
                return PipelineReport::skipped(PipelineKind::Css, 1);
            }
            info!(entry = %self.entry.display(), "compiling CSS");
            let started = Instant::now();
            let outcome = self.run().await;
            finish(&self.ctx, PipelineKind::Css, started, outcome, 0)
        })
    }
}
