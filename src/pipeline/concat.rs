// src/pipeline/concat.rs

use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{BuildTarget, ConfigWarning};
use crate::errors::{IpackError, Result};
use crate::output::BuildArtifact;
use crate::pipeline::{finish, BuildStatus, ChangeSet, Pipeline, PipelineContext, PipelineReport};
use crate::resolve::{ResolvedModule, Resolver, ResolverOptions};
use crate::sourcemap::{compose, line_count, SourceMapBuilder};
use crate::transform::{BoxFuture, CodeKind};
use crate::types::PipelineKind;
use crate::watch::WatchSpec;

/// `sourceRoot` of every concat map.
pub const CONCAT_SOURCE_ROOT: &str = "ipack://";

/// Concatenates third-party modules into one file per named target.
///
/// Targets are built concurrently and fail independently. The pipeline is
/// never watched.
pub struct ConcatPipeline {
    ctx: PipelineContext,
    resolver: Resolver,
    targets: Vec<BuildTarget>,
    warnings: Vec<ConfigWarning>,
}

impl std::fmt::Debug for ConcatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcatPipeline")
            .field("targets", &self.targets)
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl ConcatPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let (targets, warnings) = ctx.settings.concat_targets();
        let resolver = Resolver::new(
            ctx.settings.root(),
            ResolverOptions::for_concat(),
            ctx.fs.clone(),
        );
        Self {
            ctx,
            resolver,
            targets,
            warnings,
        }
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }
}

/// Resolve every module of `target` concurrently and return them in the
/// declared order.
async fn resolve_all(resolver: &Resolver, target: &BuildTarget) -> Result<Vec<ResolvedModule>> {
    let mut set = JoinSet::new();
    for (i, spec) in target.modules.iter().enumerate() {
        let resolver = resolver.clone();
        let spec = spec.clone();
        set.spawn_blocking(move || {
            let root = resolver.root().to_path_buf();
            (i, resolver.resolve_module(&spec, &root))
        });
    }

    let mut slots: Vec<Option<ResolvedModule>> = vec![None; target.modules.len()];
    while let Some(joined) = set.join_next().await {
        let (i, resolved) = joined.map_err(anyhow::Error::from)?;
        slots[i] = Some(resolved?);
    }
    Ok(slots.into_iter().flatten().collect())
}

async fn build_target(ctx: PipelineContext, resolver: Resolver, target: BuildTarget) -> Result<String> {
    let modules = resolve_all(&resolver, &target).await?;

    let mut text = String::new();
    let mut builder = SourceMapBuilder::new(Some(&target.file_name)).source_root(CONCAT_SOURCE_ROOT);
    let mut line = 0u32;
    for module in &modules {
        let content = ctx.fs.read_to_string(&module.path)?;
        let source = builder.add_source(&module.key, Some(&content));
        builder.add_line_run(line, source, 0, line_count(&content));
        line += content.matches('\n').count() as u32 + 1;
        text.push_str(&content);
        text.push('\n');
    }
    builder.pad_lines(line as usize);

    let finished = ctx
        .toolchain
        .finisher(ctx.flags.production)
        .minify(&text, CodeKind::Script)
        .await
        .map_err(|e| IpackError::transform("concat minify", format!("{}: {e}", target.name)))?;
    let mut code = finished.code;

    let map = if ctx.flags.source_map {
        let base = builder.build();
        let mut map = match &finished.map {
            Some(stage) => compose(stage, &base),
            None => base,
        };
        map.file = Some(target.file_name.clone());
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&format!("//# sourceMappingURL={}.map\n", target.file_name));
        Some(map)
    } else {
        None
    };

    let artifact = BuildArtifact::new(format!("js/{}", target.file_name), code, map);
    let path = artifact.path.clone();
    ctx.sink.emit(artifact).await?;
    Ok(path)
}

impl Pipeline for ConcatPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Concat
    }

    fn watch_spec(&self) -> Option<WatchSpec> {
        None
    }

    fn build<'a>(&'a mut self, _changes: &'a ChangeSet) -> BoxFuture<'a, PipelineReport> {
        Box::pin(async move {
            let warnings = self.warnings.len();
            if self.targets.is_empty() {
                return PipelineReport::skipped(PipelineKind::Concat, warnings);
            }

            info!(targets = self.targets.len(), "concatenating targets");
            let started = Instant::now();
            let mut set = JoinSet::new();
            for (i, target) in self.targets.iter().enumerate() {
                let fut = build_target(self.ctx.clone(), self.resolver.clone(), target.clone());
                set.spawn(async move { (i, fut.await) });
            }

            let mut slots: Vec<Option<String>> = vec![None; self.targets.len()];
            let mut failed = 0usize;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((i, Ok(path))) => slots[i] = Some(path),
                    Ok((i, Err(err))) => {
                        failed += 1;
                        error!(target_name = %self.targets[i].name, error = %err, "concat target failed");
                    }
                    Err(err) => {
                        failed += 1;
                        error!(error = %err, "concat target task aborted");
                    }
                }
            }
            let artifacts: Vec<String> = slots.into_iter().flatten().collect();

            if failed == 0 {
                return finish(&self.ctx, PipelineKind::Concat, started, Ok(artifacts), warnings);
            }

            warn!(failed, succeeded = artifacts.len(), "some concat targets failed");
            if !artifacts.is_empty() {
                self.ctx.hub.publish();
            }
            PipelineReport {
                kind: PipelineKind::Concat,
                status: BuildStatus::Failed,
                artifacts,
                warnings,
                errors: failed,
                elapsed: started.elapsed(),
            }
        })
    }
}
