// src/engine/orchestrator.rs

use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::engine::gate::RebuildGate;
use crate::pipeline::{
    ChangeSet, ConcatPipeline, CssPipeline, JsPipeline, Pipeline, PipelineContext, PipelineReport,
};
use crate::types::PipelineKind;
use crate::watch::{spawn_watch, WatchSubscription, DEFAULT_DEBOUNCE};

/// Reports of one round of builds, in JS, CSS, concat order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub reports: Vec<PipelineReport>,
}

impl BuildSummary {
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(PipelineReport::is_failure)
    }

    pub fn report(&self, kind: PipelineKind) -> Option<&PipelineReport> {
        self.reports.iter().find(|r| r.kind == kind)
    }

    pub fn artifacts(&self) -> Vec<&str> {
        self.reports
            .iter()
            .flat_map(|r| r.artifacts.iter().map(String::as_str))
            .collect()
    }

    pub fn warnings(&self) -> usize {
        self.reports.iter().map(|r| r.warnings).sum()
    }

    pub fn errors(&self) -> usize {
        self.reports.iter().map(|r| r.errors).sum()
    }

    fn log(&self) {
        let artifacts = self.artifacts().len();
        if self.has_failures() {
            error!(artifacts, warnings = self.warnings(), errors = self.errors(), "build finished with errors");
        } else {
            info!(artifacts, warnings = self.warnings(), "build finished");
        }
    }
}

/// Registers the three pipelines of a run and drives them.
#[derive(Debug)]
pub struct Orchestrator {
    ctx: PipelineContext,
    debounce: Duration,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    fn pipelines(&self) -> (JsPipeline, CssPipeline, ConcatPipeline) {
        (
            JsPipeline::new(self.ctx.clone()),
            CssPipeline::new(self.ctx.clone()),
            ConcatPipeline::new(self.ctx.clone()),
        )
    }

    /// Build every pipeline once, concurrently, and wait for the slowest.
    pub async fn build_once(&self) -> BuildSummary {
        let (mut js, mut css, mut concat) = self.pipelines();
        let summary = initial_build(&mut js, &mut css, &mut concat).await;
        summary.log();
        summary
    }

    /// Build everything once, then rebuild JS and CSS on change until
    /// `shutdown` resolves. Concatenation only runs in the initial build.
    ///
    /// Returns the summary of the initial build.
    pub async fn watch<F>(&self, shutdown: F) -> BuildSummary
    where
        F: Future<Output = ()>,
    {
        let (mut js, mut css, mut concat) = self.pipelines();
        let summary = initial_build(&mut js, &mut css, &mut concat).await;
        summary.log();
        if !concat.targets().is_empty() {
            info!("concatenation targets are not watched; their output is stale until the next full run");
        }

        let (js_sub, js_rx) = self.subscribe(&js);
        let (css_sub, css_rx) = self.subscribe(&css);

        tokio::select! {
            _ = shutdown => info!("shutdown requested; stopping watch"),
            _ = async {
                tokio::join!(
                    drive_optional(&mut js, js_rx),
                    drive_optional(&mut css, css_rx),
                )
            } => debug!("all watch subscriptions ended"),
        }

        for mut sub in [js_sub, css_sub].into_iter().flatten() {
            sub.cancel();
        }
        summary
    }

    fn subscribe(
        &self,
        pipeline: &dyn Pipeline,
    ) -> (Option<WatchSubscription>, Option<mpsc::Receiver<ChangeSet>>) {
        let Some(spec) = pipeline.watch_spec() else {
            debug!(pipeline = %pipeline.kind(), "pipeline is not watched");
            return (None, None);
        };
        let (tx, rx) = mpsc::channel(16);
        match spawn_watch(spec, self.debounce, tx) {
            Ok(sub) => (Some(sub), Some(rx)),
            Err(err) => {
                error!(pipeline = %pipeline.kind(), error = %err, "failed to start watching");
                (None, None)
            }
        }
    }
}

async fn initial_build(
    js: &mut JsPipeline,
    css: &mut CssPipeline,
    concat: &mut ConcatPipeline,
) -> BuildSummary {
    let full = ChangeSet::full();
    let (js, css, concat) = tokio::join!(js.build(&full), css.build(&full), concat.build(&full));
    BuildSummary {
        reports: vec![js, css, concat],
    }
}

async fn drive_optional(pipeline: &mut dyn Pipeline, rx: Option<mpsc::Receiver<ChangeSet>>) {
    match rx {
        Some(rx) => {
            drive_pipeline(pipeline, rx).await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Rebuild `pipeline` for every change set received on `rx`, coalescing the
/// ones that arrive mid-build through a [`RebuildGate`]. Returns the number
/// of builds run once `rx` closes and nothing is pending.
pub async fn drive_pipeline(pipeline: &mut dyn Pipeline, mut rx: mpsc::Receiver<ChangeSet>) -> usize {
    let kind = pipeline.kind();
    let mut gate = RebuildGate::new(kind);

    while let Some(trigger) = rx.recv().await {
        let Some(mut changes) = gate.on_trigger(trigger) else {
            continue;
        };
        loop {
            info!(pipeline = %kind, paths = changes.paths.len(), "change detected; rebuilding");
            let report = {
                let mut build = pipeline.build(&changes);
                let mut open = true;
                loop {
                    tokio::select! {
                        report = &mut build => break report,
                        more = rx.recv(), if open => match more {
                            Some(more) => {
                                gate.on_trigger(more);
                            }
                            None => open = false,
                        },
                    }
                }
            };
            if report.is_failure() {
                warn!(pipeline = %kind, "rebuild failed; previous artifact kept, waiting for the next change");
            }
            match gate.on_finished(!report.is_failure()) {
                Some(next) => changes = next,
                None => break,
            }
        }
    }
    gate.builds_started()
}

/// Human-readable dump of the derived settings and concat targets.
pub fn describe_plan(settings: &Settings) -> String {
    let mut out = String::new();
    let rows = [
        ("root", settings.root().display().to_string()),
        ("package.json", settings.package_json().display().to_string()),
        ("node_modules", settings.npm_folder().display().to_string()),
        ("babel config", settings.babel_configuration().display().to_string()),
        ("tsconfig", settings.ts_config_json().display().to_string()),
        (".env", settings.dot_env().display().to_string()),
        ("js entry", settings.js_entry().display().to_string()),
        ("css entry", settings.css_entry().display().to_string()),
        ("js output", settings.output_js_file().display().to_string()),
        ("js chunks", settings.js_chunk_file_name()),
        ("stats", settings.stat_json_path().display().to_string()),
        ("css output", settings.output_css_file().display().to_string()),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "{label:<14}{value}");
    }

    let (targets, warnings) = settings.concat_targets();
    for target in &targets {
        let _ = writeln!(
            out,
            "{:<14}{} <- {}",
            "concat",
            settings.output_js_folder().join(&target.file_name).display(),
            target.modules.join(", ")
        );
    }
    for warning in &warnings {
        let _ = writeln!(out, "{:<14}{warning}", "warning");
    }
    out
}
