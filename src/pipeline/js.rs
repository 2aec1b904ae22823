// src/pipeline/js.rs

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::output::BuildArtifact;
use crate::pipeline::graph::{scan_requests, CachedModule, Dependency, ModuleCache, ModuleGraph, ModuleNode};
use crate::pipeline::{finish, rewrite_source_path, ChangeSet, Pipeline, PipelineContext, PipelineReport};
use crate::resolve::{ResolutionCache, Resolver, ResolverOptions};
use crate::sourcemap::compose;
use crate::transform::{BoxFuture, CodeKind};
use crate::types::PipelineKind;
use crate::watch::WatchSpec;

/// Counters for the most recent graph build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub modules: usize,
    /// Modules read and transpiled during this build.
    pub transpiled: usize,
    /// Modules taken from the cache as they were.
    pub reused: usize,
}

/// Bundles the script tree rooted at `<input>/js/index.ts`.
///
/// Holds a [`ModuleCache`] for its whole lifetime, so watch rebuilds only
/// re-read and re-transpile the files that changed.
pub struct JsPipeline {
    ctx: PipelineContext,
    resolver: Resolver,
    cache: ModuleCache,
    entry: PathBuf,
    entry_missing: bool,
    last_stats: GraphStats,
}

impl std::fmt::Debug for JsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsPipeline")
            .field("entry", &self.entry)
            .field("entry_missing", &self.entry_missing)
            .field("cached_modules", &self.cache.len())
            .finish()
    }
}

impl JsPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let entry = ctx.settings.js_entry();
        let entry_missing = !ctx.fs.is_file(&entry);
        if entry_missing {
            warn!(entry = %entry.display(), "JS entry was not found; skipping JS build");
        }
        let resolver = Resolver::new(
            ctx.settings.root(),
            ResolverOptions::for_bundle(),
            ctx.fs.clone(),
        );
        Self {
            ctx,
            resolver,
            cache: ModuleCache::new(),
            entry,
            entry_missing,
            last_stats: GraphStats::default(),
        }
    }

    pub fn entry_missing(&self) -> bool {
        self.entry_missing
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    pub fn last_stats(&self) -> GraphStats {
        self.last_stats
    }

    fn resolve_request(
        &self,
        request: &str,
        dir: &Path,
        run_cache: &mut ResolutionCache,
    ) -> Result<Dependency> {
        let settings = &self.ctx.settings;
        if let Some(global) = settings.externals().get(request) {
            return Ok(Dependency::External(global.clone()));
        }
        let target = settings
            .alias()
            .get(request)
            .map(String::as_str)
            .unwrap_or(request);
        if let Some(global) = settings.externals().get(target) {
            return Ok(Dependency::External(global.clone()));
        }
        let path = self.resolver.resolve_cached(run_cache, target, dir)?;
        Ok(Dependency::Module(path))
    }

    /// Make sure `path` is in the cache and current.
    ///
    /// Cached modules are trusted as-is unless `revalidate` is set, in which
    /// case they are re-read and compared by content hash.
    async fn ensure_loaded(&mut self, path: &Path, revalidate: bool, stats: &mut GraphStats) -> Result<()> {
        if self.cache.get(path).is_some() && !revalidate {
            stats.reused += 1;
            return Ok(());
        }

        let source = self.ctx.fs.read_to_string(path)?;
        let hash = blake3::hash(source.as_bytes());
        if self.cache.get(path).is_some_and(|m| m.hash == hash) {
            stats.reused += 1;
            return Ok(());
        }

        debug!(path = %path.display(), "transpiling module");
        let out = self.ctx.toolchain.transpiler.transpile(path, &source).await?;
        let requests = scan_requests(&out.code);
        self.cache.insert(
            path.to_path_buf(),
            CachedModule {
                hash,
                source,
                code: out.code,
                map: out.map,
                requests,
                resolved: Default::default(),
            },
        );
        stats.transpiled += 1;
        Ok(())
    }

    async fn build_graph(&mut self, changes: &ChangeSet) -> Result<ModuleGraph> {
        self.cache.invalidate(changes);

        let mut stats = GraphStats::default();
        let mut run_cache = ResolutionCache::new();
        let mut graph = ModuleGraph::new(self.entry.clone());
        let mut queue = VecDeque::from([self.entry.clone()]);
        let mut visited = HashSet::new();

        while let Some(path) = queue.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }
            self.ensure_loaded(&path, changes.is_full(), &mut stats).await?;

            let (requests, known) = {
                let module = self
                    .cache
                    .get(&path)
                    .ok_or_else(|| anyhow!("module {} missing from cache", path.display()))?;
                (module.requests.clone(), module.resolved.clone())
            };
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let from = graph.add_node(ModuleNode::File(path.clone()));

            let mut fresh = Vec::new();
            for request in requests {
                let dep = match known.get(&request) {
                    Some(dep) => dep.clone(),
                    None => {
                        let dep = self.resolve_request(&request, &dir, &mut run_cache)?;
                        fresh.push((request.clone(), dep.clone()));
                        dep
                    }
                };

                let node = match dep {
                    Dependency::Module(target) => {
                        queue.push_back(target.clone());
                        ModuleNode::File(target)
                    }
                    Dependency::External(global) => ModuleNode::External {
                        specifier: request.clone(),
                        global,
                    },
                };
                let to = graph.add_node(node);
                graph.add_edge(from, to, &request);
            }

            if let Some(module) = self.cache.get_mut(&path) {
                module.resolved.extend(fresh);
            }
        }

        let evicted = self.cache.retain(|path| visited.contains(path));
        if evicted > 0 {
            debug!(evicted, "dropped modules no longer in the graph");
        }

        stats.modules = visited.len();
        self.last_stats = stats;
        debug!(?stats, "module graph built");
        Ok(graph)
    }

    async fn run(&mut self, changes: &ChangeSet) -> Result<Vec<String>> {
        let graph = self.build_graph(changes).await?;

        let settings = self.ctx.settings.clone();
        let file_name = settings.js_out();
        let (bundle, mut map) = graph.serialize(&self.cache, settings.root(), file_name)?;

        let tree_prefix = format!("{}/js/", settings.input());
        map.map_sources(|s| rewrite_source_path(s, &tree_prefix));

        let finished = self
            .ctx
            .toolchain
            .finisher(self.ctx.flags.production)
            .minify(&bundle, CodeKind::Script)
            .await?;
        let mut map = match &finished.map {
            Some(stage) => compose(stage, &map),
            None => map,
        };
        map.file = Some(file_name.to_string());

        let mut code = finished.code;
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&format!("//# sourceMappingURL={file_name}.map\n"));

        let artifact = BuildArtifact::new(settings.js_artifact_path(), code, Some(map));
        let path = artifact.path.clone();
        self.ctx.sink.emit(artifact).await?;
        Ok(vec![path])
    }
}

impl Pipeline for JsPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Js
    }

    fn watch_spec(&self) -> Option<WatchSpec> {
        if self.entry_missing {
            return None;
        }
        Some(WatchSpec::new(
            PipelineKind::Js,
            self.ctx.settings.input_js_folder(),
            self.ctx.settings.js_watch_globs(),
        ))
    }

    fn build<'a>(&'a mut self, changes: &'a ChangeSet) -> BoxFuture<'a, PipelineReport> {
        Box::pin(async move {
            if self.entry_missing {
                return PipelineReport::skipped(PipelineKind::Js, 1);
            }
            info!(entry = %self.entry.display(), "compiling JS");
            let started = Instant::now();
            let outcome = self.run(changes).await;
            finish(&self.ctx, PipelineKind::Js, started, outcome, 0)
        })
    }
}
