// src/pipeline/graph.rs

//! Script module graph and the incremental cache behind it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use regex::Regex;
use tracing::debug;

use crate::errors::Result;
use crate::pipeline::{project_relative, ChangeSet};
use crate::sourcemap::{SourceMap, SourceMapBuilder, INPUT_SOURCE};

static REQUEST_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"\brequire\s*\(\s*["']([^"']+)["']\s*\)"#,
        r#"(?m)^\s*import\s+(?:[^"';]*?\s+from\s+)?["']([^"']+)["']"#,
        r#"(?m)^\s*export\s+[^"';]*?\s+from\s+["']([^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid request pattern {p}: {e}")))
    .collect()
});

/// Module specifiers requested by `code`, in first-seen source order.
pub fn scan_requests(code: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = REQUEST_RES
        .iter()
        .flat_map(|re| {
            re.captures_iter(code)
                .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);

    let mut out: Vec<String> = Vec::new();
    for (_, spec) in found {
        if !out.contains(&spec) {
            out.push(spec);
        }
    }
    out
}

/// What a request inside a module turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Module(PathBuf),
    /// Not inlined; read from this global variable at runtime.
    External(String),
}

#[derive(Debug, Clone)]
pub struct CachedModule {
    pub hash: blake3::Hash,
    /// Original file text, embedded as `sourcesContent`.
    pub source: String,
    /// Transpiled text that goes into the bundle.
    pub code: String,
    /// Transpiled → original, or `None` when lines match one to one.
    pub map: Option<SourceMap>,
    pub requests: Vec<String>,
    /// Requests already resolved, by request string.
    pub resolved: BTreeMap<String, Dependency>,
}

/// Per-pipeline incremental cache.
///
/// Owned by exactly one JS pipeline and dropped with it.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<PathBuf, CachedModule>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&CachedModule> {
        self.modules.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut CachedModule> {
        self.modules.get_mut(path)
    }

    pub fn insert(&mut self, path: PathBuf, module: CachedModule) {
        self.modules.insert(path, module);
    }

    /// Drop what `changes` makes stale: changed modules, and every resolved
    /// request when files were created or removed.
    pub fn invalidate(&mut self, changes: &ChangeSet) {
        for path in &changes.paths {
            if self.modules.remove(path).is_some() {
                debug!(?path, "invalidated cached module");
            }
        }
        if changes.structural {
            for module in self.modules.values_mut() {
                module.resolved.clear();
            }
            debug!("file tree changed; cleared cached resolutions");
        }
    }

    /// Evict every module `keep` rejects, returning how many went.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) -> usize {
        let before = self.modules.len();
        self.modules.retain(|path, _| keep(path));
        before - self.modules.len()
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleNode {
    File(PathBuf),
    External { specifier: String, global: String },
}

/// Dependency graph of one bundle, rooted at the entry.
#[derive(Debug)]
pub struct ModuleGraph {
    graph: DiGraph<ModuleNode, String>,
    index: HashMap<ModuleNode, NodeIndex>,
    entry: NodeIndex,
}

impl ModuleGraph {
    pub fn new(entry: PathBuf) -> Self {
        let mut graph = DiGraph::new();
        let node = ModuleNode::File(entry);
        let entry = graph.add_node(node.clone());
        let mut index = HashMap::new();
        index.insert(node, entry);
        Self { graph, index, entry }
    }

    pub fn add_node(&mut self, node: ModuleNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, request: &str) {
        self.graph.add_edge(from, to, request.to_string());
    }

    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Dependencies before dependents, entry last.
    pub fn emission_order(&self) -> Vec<NodeIndex> {
        let mut dfs = DfsPostOrder::new(&self.graph, self.entry);
        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(idx) = dfs.next(&self.graph) {
            order.push(idx);
        }
        order
    }

    /// Files of the graph, in emission order.
    pub fn files(&self) -> Vec<&Path> {
        self.emission_order()
            .into_iter()
            .filter_map(|idx| match &self.graph[idx] {
                ModuleNode::File(p) => Some(p.as_path()),
                ModuleNode::External { .. } => None,
            })
            .collect()
    }

    /// Serialise into one script plus a map whose sources are
    /// root-relative paths.
    pub fn serialize(
        &self,
        cache: &ModuleCache,
        root: &Path,
        file_name: &str,
    ) -> Result<(String, SourceMap)> {
        let order = self.emission_order();
        let ids: HashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(i, idx)| (*idx, i)).collect();

        let mut out = BundleWriter::new(file_name);
        for line in PRELUDE {
            out.push(line);
        }

        for idx in &order {
            let id = ids[idx];
            out.push(&format!("{id}: [function (require, module, exports) {{"));

            match &self.graph[*idx] {
                ModuleNode::File(path) => {
                    let module = cache.get(path).ok_or_else(|| {
                        anyhow::anyhow!("module {} missing from cache", path.display())
                    })?;
                    out.push_module(&project_relative(root, path), module);
                }
                ModuleNode::External { global, .. } => {
                    let global = serde_json::to_string(global)?;
                    out.push(&format!("module.exports = window[{global}];"));
                }
            }

            let deps: BTreeMap<&str, usize> = self
                .graph
                .edges(*idx)
                .map(|e| (e.weight().as_str(), ids[&e.target()]))
                .collect();
            out.push(&format!("}}, {}],", serde_json::to_string(&deps)?));
        }

        out.push(&format!("}}, {});", ids[&self.entry]));
        Ok(out.finish())
    }
}

const PRELUDE: [&str; 11] = [
    "(function (modules, entry) {",
    "  var cache = {};",
    "  function load(id) {",
    "    if (cache[id]) return cache[id].exports;",
    "    var module = cache[id] = { exports: {} };",
    "    var deps = modules[id][1];",
    "    modules[id][0].call(module.exports, function (name) { return load(deps[name]); }, module, module.exports);",
    "    return module.exports;",
    "  }",
    "  load(entry);",
    "})({",
];

struct BundleWriter {
    out: String,
    line: u32,
    builder: SourceMapBuilder,
}

impl BundleWriter {
    fn new(file_name: &str) -> Self {
        Self {
            out: String::new(),
            line: 0,
            builder: SourceMapBuilder::new(Some(file_name)),
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
        self.line += 1;
    }

    fn push_module(&mut self, key: &str, module: &CachedModule) {
        let source = self.builder.add_source(key, Some(&module.source));
        for (i, text) in module.code.lines().enumerate() {
            let original = match &module.map {
                None => Some((i as u32, 0)),
                Some(map) => map
                    .lookup(i as u32, 0)
                    .filter(|pos| pos.source == INPUT_SOURCE)
                    .map(|pos| (pos.line, pos.column)),
            };
            if let Some((line, column)) = original {
                self.builder.add_mapping(self.line, 0, source, line, column);
            }
            self.push(text);
        }
    }

    fn finish(mut self) -> (String, SourceMap) {
        self.builder.pad_lines(self.line as usize);
        (self.out, self.builder.build())
    }
}
