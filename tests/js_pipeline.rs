// tests/js_pipeline.rs

use std::error::Error;
use std::sync::Arc;

use ipack::pipeline::{BuildStatus, ChangeSet, JsPipeline, Pipeline};
use ipack::sourcemap::SourceMap;
use ipack::types::{BuildFlags, PipelineKind};
use ipack_test_utils::{init_tracing, MemorySink, TempProject};

type TestResult = Result<(), Box<dyn Error>>;

const INDEX: &str = "const greet = require('./greet');\nconst $ = require('jq');\ngreet.hello($);\n";
const GREET: &str = "exports.hello = function ($) {\n    return $;\n};\n";

fn sample_project() -> TempProject {
    let p = TempProject::new();
    p.package_json(r#"{ "alias": { "jq": "jquery" }, "externals": { "jquery": "$" } }"#)
        .write("client/js/index.ts", INDEX)
        .write("client/js/greet.ts", GREET);
    p
}

fn line_of(code: &str, needle: &str) -> u32 {
    code.lines()
        .position(|l| l.contains(needle))
        .unwrap_or_else(|| panic!("{needle:?} not in bundle")) as u32
}

#[tokio::test]
async fn bundles_graph_with_alias_and_externals() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    let report = js.build(&ChangeSet::full()).await;
    assert_eq!(report.kind, PipelineKind::Js);
    assert_eq!(report.status, BuildStatus::Succeeded);
    assert_eq!(report.artifacts, vec!["js/ipack.js".to_string()]);

    let artifact = sink.get("js/ipack.js").ok_or("no bundle")?;
    let code = artifact.text().into_owned();
    assert!(code.contains("exports.hello = function ($) {"));
    assert!(code.contains(r#"module.exports = window["$"];"#));
    assert!(code.contains(r#""./greet":"#));
    assert!(code.ends_with("//# sourceMappingURL=ipack.js.map\n"));

    // The external is not read from disk and jquery is not a file module.
    assert_eq!(js.last_stats().modules, 2);
    assert_eq!(js.cache().len(), 2);

    let map = artifact.map.ok_or("no map")?;
    assert_eq!(map.file.as_deref(), Some("ipack.js"));
    assert!(map.sources.contains(&"index.ts".to_string()));
    assert!(map.sources.contains(&"greet.ts".to_string()));

    let pos = map.lookup(line_of(&code, "greet.hello($);"), 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("index.ts", 2));
    let pos = map.lookup(line_of(&code, "return $;"), 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("greet.ts", 1));

    let idx = map.sources.iter().position(|s| s == "index.ts").ok_or("no index source")?;
    assert_eq!(map.sources_content[idx].as_deref(), Some(INDEX));
    Ok(())
}

#[tokio::test]
async fn production_bundle_is_minified_and_still_mapped() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let flags = BuildFlags {
        production: true,
        ..BuildFlags::default()
    };
    let mut js = JsPipeline::new(p.context(flags, Arc::new(sink.clone())));

    let report = js.build(&ChangeSet::full()).await;
    assert_eq!(report.status, BuildStatus::Succeeded);

    let artifact = sink.get("js/ipack.js").ok_or("no bundle")?;
    let code = artifact.text().into_owned();
    assert!(!code.contains("    return $;"), "indentation is stripped");
    assert!(code.contains("\nreturn $;\n"));

    let map = artifact.map.ok_or("no map")?;
    let pos = map.lookup(line_of(&code, "return $;"), 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("greet.ts", 1));
    Ok(())
}

#[tokio::test]
async fn dependency_sources_are_rewritten_relative() -> TestResult {
    init_tracing();
    let p = TempProject::new();
    p.package("tiny", r#"{ "main": "tiny.js" }"#, &[("tiny.js", "module.exports = 1;\n")])
        .write("client/js/index.ts", "require('tiny');\n");
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    assert_eq!(js.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    let map = sink.get("js/ipack.js").and_then(|a| a.map).ok_or("no map")?;
    assert!(map.sources.contains(&"../node_modules/tiny/tiny.js".to_string()));
    assert!(map.sources.contains(&"index.ts".to_string()));
    Ok(())
}

#[tokio::test]
async fn missing_entry_is_a_quiet_no_op() {
    init_tracing();
    let p = TempProject::new();
    p.write("client/css/index.scss", "a {}\n");
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    assert!(js.entry_missing());
    assert!(js.watch_spec().is_none());
    for _ in 0..2 {
        let report = js.build(&ChangeSet::full()).await;
        assert_eq!(report.status, BuildStatus::Skipped);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.errors, 0);
        assert!(!report.is_failure());
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn watched_rebuilds_reuse_the_module_cache() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    js.build(&ChangeSet::full()).await;
    let first = js.last_stats();
    assert_eq!((first.transpiled, first.reused), (2, 0));

    // One changed file: only that one is read and transpiled again.
    p.write("client/js/greet.ts", "exports.hello = function ($) { return 42; };\n");
    let report = js.build(&ChangeSet::paths([p.path("client/js/greet.ts")])).await;
    assert_eq!(report.status, BuildStatus::Succeeded);
    let second = js.last_stats();
    assert_eq!((second.transpiled, second.reused), (1, 1));
    assert!(sink.get("js/ipack.js").ok_or("no bundle")?.text().contains("return 42;"));

    // A full rebuild of an unchanged tree re-hashes but transpiles nothing.
    js.build(&ChangeSet::full()).await;
    let third = js.last_stats();
    assert_eq!((third.transpiled, third.reused), (0, 2));
    Ok(())
}

#[tokio::test]
async fn new_dependency_is_picked_up_on_rebuild() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));
    js.build(&ChangeSet::full()).await;

    p.write("client/js/extra.ts", "exports.extra = true;\n");
    p.write("client/js/index.ts", &format!("{INDEX}require('./extra');\n"));
    let mut changes = ChangeSet::paths([p.path("client/js/index.ts"), p.path("client/js/extra.ts")]);
    changes.structural = true;

    let report = js.build(&changes).await;
    assert_eq!(report.status, BuildStatus::Succeeded);
    assert_eq!(js.last_stats().modules, 3);
    assert!(sink.get("js/ipack.js").ok_or("no bundle")?.text().contains("exports.extra = true;"));
    Ok(())
}

#[tokio::test]
async fn failed_build_keeps_the_previous_artifact() -> TestResult {
    init_tracing();
    let p = sample_project();
    let mut js = JsPipeline::new(p.output_context(BuildFlags::default()));

    assert_eq!(js.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    let good = p.read("wwwroot/js/ipack.js");
    let good_map = p.read("wwwroot/js/ipack.js.map");
    SourceMap::from_json(&good_map)?;

    p.write("client/js/index.ts", "require('./does-not-exist');\n");
    let report = js.build(&ChangeSet::paths([p.path("client/js/index.ts")])).await;
    assert_eq!(report.status, BuildStatus::Failed);
    assert_eq!(report.errors, 1);
    assert!(report.artifacts.is_empty());

    assert_eq!(p.read("wwwroot/js/ipack.js"), good);
    assert_eq!(p.read("wwwroot/js/ipack.js.map"), good_map);
    Ok(())
}

#[tokio::test]
async fn successful_build_publishes_build_done() {
    init_tracing();
    let p = sample_project();
    let ctx = p.context(BuildFlags::default(), Arc::new(MemorySink::new()));
    let mut rx = ctx.hub.subscribe();
    let mut js = JsPipeline::new(ctx);

    js.build(&ChangeSet::full()).await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn sources_outside_the_project_keep_their_absolute_path() -> TestResult {
    init_tracing();
    let p = TempProject::new();
    let parent = p.root().parent().ok_or("temp root has no parent")?;
    let shared = tempfile::tempdir_in(parent)?;
    let shared_dir = shared.path().canonicalize()?;
    std::fs::write(shared_dir.join("x.js"), "module.exports = 'shared';\n")?;
    let shared_name = shared_dir.file_name().ok_or("no dir name")?.to_string_lossy().into_owned();

    p.write("client/js/index.ts", &format!("require('../../../{shared_name}/x');\n"));
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    assert_eq!(js.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    let map = sink.get("js/ipack.js").and_then(|a| a.map).ok_or("no map")?;
    let expected = shared_dir.join("x.js").to_string_lossy().into_owned();
    assert!(map.sources.contains(&expected), "sources: {:?}", map.sources);
    assert!(map.sources.contains(&"index.ts".to_string()));
    Ok(())
}

#[tokio::test]
async fn modules_dropped_from_the_graph_leave_the_cache() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    js.build(&ChangeSet::full()).await;
    assert_eq!(js.cache().len(), 2);

    p.write("client/js/index.ts", "const $ = require('jq');\n$.ready = true;\n");
    let report = js.build(&ChangeSet::paths([p.path("client/js/index.ts")])).await;
    assert_eq!(report.status, BuildStatus::Succeeded);
    assert_eq!(js.last_stats().modules, 1);
    assert_eq!(js.cache().len(), 1);
    assert!(!sink.get("js/ipack.js").ok_or("no bundle")?.text().contains("exports.hello"));
    Ok(())
}

#[tokio::test]
async fn es_module_sources_bundle_as_commonjs() -> TestResult {
    init_tracing();
    let p = TempProject::new();
    p.write("client/js/index.ts", "import { hello } from './greet';\nhello();\n")
        .write("client/js/greet.ts", "export function hello() {\n  return 1;\n}\n");
    let sink = MemorySink::new();
    let mut js = JsPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    assert_eq!(js.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    assert_eq!(js.last_stats().modules, 2);

    let artifact = sink.get("js/ipack.js").ok_or("no bundle")?;
    let code = artifact.text().into_owned();
    assert!(code.contains(r#"var hello = __import1.hello;"#));
    assert!(code.contains("exports.hello = hello;"));
    assert!(!code.lines().any(|l| {
        let l = l.trim_start();
        l.starts_with("import ") || l.starts_with("export ")
    }));

    let map = artifact.map.ok_or("no map")?;
    let pos = map.lookup(line_of(&code, "hello();"), 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("index.ts", 1));
    let pos = map.lookup(line_of(&code, "return 1;"), 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("greet.ts", 1));
    Ok(())
}
