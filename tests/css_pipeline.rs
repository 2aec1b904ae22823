// tests/css_pipeline.rs

use std::error::Error;
use std::sync::Arc;

use ipack::pipeline::{BuildStatus, ChangeSet, CssPipeline, Pipeline};
use ipack::types::{BuildFlags, PipelineKind};
use ipack_test_utils::{init_tracing, MemorySink, TempProject};

type TestResult = Result<(), Box<dyn Error>>;

fn sample_project() -> TempProject {
    let p = TempProject::new();
    p.write(
        "client/css/index.scss",
        "@import \"base\";\n@import \"~theme/colors\";\n.box {\n  user-select: none;\n}\n",
    )
    .write("client/css/_base.scss", "body { margin: 0; }\n")
    .package("theme", "{}", &[("colors.scss", ".red { color: red; }\n")]);
    p
}

#[tokio::test]
async fn compiles_prefixes_and_maps_stylesheets() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let mut css = CssPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    let report = css.build(&ChangeSet::full()).await;
    assert_eq!(report.kind, PipelineKind::Css);
    assert_eq!(report.status, BuildStatus::Succeeded);
    assert_eq!(report.artifacts, vec!["css/ipack.css".to_string()]);

    let artifact = sink.get("css/ipack.css").ok_or("no stylesheet")?;
    let code = artifact.text().into_owned();
    assert_eq!(
        code,
        "body { margin: 0; }\n.red { color: red; }\n.box {\n  -webkit-user-select: none;\n  -moz-user-select: none;\n  -ms-user-select: none;\n  user-select: none;\n}\n/*# sourceMappingURL=ipack.css.map */\n"
    );

    let map = artifact.map.ok_or("no map")?;
    assert_eq!(map.file.as_deref(), Some("ipack.css"));

    let pos = map.lookup(0, 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("_base.scss", 0));
    let pos = map.lookup(1, 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("../node_modules/theme/colors.scss", 0));
    let pos = map.lookup(3, 0).ok_or("unmapped")?;
    assert_eq!(pos.source, "__PostCSS/site.css");
    let pos = map.lookup(6, 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("index.scss", 3));

    assert!(!map.sources.iter().any(|s| s == "site.css"));
    Ok(())
}

#[tokio::test]
async fn production_stylesheet_is_minified() -> TestResult {
    init_tracing();
    let p = sample_project();
    let sink = MemorySink::new();
    let flags = BuildFlags {
        production: true,
        ..BuildFlags::default()
    };
    let mut css = CssPipeline::new(p.context(flags, Arc::new(sink.clone())));

    assert_eq!(css.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    let artifact = sink.get("css/ipack.css").ok_or("no stylesheet")?;
    assert!(artifact.text().contains("\nuser-select: none;\n"));

    let map = artifact.map.ok_or("no map")?;
    let pos = map.lookup(6, 0).ok_or("unmapped")?;
    assert_eq!((pos.source, pos.line), ("index.scss", 3));
    Ok(())
}

#[tokio::test]
async fn broken_import_fails_only_this_build() -> TestResult {
    init_tracing();
    let p = sample_project();
    let mut css = CssPipeline::new(p.output_context(BuildFlags::default()));
    assert_eq!(css.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    let good = p.read("wwwroot/css/ipack.css");

    p.write("client/css/index.scss", "@import \"gone\";\n");
    let report = css.build(&ChangeSet::full()).await;
    assert_eq!(report.status, BuildStatus::Failed);
    assert_eq!(p.read("wwwroot/css/ipack.css"), good);

    // Fixing the file recovers on the next trigger.
    p.write("client/css/index.scss", ".ok {}\n");
    assert_eq!(css.build(&ChangeSet::full()).await.status, BuildStatus::Succeeded);
    assert!(p.read("wwwroot/css/ipack.css").starts_with(".ok {}\n"));
    Ok(())
}

#[tokio::test]
async fn missing_stylesheet_entry_is_skipped() {
    init_tracing();
    let p = TempProject::new();
    let sink = MemorySink::new();
    let mut css = CssPipeline::new(p.context(BuildFlags::default(), Arc::new(sink.clone())));

    assert!(css.entry_missing());
    assert!(css.watch_spec().is_none());
    let report = css.build(&ChangeSet::full()).await;
    assert_eq!(report.status, BuildStatus::Skipped);
    assert_eq!(report.warnings, 1);
    assert!(sink.is_empty());
}

#[test]
fn watch_scope_is_the_stylesheet_tree() {
    let p = sample_project();
    let css = CssPipeline::new(p.context(BuildFlags::default(), Arc::new(MemorySink::new())));
    let spec = css.watch_spec().expect("css is watched");
    assert_eq!(spec.kind(), PipelineKind::Css);
    assert_eq!(spec.root(), p.path("client/css").as_path());
    assert_eq!(spec.globs(), &["**/*.scss".to_string(), "**/*.css".to_string()]);
}
