// tests/resolver.rs

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ipack::errors::IpackError;
use ipack::fs::mock::MockFileSystem;
use ipack::resolve::{module_key, normalize, ResolutionCache, Resolver, ResolverOptions};

type TestResult = Result<(), Box<dyn Error>>;

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/proj/node_modules/widget/package.json",
        r#"{ "name": "widget", "unpkg": "dist/widget.umd.js", "browser": "dist/widget.browser.js", "main": "lib/index.js" }"#,
    );
    fs.add_file("/proj/node_modules/widget/dist/widget.umd.js", "/* umd */");
    fs.add_file("/proj/node_modules/widget/dist/widget.browser.js", "/* browser */");
    fs.add_file("/proj/node_modules/widget/lib/index.js", "/* main */");
    fs.add_file("/proj/client/js/index.ts", "require('./util');");
    fs.add_file("/proj/client/js/util.ts", "");
    fs.add_file("/proj/client/js/data.json", "{}");
    fs.add_file("/proj/client/js/components/index.ts", "");
    fs
}

fn resolver(fs: &MockFileSystem, options: ResolverOptions) -> Resolver {
    Resolver::new("/proj", options, Arc::new(fs.clone()))
}

#[test]
fn main_fields_are_tried_in_order() -> TestResult {
    let fs = project();

    let concat = resolver(&fs, ResolverOptions::for_concat());
    assert_eq!(
        concat.resolve("widget", Path::new("/proj"))?,
        PathBuf::from("/proj/node_modules/widget/dist/widget.umd.js")
    );

    let bundle = resolver(&fs, ResolverOptions::for_bundle());
    assert_eq!(
        bundle.resolve("widget", Path::new("/proj"))?,
        PathBuf::from("/proj/node_modules/widget/dist/widget.browser.js")
    );
    Ok(())
}

#[test]
fn missing_main_field_target_falls_through_to_the_next_field() -> TestResult {
    let fs = project();
    fs.remove("/proj/node_modules/widget/dist/widget.umd.js");

    let concat = resolver(&fs, ResolverOptions::for_concat());
    assert_eq!(
        concat.resolve("widget", Path::new("/proj"))?,
        PathBuf::from("/proj/node_modules/widget/dist/widget.browser.js")
    );
    Ok(())
}

#[test]
fn relative_specifiers_try_extensions_then_index() -> TestResult {
    let fs = project();
    let r = resolver(&fs, ResolverOptions::for_bundle());
    let base = Path::new("/proj/client/js");

    assert_eq!(r.resolve("./util", base)?, PathBuf::from("/proj/client/js/util.ts"));
    assert_eq!(r.resolve("./util.ts", base)?, PathBuf::from("/proj/client/js/util.ts"));
    assert_eq!(r.resolve("./data", base)?, PathBuf::from("/proj/client/js/data.json"));
    assert_eq!(
        r.resolve("./components", base)?,
        PathBuf::from("/proj/client/js/components/index.ts")
    );
    assert_eq!(
        r.resolve("../js/./util", base)?,
        PathBuf::from("/proj/client/js/util.ts")
    );
    Ok(())
}

#[test]
fn bare_specifiers_walk_up_to_node_modules() -> TestResult {
    let fs = project();
    let r = resolver(&fs, ResolverOptions::for_bundle());

    let found = r.resolve("widget", Path::new("/proj/client/js/components"))?;
    assert_eq!(found, PathBuf::from("/proj/node_modules/widget/dist/widget.browser.js"));

    let module = r.resolve_module("widget/lib/index", Path::new("/proj/client/js"))?;
    assert_eq!(module.specifier, "widget/lib/index");
    assert_eq!(module.path, PathBuf::from("/proj/node_modules/widget/lib/index.js"));
    assert_eq!(module.key, "/node_modules/widget/lib/index.js");
    Ok(())
}

#[test]
fn unresolvable_specifier_is_a_resolution_error() {
    let fs = project();
    let r = resolver(&fs, ResolverOptions::for_bundle());

    let err = r.resolve("nope", Path::new("/proj/client/js")).unwrap_err();
    match err {
        IpackError::Resolution { specifier, basedir } => {
            assert_eq!(specifier, "nope");
            assert_eq!(basedir, PathBuf::from("/proj/client/js"));
        }
        other => panic!("expected resolution error, got {other:?}"),
    }

    let err = r.resolve("./missing", Path::new("/proj/client/js")).unwrap_err();
    assert!(matches!(err, IpackError::Resolution { .. }));
    assert!(err.to_string().contains("./missing"));
}

#[test]
fn concat_resolver_only_knows_js() {
    let fs = project();
    let r = resolver(&fs, ResolverOptions::for_concat());
    assert!(r.resolve("./util", Path::new("/proj/client/js")).is_err());
}

#[test]
fn resolution_is_deterministic() -> TestResult {
    let fs = project();
    let first = resolver(&fs, ResolverOptions::for_concat());
    let second = resolver(&fs, ResolverOptions::for_concat());

    for spec in ["widget", "widget/lib/index", "./client/js/util.js"] {
        let a = first.resolve(spec, Path::new("/proj"));
        let b = second.resolve(spec, Path::new("/proj"));
        assert_eq!(a.is_ok(), b.is_ok(), "{spec}");
        if let (Ok(a), Ok(b)) = (a, b) {
            assert_eq!(a, b);
        }
    }
    Ok(())
}

#[test]
fn run_cache_is_only_as_fresh_as_its_run() -> TestResult {
    let fs = project();
    let r = resolver(&fs, ResolverOptions::for_bundle());
    let base = Path::new("/proj/client/js");

    let mut cache = ResolutionCache::new();
    let before = r.resolve_cached(&mut cache, "./util", base)?;
    fs.remove("/proj/client/js/util.ts");

    // Same run: the memoised answer is reused.
    assert_eq!(r.resolve_cached(&mut cache, "./util", base)?, before);

    // A new run starts with a new cache and sees the removal.
    let mut fresh = ResolutionCache::new();
    assert!(r.resolve_cached(&mut fresh, "./util", base).is_err());
    Ok(())
}

#[test]
fn keys_and_normalisation() {
    assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    assert_eq!(
        module_key(Path::new("/proj"), Path::new("/proj/node_modules/jquery/dist/jquery.js")),
        "/node_modules/jquery/dist/jquery.js"
    );
}
