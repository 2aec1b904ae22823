// tests/watch.rs

use std::collections::BTreeSet;
use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use notify_debouncer_full::DebouncedEvent;
use tokio::sync::mpsc;

use ipack::pipeline::ChangeSet;
use ipack::types::PipelineKind;
use ipack::watch::{forward_batches, spawn_watch, WatchSpec};
use ipack_test_utils::{init_tracing, with_timeout, TempProject};

type TestResult = Result<(), Box<dyn Error>>;

fn js_spec(root: &str) -> WatchSpec {
    WatchSpec::new(
        PipelineKind::Js,
        root,
        vec!["**/*.ts".to_string(), "**/*.vue".to_string()],
    )
}

fn modified(path: &str) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(PathBuf::from(path))
}

#[test]
fn matcher_filters_by_glob_and_root() -> TestResult {
    let matcher = js_spec("/app/client/js").matcher()?;
    assert!(matcher.matches(PathBuf::from("/app/client/js/index.ts").as_path()));
    assert!(matcher.matches(PathBuf::from("/app/client/js/deep/Comp.vue").as_path()));
    assert!(matcher.matches(PathBuf::from("views/page.ts").as_path()));
    assert!(!matcher.matches(PathBuf::from("/app/client/js/readme.md").as_path()));
    assert!(!matcher.matches(PathBuf::from("/app/client/css/index.ts").as_path()));
    Ok(())
}

#[test]
fn invalid_glob_is_an_error() {
    let spec = WatchSpec::new(PipelineKind::Css, "/x", vec!["[".to_string()]);
    assert!(spec.matcher().is_err());
}

#[test]
fn change_for_classifies_events() -> TestResult {
    let matcher = js_spec("/app/client/js").matcher()?;

    let content = matcher.change_for(&modified("/app/client/js/a.ts")).ok_or("ignored")?;
    assert_eq!(content, ChangeSet::paths(["/app/client/js/a.ts"]));
    assert!(!content.structural);

    let created = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/app/client/js/b.ts"));
    assert!(matcher.change_for(&created).ok_or("ignored")?.structural);

    let read = Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/app/client/js/a.ts"));
    assert_eq!(matcher.change_for(&read), None);

    assert_eq!(matcher.change_for(&modified("/app/client/js/notes.txt")), None);
    Ok(())
}

fn debounced(event: Event) -> DebouncedEvent {
    DebouncedEvent::new(event, Instant::now())
}

#[test]
fn batch_merges_every_in_scope_event() -> TestResult {
    let matcher = js_spec("/app/client/js").matcher()?;
    let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/app/client/js/old.ts"));
    let batch = [modified("/app/client/js/a.ts"), modified("/app/client/js/notes.md"), removed];

    let change = matcher.change_for_batch(&batch).ok_or("ignored")?;
    assert_eq!(change.paths.len(), 2);
    assert!(change.paths.contains(&PathBuf::from("/app/client/js/old.ts")));
    assert!(change.structural);

    assert_eq!(matcher.change_for_batch(&[modified("/app/client/js/notes.md")]), None);
    Ok(())
}

#[tokio::test]
async fn bursts_are_merged_into_one_change_set() -> TestResult {
    init_tracing();
    let matcher = js_spec("/app/client/js").matcher()?;
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let (tx, mut rx) = mpsc::channel(4);

    let task = tokio::spawn(forward_batches(matcher, batch_rx, tx));

    batch_tx.send(vec![
        debounced(modified("/app/client/js/a.ts")),
        debounced(modified("/app/client/js/ignored.md")),
        debounced(modified("/app/client/js/b.ts")),
    ])?;

    let first = with_timeout(rx.recv()).await.ok_or("no change set")?;
    assert_eq!(first, ChangeSet::paths(["/app/client/js/a.ts", "/app/client/js/b.ts"]));

    // A later burst is a separate change set.
    batch_tx.send(vec![debounced(modified("/app/client/js/c.ts"))])?;
    let second = with_timeout(rx.recv()).await.ok_or("no change set")?;
    assert_eq!(second, ChangeSet::paths(["/app/client/js/c.ts"]));

    drop(batch_tx);
    with_timeout(task).await?;
    Ok(())
}

#[tokio::test]
async fn irrelevant_events_never_trigger() -> TestResult {
    init_tracing();
    let matcher = js_spec("/app/client/js").matcher()?;
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let (tx, mut rx) = mpsc::channel(4);
    let task = tokio::spawn(forward_batches(matcher, batch_rx, tx));

    batch_tx.send(vec![
        debounced(modified("/elsewhere/a.ts")),
        debounced(modified("/app/client/js/style.css")),
    ])?;
    drop(batch_tx);

    with_timeout(task).await?;
    assert_eq!(rx.recv().await, None);
    Ok(())
}

#[tokio::test]
async fn subscription_reports_real_file_changes() -> TestResult {
    init_tracing();
    let p = TempProject::new();
    p.write("client/js/index.ts", "export {};\n");

    let spec = WatchSpec::new(PipelineKind::Js, p.path("client/js"), vec!["**/*.ts".to_string()]);
    let (tx, mut rx) = mpsc::channel(4);
    let mut sub = spawn_watch(spec, Duration::from_millis(50), tx)?;
    assert!(sub.is_active());

    tokio::time::sleep(Duration::from_millis(200)).await;
    p.write("client/js/extra.ts", "export const y = 2;\n");

    let change = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await?
        .ok_or("watch ended")?;
    assert!(change.paths.contains(&p.path("client/js/extra.ts")));

    sub.cancel();
    assert!(!sub.is_active());
    Ok(())
}

#[tokio::test]
async fn quick_successive_writes_settle_together() -> TestResult {
    init_tracing();
    let p = TempProject::new();
    p.write("client/js/index.ts", "module.exports = {};\n");

    let spec = WatchSpec::new(PipelineKind::Js, p.path("client/js"), vec!["**/*.ts".to_string()]);
    let (tx, mut rx) = mpsc::channel(8);
    let _sub = spawn_watch(spec, Duration::from_millis(150), tx)?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    p.write("client/js/one.ts", "module.exports = 1;\n");
    p.write("client/js/two.ts", "module.exports = 2;\n");
    p.write("client/js/notes.md", "ignored\n");

    let mut seen = BTreeSet::new();
    let mut structural = false;
    while !(seen.contains(&p.path("client/js/one.ts")) && seen.contains(&p.path("client/js/two.ts"))) {
        let change = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await?
            .ok_or("watch ended")?;
        structural |= change.structural;
        seen.extend(change.paths);
    }
    assert!(structural);
    assert!(!seen.contains(&p.path("client/js/notes.md")));
    Ok(())
}
