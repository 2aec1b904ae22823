// src/watch/watcher.rs

use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::pipeline::ChangeSet;
use crate::watch::patterns::{WatchMatcher, WatchSpec};

/// Quiet window after the last relevant event before a rebuild is requested.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

type FileDebouncer = Debouncer<RecommendedWatcher, RecommendedCache>;

/// A live watch on one pipeline's scope.
///
/// Owns the debounced `notify` watcher and the forwarding task. Dropping
/// it, or calling [`WatchSubscription::cancel`], stops both.
pub struct WatchSubscription {
    spec: WatchSpec,
    debouncer: Option<FileDebouncer>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("spec", &self.spec)
            .field("active", &self.is_active())
            .finish()
    }
}

impl WatchSubscription {
    pub fn spec(&self) -> &WatchSpec {
        &self.spec
    }

    pub fn is_active(&self) -> bool {
        self.debouncer.is_some() && !self.task.is_finished()
    }

    pub fn cancel(&mut self) {
        if self.debouncer.take().is_some() {
            debug!(pipeline = %self.spec.kind(), "watch cancelled");
        }
        self.task.abort();
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start watching `spec.root()` recursively. Every burst of relevant
/// changes, once `debounce` has passed without a new one, is sent to `tx`
/// as a single [`ChangeSet`].
pub fn spawn_watch(
    spec: WatchSpec,
    debounce: Duration,
    tx: mpsc::Sender<ChangeSet>,
) -> Result<WatchSubscription> {
    let matcher = spec.matcher()?;

    // Channel from the debouncer thread into the async world.
    let (batch_tx, batch_rx) = mpsc::unbounded_channel::<Vec<DebouncedEvent>>();

    let mut debouncer = new_debouncer(debounce, None, move |res: DebounceEventResult| match res {
        Ok(events) => {
            // The receiver is gone once the subscription is cancelled.
            let _ = batch_tx.send(events);
        }
        Err(errors) => {
            for err in errors {
                warn!(error = %err, "file watch error");
            }
        }
    })?;
    debouncer.watch(spec.root(), RecursiveMode::Recursive)?;
    info!(pipeline = %spec.kind(), root = %spec.root().display(), "watching for changes");

    let task = tokio::spawn(forward_batches(matcher, batch_rx, tx));

    Ok(WatchSubscription {
        spec,
        debouncer: Some(debouncer),
        task,
    })
}

/// Turn each debounced batch into at most one change set until either
/// channel closes. Batches with nothing in scope are dropped.
pub async fn forward_batches(
    matcher: WatchMatcher,
    mut batches: mpsc::UnboundedReceiver<Vec<DebouncedEvent>>,
    tx: mpsc::Sender<ChangeSet>,
) {
    while let Some(batch) = batches.recv().await {
        let events = batch.iter().map(|debounced| &debounced.event);
        let Some(change) = matcher.change_for_batch(events) else {
            continue;
        };
        debug!(paths = change.paths.len(), structural = change.structural, "change burst settled");
        if tx.send(change).await.is_err() {
            return;
        }
    }
}
