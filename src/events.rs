// src/events.rs

//! "Build finished" signalling.
//!
//! A [`BuildEventHub`] is an explicit handle, cloned into whatever needs to
//! publish or observe build completion. Events are fire-and-forget: nothing
//! is kept for subscribers that join later, and publishing with nobody
//! listening is fine.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Zero-payload "a build finished" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildEvent;

#[derive(Debug, Clone)]
pub struct BuildEventHub {
    tx: broadcast::Sender<BuildEvent>,
}

impl Default for BuildEventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildEventHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    /// Broadcast one event. Returns how many subscribers were reached.
    pub fn publish(&self) -> usize {
        let reached = self.tx.send(BuildEvent).unwrap_or(0);
        debug!(reached, "build-done published");
        reached
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.tx.subscribe()
    }

    /// Arm the reserved listener: `hook` runs once, on the first event
    /// published after this call. The binary passes a process exit here.
    pub fn arm_exit_on_done<F>(&self, hook: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            match rx.recv().await {
                Ok(BuildEvent) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    debug!("build-done received; running exit hook");
                    hook();
                }
                Err(broadcast::error::RecvError::Closed) => {}
            }
        })
    }
}
