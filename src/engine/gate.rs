// src/engine/gate.rs

//! Pure rebuild state machine for one pipeline.
//!
//! No Tokio, channels or IO: the orchestrator feeds it triggers and build
//! outcomes and does what it says.

use tracing::debug;

use crate::pipeline::ChangeSet;
use crate::types::PipelineKind;

/// `Idle → Building → {Succeeded, Failed} → Idle`.
///
/// `Succeeded` and `Failed` accept new triggers exactly like `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Building,
    Succeeded,
    Failed,
}

/// Trailing-edge coalescing of rebuild triggers.
///
/// A trigger while idle starts a build. Triggers while building are merged
/// into a single pending change set, which starts the next build as soon as
/// the current one finishes. A pipeline therefore never builds concurrently
/// with itself, and any number of triggers during a build cost one rebuild.
#[derive(Debug)]
pub struct RebuildGate {
    kind: PipelineKind,
    state: PipelineState,
    pending: Option<ChangeSet>,
    builds_started: usize,
}

impl RebuildGate {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            state: PipelineState::Idle,
            pending: None,
            builds_started: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn builds_started(&self) -> usize {
        self.builds_started
    }

    /// Returns the change set to build now, or `None` if a build is in
    /// flight and the trigger was folded into the pending one.
    pub fn on_trigger(&mut self, changes: ChangeSet) -> Option<ChangeSet> {
        if self.state == PipelineState::Building {
            match self.pending.as_mut() {
                Some(pending) => pending.merge(changes),
                None => self.pending = Some(changes),
            }
            debug!(pipeline = %self.kind, "trigger coalesced into pending rebuild");
            return None;
        }
        self.start();
        Some(changes)
    }

    /// Record the outcome of the running build. Returns the pending change
    /// set when a rebuild should start right away.
    pub fn on_finished(&mut self, succeeded: bool) -> Option<ChangeSet> {
        self.state = if succeeded {
            PipelineState::Succeeded
        } else {
            PipelineState::Failed
        };
        let next = self.pending.take()?;
        debug!(pipeline = %self.kind, "starting coalesced rebuild");
        self.start();
        Some(next)
    }

    fn start(&mut self) {
        self.state = PipelineState::Building;
        self.builds_started += 1;
    }
}
