// src/engine/mod.rs

//! Orchestration engine for ipack.
//!
//! The pure per-pipeline state machine lives in [`gate`]; the async shell
//! that runs pipelines, once or under watch, is in [`orchestrator`].

pub mod gate;
pub mod orchestrator;

pub use gate::{PipelineState, RebuildGate};
pub use orchestrator::{describe_plan, drive_pipeline, BuildSummary, Orchestrator};
