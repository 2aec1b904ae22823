// src/watch/mod.rs

//! File watching for the JS and CSS pipelines.
//!
//! Each watched pipeline gets its own [`WatchSubscription`], scoped to its
//! own input folder and globs. Events are debounced by `notify-debouncer-full`,
//! filtered through the pipeline's [`WatchSpec`] and merged into one
//! [`ChangeSet`] per burst.
//!
//! [`ChangeSet`]: crate::pipeline::ChangeSet

pub mod patterns;
pub mod watcher;

pub use patterns::WatchSpec;
pub use watcher::{forward_batches, spawn_watch, WatchSubscription, DEFAULT_DEBOUNCE};
