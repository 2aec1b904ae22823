use std::sync::{Arc, Mutex};

use ipack::errors::Result;
use ipack::output::{ArtifactSink, BuildArtifact};
use ipack::transform::BoxFuture;

/// Sink that keeps every emitted artifact in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Arc<Mutex<Vec<BuildArtifact>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<BuildArtifact> {
        self.artifacts.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.artifacts().into_iter().map(|a| a.path).collect()
    }

    /// Latest artifact emitted under `path`.
    pub fn get(&self, path: &str) -> Option<BuildArtifact> {
        self.artifacts().into_iter().rev().find(|a| a.path == path)
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for MemorySink {
    fn emit(&self, artifact: BuildArtifact) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.artifacts.lock().unwrap().push(artifact);
            Ok(())
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
