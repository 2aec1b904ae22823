// src/output/mod.rs

//! Where artifacts go: the output folder or the dev-server channel.
//!
//! A run constructs exactly one sink, so an artifact is never written to disk
//! and pushed to the dev server at the same time.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::sourcemap::SourceMap;
use crate::transform::BoxFuture;

/// Content produced by one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildArtifact {
    /// `/`-separated path relative to the output folder, e.g. `js/ipack.js`.
    pub path: String,
    pub contents: Vec<u8>,
    pub map: Option<SourceMap>,
}

impl BuildArtifact {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>, map: Option<SourceMap>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            map,
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }

    pub fn map_path(&self) -> String {
        format!("{}.map", self.path)
    }

    /// File name part of `path`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

pub trait ArtifactSink: Send + Sync {
    fn emit(&self, artifact: BuildArtifact) -> BoxFuture<'_, Result<()>>;

    /// Short human description for logs.
    fn describe(&self) -> String;
}

/// Writes artifacts (and `.map` files) under the output folder.
#[derive(Debug, Clone)]
pub struct OutputFolder {
    folder: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl OutputFolder {
    pub fn new(folder: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            folder: folder.into(),
            fs,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn target(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|p| !p.is_empty())
            .fold(self.folder.clone(), |acc, part| acc.join(part))
    }
}

impl ArtifactSink for OutputFolder {
    fn emit(&self, artifact: BuildArtifact) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // Serialise first so a bad map cannot leave a fresh bundle next
            // to a stale map.
            let map_json = artifact.map.as_ref().map(SourceMap::to_json).transpose()?;

            let path = self.target(&artifact.path);
            self.fs.write(&path, &artifact.contents)?;
            info!(path = %path.display(), bytes = artifact.contents.len(), "wrote artifact");

            if let Some(json) = map_json {
                let map_path = self.target(&artifact.map_path());
                self.fs.write(&map_path, json.as_bytes())?;
            }
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("output folder {}", self.folder.display())
    }
}

/// Pushes artifacts to the dev server instead of the disk.
#[derive(Clone)]
pub struct DevServerChannel {
    tx: mpsc::Sender<BuildArtifact>,
    port: u16,
}

impl fmt::Debug for DevServerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevServerChannel").field("port", &self.port).finish()
    }
}

impl DevServerChannel {
    pub fn new(tx: mpsc::Sender<BuildArtifact>, port: u16) -> Self {
        Self { tx, port }
    }
}

impl ArtifactSink for DevServerChannel {
    fn emit(&self, artifact: BuildArtifact) -> BoxFuture<'_, Result<()>> {
        let tx = self.tx.clone();
        Box::pin(async move {
            let path = artifact.path.clone();
            tx.send(artifact)
                .await
                .map_err(|_| anyhow!("dev server channel closed while sending {path}"))?;
            info!(%path, "pushed artifact to dev server");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("dev server on http://localhost:{}", self.port)
    }
}
