// src/devserver.rs

//! Minimal in-memory dev server.
//!
//! Consumes artifacts from a [`DevServerChannel`](crate::output::DevServerChannel),
//! keeps the latest version of each (and its map) and serves them with an
//! `axum` router on `127.0.0.1`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::output::BuildArtifact;

type Store = Arc<RwLock<HashMap<String, Vec<u8>>>>;

pub struct DevServer {
    addr: SocketAddr,
    store: Store,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for DevServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevServer").field("addr", &self.addr).finish_non_exhaustive()
    }
}

impl DevServer {
    /// Bind `127.0.0.1:port` (0 picks a free port) and start serving what
    /// arrives on `artifacts`.
    pub async fn start(port: u16, artifacts: mpsc::Receiver<BuildArtifact>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("binding dev server to port {port}"))?;
        let addr = listener.local_addr()?;
        let store: Store = Arc::default();

        let ingest = tokio::spawn(ingest(artifacts, store.clone()));
        let app = router(store.clone());
        let serve = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                warn!(error = %err, "dev server stopped");
            }
        });
        info!(%addr, "dev server listening");

        Ok(Self {
            addr,
            store,
            tasks: vec![ingest, serve],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Latest contents stored under `path` (relative, e.g. `js/ipack.js`).
    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.store.read().await.get(path.trim_start_matches('/')).cloned()
    }

    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn ingest(mut rx: mpsc::Receiver<BuildArtifact>, store: Store) {
    while let Some(artifact) = rx.recv().await {
        let map = match artifact.map.as_ref().map(|m| m.to_json()).transpose() {
            Ok(map) => map,
            Err(err) => {
                warn!(path = %artifact.path, error = %err, "dropping unserialisable source map");
                None
            }
        };
        let mut guard = store.write().await;
        if let Some(json) = map {
            guard.insert(artifact.map_path(), json.into_bytes());
        }
        debug!(path = %artifact.path, bytes = artifact.contents.len(), "dev server artifact updated");
        guard.insert(artifact.path, artifact.contents);
    }
    debug!("dev server channel closed");
}

/// `GET /<artifact path>`; other methods get 405 from the method router.
fn router(store: Store) -> Router {
    Router::new()
        .route("/*path", get(serve_artifact))
        .with_state(store)
}

async fn serve_artifact(State(store): State<Store>, Path(path): Path<String>) -> Response {
    debug!(path = %path, "dev server request");
    match store.read().await.get(&path) {
        Some(body) => (
            [
                (header::CONTENT_TYPE, content_type(&path)),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found\n").into_response(),
    }
}

pub fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext {
        "js" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "map" | "json" => "application/json; charset=utf-8",
        _ => "application/octet-stream",
    }
}
