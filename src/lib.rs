// src/lib.rs

pub mod cli;
pub mod config;
pub mod devserver;
pub mod engine;
pub mod errors;
pub mod events;
pub mod fs;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod resolve;
pub mod restore;
pub mod sourcemap;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cli::{BuildArgs, CliArgs, Command};
use crate::config::{Settings, UserSettingsStore};
use crate::devserver::DevServer;
use crate::engine::{describe_plan, Orchestrator};
use crate::events::BuildEventHub;
use crate::fs::{FileSystem, RealFileSystem};
use crate::output::{ArtifactSink, DevServerChannel, OutputFolder};
use crate::pipeline::PipelineContext;
use crate::transform::Toolchain;
use crate::types::BuildFlags;

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when a one-shot build had at least one failing
/// pipeline. Watch mode only returns once interrupted, and always with
/// `Ok(true)`.
pub async fn run(args: CliArgs) -> Result<bool> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    match args.command {
        Command::Set { key, value } => {
            let path = UserSettingsStore::default_path()
                .context("cannot locate the home directory for user settings")?;
            let store = UserSettingsStore::new(path, fs);
            let settings = store.set(&key, &value)?;
            info!(path = %store.path().display(), ?settings, "user settings updated");
            Ok(true)
        }
        Command::Build(build) => run_build(build, fs).await,
    }
}

async fn run_build(args: BuildArgs, fs: Arc<dyn FileSystem>) -> Result<bool> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("reading the current directory")?,
    };
    let root = fs
        .canonicalize(&root)
        .with_context(|| format!("project root {:?}", root))?;
    let settings = Settings::try_read_from_package_json(&root, fs.as_ref());

    if args.dry_run {
        print!("{}", describe_plan(&settings));
        debug!("dry-run complete (nothing built)");
        return Ok(true);
    }

    let user = UserSettingsStore::default_path()
        .map(|path| UserSettingsStore::new(path, fs.clone()).try_read())
        .unwrap_or_default();
    restore::restore_packages(&settings, fs.as_ref(), user.package_manager).await;

    let watch = args.watch || args.serve.is_some();
    let flags = BuildFlags {
        production: args.production,
        watch,
        source_map: !args.no_source_map,
    };

    let (sink, server): (Arc<dyn ArtifactSink>, Option<DevServer>) = match args.serve {
        Some(port) => {
            let (tx, rx) = mpsc::channel(64);
            let server = DevServer::start(port, rx).await?;
            let port = server.local_addr().port();
            (Arc::new(DevServerChannel::new(tx, port)), Some(server))
        }
        None => (
            Arc::new(OutputFolder::new(settings.output_folder(), fs.clone())),
            None,
        ),
    };
    info!(root = %root.display(), sink = %sink.describe(), ?flags, "starting build");

    let hub = BuildEventHub::new();
    let include_paths: Vec<PathBuf> = vec![settings.npm_folder()];
    let ctx = PipelineContext {
        settings: Arc::new(settings),
        flags,
        toolchain: Arc::new(Toolchain::builtin(fs.clone(), include_paths)),
        sink,
        hub: hub.clone(),
        fs,
    };
    let orchestrator = Orchestrator::new(ctx);

    if !watch {
        let summary = orchestrator.build_once().await;
        return Ok(!summary.has_failures());
    }

    let notifier = (!user.mute_notification).then(|| announce_builds(&hub));
    orchestrator
        .watch(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    if let Some(task) = notifier {
        task.abort();
    }
    if let Some(server) = server {
        server.shutdown();
    }
    Ok(true)
}

/// Log a line for every finished build, for users who watch the terminal.
fn announce_builds(hub: &BuildEventHub) -> JoinHandle<()> {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(_) => info!("fresh build ready"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "missed build notifications")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
