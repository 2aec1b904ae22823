// src/restore.rs

//! Package restore before the first build.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{PackageManager, Settings};
use crate::errors::Result;
use crate::fs::FileSystem;

/// A project needs a restore when it has a `package.json` but no
/// `node_modules` folder.
pub fn needs_restore(settings: &Settings, fs: &dyn FileSystem) -> bool {
    fs.is_file(&settings.package_json()) && !fs.is_dir(&settings.npm_folder())
}

/// The command line `manager` uses to install packages, if any.
pub fn install_command(manager: PackageManager) -> Option<(&'static str, &'static [&'static str])> {
    match manager {
        PackageManager::Yarn => Some(("yarn", &["install"])),
        PackageManager::Npm => Some(("npm", &["install"])),
        PackageManager::Disabled => None,
    }
}

/// Install packages if the project needs it. Never fails the build: any
/// problem is logged and `false` is returned.
pub async fn restore_packages(settings: &Settings, fs: &dyn FileSystem, manager: PackageManager) -> bool {
    if !needs_restore(settings, fs) {
        debug!("node_modules present; no restore needed");
        return true;
    }
    let Some((program, args)) = install_command(manager) else {
        info!("package restore is disabled; skipping");
        return true;
    };

    match run_install(settings.root(), program, args).await {
        Ok(()) => true,
        Err(err) => {
            warn!(program, error = %err, "package restore failed; continuing with the build");
            false
        }
    }
}

async fn run_install(root: &Path, program: &str, args: &[&str]) -> Result<()> {
    info!(program, root = %root.display(), "restoring packages");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {program}"))?;

    // Always consume both streams so buffers don't fill.
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(log_lines(program.to_string(), "stdout", BufReader::new(stdout))));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(log_lines(program.to_string(), "stderr", BufReader::new(stderr))));
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for {program}"))?;
    for reader in readers {
        let _ = reader.await;
    }

    if !status.success() {
        return Err(anyhow::anyhow!("{program} exited with {status}").into());
    }
    info!(program, "packages restored");
    Ok(())
}

async fn log_lines<R>(program: String, stream: &'static str, reader: BufReader<R>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(%program, stream, "{}", line);
    }
}
