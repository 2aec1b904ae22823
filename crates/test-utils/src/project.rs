use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use ipack::config::Settings;
use ipack::events::BuildEventHub;
use ipack::fs::{FileSystem, RealFileSystem};
use ipack::output::{ArtifactSink, OutputFolder};
use ipack::pipeline::PipelineContext;
use ipack::transform::Toolchain;
use ipack::types::BuildFlags;

/// A throwaway project folder on disk.
///
/// The root is canonicalised so paths compare equal to what the resolver
/// and the watcher report.
pub struct TempProject {
    _dir: TempDir,
    root: PathBuf,
}

impl TempProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = std::fs::canonicalize(dir.path()).expect("canonicalize temp dir");
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        rel.split('/').fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Write `contents` to `rel`, creating parent folders.
    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, contents).expect("write project file");
        self
    }

    /// Write a `package.json` whose `ipack` section is `descriptor_json`.
    pub fn package_json(&self, descriptor_json: &str) -> &Self {
        self.write(
            "package.json",
            &format!("{{\n  \"name\": \"demo\",\n  \"ipack\": {descriptor_json}\n}}\n"),
        )
    }

    /// Write `node_modules/<name>/package.json` plus the files given.
    pub fn package(&self, name: &str, manifest: &str, files: &[(&str, &str)]) -> &Self {
        self.write(&format!("node_modules/{name}/package.json"), manifest);
        for (rel, contents) in files {
            self.write(&format!("node_modules/{name}/{rel}"), contents);
        }
        self
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("read project file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn fs(&self) -> Arc<dyn FileSystem> {
        Arc::new(RealFileSystem)
    }

    pub fn settings(&self) -> Settings {
        Settings::try_read_from_package_json(&self.root, &RealFileSystem)
    }

    /// Pipeline context writing to `sink` with the built-in toolchain.
    pub fn context(&self, flags: BuildFlags, sink: Arc<dyn ArtifactSink>) -> PipelineContext {
        let settings = self.settings();
        let fs = self.fs();
        let toolchain = Toolchain::builtin(fs.clone(), vec![settings.npm_folder()]);
        PipelineContext {
            settings: Arc::new(settings),
            flags,
            toolchain: Arc::new(toolchain),
            sink,
            hub: BuildEventHub::new(),
            fs,
        }
    }

    /// Pipeline context writing into the project's output folder.
    pub fn output_context(&self, flags: BuildFlags) -> PipelineContext {
        let folder = self.settings().output_folder();
        self.context(flags, Arc::new(OutputFolder::new(folder, self.fs())))
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}
