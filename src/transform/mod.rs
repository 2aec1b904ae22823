// src/transform/mod.rs

//! Opaque transform stages.
//!
//! The pipelines never compile, prefix or minify anything themselves; they
//! call one of the traits below and only rely on the input/output contract:
//! text in, text out, plus an optional map whose `<input>` source
//! ([`crate::sourcemap::INPUT_SOURCE`]) is the text handed in. A `None` map
//! means "line `i` of the output is line `i` of the input".
//!
//! - [`script`] passthrough transpiler for the project's own modules.
//! - [`style`] `@import`-inlining stylesheet compiler.
//! - [`postcss`] vendor-prefixing post-processor.
//! - [`minify`] conservative line minifier and the beautify no-op.

pub mod minify;
pub mod postcss;
pub mod script;
pub mod style;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::sourcemap::SourceMap;

pub use minify::{Beautify, LineMinifier};
pub use postcss::{VendorPrefixer, POSTCSS_PLACEHOLDER};
pub use script::PassthroughTranspiler;
pub use style::ImportInliner;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Output of a text-to-text stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<SourceMap>,
}

impl TransformOutput {
    pub fn unchanged(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

/// Output of a stylesheet compile: CSS plus a map whose sources are the
/// absolute paths of every file that contributed lines.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOutput {
    pub code: String,
    pub map: SourceMap,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Script,
    Style,
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::Script => f.write_str("script"),
            CodeKind::Style => f.write_str("style"),
        }
    }
}

/// Turns one source module into plain script text.
pub trait ScriptTranspiler: Send + Sync {
    fn transpile<'a>(&'a self, path: &'a Path, source: &'a str)
    -> BoxFuture<'a, Result<TransformOutput>>;
}

/// Compiles a stylesheet entry and its `@import` graph into one CSS text.
pub trait StyleCompiler: Send + Sync {
    fn compile<'a>(&'a self, entry: &'a Path) -> BoxFuture<'a, Result<StyleOutput>>;
}

/// One stage of the CSS post-processing chain.
pub trait CssPostProcessor: Send + Sync {
    fn process<'a>(&'a self, css: &'a str) -> BoxFuture<'a, Result<TransformOutput>>;
}

/// Final compression stage (or its human-readable stand-in).
pub trait Minifier: Send + Sync {
    fn minify<'a>(&'a self, code: &'a str, kind: CodeKind) -> BoxFuture<'a, Result<TransformOutput>>;
}

/// One implementation of every stage, shared by all pipelines of a run.
#[derive(Clone)]
pub struct Toolchain {
    pub transpiler: Arc<dyn ScriptTranspiler>,
    pub style: Arc<dyn StyleCompiler>,
    pub post_processors: Vec<Arc<dyn CssPostProcessor>>,
    pub minifier: Arc<dyn Minifier>,
    pub beautifier: Arc<dyn Minifier>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("post_processors", &self.post_processors.len())
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Built-in stages. `include_paths` are searched for bare and `~`
    /// stylesheet imports (normally just `node_modules`).
    pub fn builtin(fs: Arc<dyn FileSystem>, include_paths: Vec<PathBuf>) -> Self {
        Self {
            transpiler: Arc::new(PassthroughTranspiler),
            style: Arc::new(ImportInliner::new(fs, include_paths)),
            post_processors: vec![Arc::new(VendorPrefixer::default())],
            minifier: Arc::new(LineMinifier),
            beautifier: Arc::new(Beautify),
        }
    }

    /// The compressor when `production`, the no-op pass otherwise.
    pub fn finisher(&self, production: bool) -> &Arc<dyn Minifier> {
        if production {
            &self.minifier
        } else {
            &self.beautifier
        }
    }
}
