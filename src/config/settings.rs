// src/config/settings.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::model::{ConcatEntry, ProjectDescriptor};

pub const DEFAULT_INPUT: &str = "client";
pub const DEFAULT_OUTPUT: &str = "wwwroot";
pub const DEFAULT_JS_OUT: &str = "ipack.js";
pub const DEFAULT_CSS_OUT: &str = "ipack.css";

/// Finalised project settings.
///
/// Built once from a root folder and a sparse [`ProjectDescriptor`]. Every
/// path accessor is a pure join over the stored fields, so two `Settings`
/// built from the same inputs derive identical paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    root: PathBuf,
    input: String,
    output: String,
    concat: BTreeMap<String, ConcatEntry>,
    alias: BTreeMap<String, String>,
    externals: BTreeMap<String, String>,
    js_out: String,
    css_out: String,
}

fn non_empty(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn with_extension(name: String, ext: &str) -> String {
    if name.ends_with(ext) {
        name
    } else {
        format!("{name}{ext}")
    }
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>, descriptor: ProjectDescriptor) -> Self {
        Self {
            root: root.into(),
            input: non_empty(descriptor.input, DEFAULT_INPUT),
            output: non_empty(descriptor.output, DEFAULT_OUTPUT),
            concat: descriptor.concat,
            alias: descriptor.alias,
            externals: descriptor.externals,
            js_out: with_extension(non_empty(descriptor.js_out, DEFAULT_JS_OUT), ".js"),
            css_out: with_extension(non_empty(descriptor.css_out, DEFAULT_CSS_OUT), ".css"),
        }
    }

    /// Serializable descriptor that rebuilds an equal `Settings` for the
    /// same root.
    pub fn core(&self) -> ProjectDescriptor {
        ProjectDescriptor {
            input: Some(self.input.clone()),
            output: Some(self.output.clone()),
            concat: self.concat.clone(),
            alias: self.alias.clone(),
            externals: self.externals.clone(),
            js_out: Some(self.js_out.clone()),
            css_out: Some(self.css_out.clone()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// The unresolved concat map, as written in the descriptor.
    pub fn concat(&self) -> &BTreeMap<String, ConcatEntry> {
        &self.concat
    }

    pub fn alias(&self) -> &BTreeMap<String, String> {
        &self.alias
    }

    pub fn externals(&self) -> &BTreeMap<String, String> {
        &self.externals
    }

    pub fn js_out(&self) -> &str {
        &self.js_out
    }

    pub fn css_out(&self) -> &str {
        &self.css_out
    }

    pub fn concat_count(&self) -> usize {
        self.concat.len()
    }

    /// File name pattern for split chunks, e.g. `ipack.[name].js`.
    pub fn js_chunk_file_name(&self) -> String {
        let stem = self.js_out.strip_suffix(".js").unwrap_or(&self.js_out);
        format!("{stem}.[name].js")
    }

    pub fn package_json(&self) -> PathBuf {
        self.root.join("package.json")
    }

    pub fn babel_configuration(&self) -> PathBuf {
        self.root.join(".babelrc")
    }

    pub fn ts_config_json(&self) -> PathBuf {
        self.root.join("tsconfig.json")
    }

    pub fn dot_env(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn npm_folder(&self) -> PathBuf {
        self.root.join("node_modules")
    }

    pub fn input_folder(&self) -> PathBuf {
        self.root.join(&self.input)
    }

    pub fn input_js_folder(&self) -> PathBuf {
        self.input_folder().join("js")
    }

    pub fn input_css_folder(&self) -> PathBuf {
        self.input_folder().join("css")
    }

    pub fn js_entry(&self) -> PathBuf {
        self.input_js_folder().join("index.ts")
    }

    pub fn css_entry(&self) -> PathBuf {
        self.input_css_folder().join("index.scss")
    }

    /// Globs, relative to [`Settings::input_js_folder`], whose changes
    /// trigger a JS rebuild.
    pub fn js_watch_globs(&self) -> Vec<String> {
        ["**/*.ts", "**/*.tsx", "**/*.vue", "**/*.js"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Globs, relative to [`Settings::input_css_folder`], whose changes
    /// trigger a CSS rebuild.
    pub fn css_watch_globs(&self) -> Vec<String> {
        vec!["**/*.scss".to_string(), "**/*.css".to_string()]
    }

    pub fn output_folder(&self) -> PathBuf {
        self.root.join(&self.output)
    }

    pub fn output_js_folder(&self) -> PathBuf {
        self.output_folder().join("js")
    }

    pub fn output_js_file(&self) -> PathBuf {
        self.output_js_folder().join(&self.js_out)
    }

    pub fn stat_json_path(&self) -> PathBuf {
        self.output_js_folder().join("stats.json")
    }

    pub fn output_css_folder(&self) -> PathBuf {
        self.output_folder().join("css")
    }

    pub fn output_css_file(&self) -> PathBuf {
        self.output_css_folder().join(&self.css_out)
    }

    /// Artifact path of the JS bundle, relative to the output folder.
    pub fn js_artifact_path(&self) -> String {
        format!("js/{}", self.js_out)
    }

    /// Artifact path of the CSS bundle, relative to the output folder.
    pub fn css_artifact_path(&self) -> String {
        format!("css/{}", self.css_out)
    }
}
