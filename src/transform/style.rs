// src/transform/style.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::errors::{IpackError, Result};
use crate::fs::FileSystem;
use crate::resolve::normalize;
use crate::sourcemap::SourceMapBuilder;
use crate::transform::{BoxFuture, StyleCompiler, StyleOutput};

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?\s*;?\s*$"#)
        .unwrap_or_else(|e| panic!("invalid @import pattern: {e}"))
});

const STAGE: &str = "stylesheet compile";

/// Inlines `@import` statements recursively, line by line.
///
/// Lookup order for `@import "x"` in folder `d`: `d/x`, `d/x.scss`,
/// `d/_x.scss`, `d/x.css`, `d/x/index.scss`, `d/x/_index.scss`; then the same
/// under every include path. A `~` prefix skips the relative lookup.
/// Remote imports (`http:`, `https:`, `//`) are left in place. Each file is
/// inlined at most once.
#[derive(Debug, Clone)]
pub struct ImportInliner {
    fs: Arc<dyn FileSystem>,
    include_paths: Vec<PathBuf>,
}

struct Inlining {
    out: String,
    line: u32,
    builder: SourceMapBuilder,
    stack: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
    files: Vec<PathBuf>,
}

impl ImportInliner {
    pub fn new(fs: Arc<dyn FileSystem>, include_paths: Vec<PathBuf>) -> Self {
        Self { fs, include_paths }
    }

    fn candidates(base: &Path, spec: &str) -> Vec<PathBuf> {
        let target = normalize(&base.join(spec));
        let mut out = vec![target.clone()];
        if let Some(name) = target.file_name().map(|n| n.to_string_lossy().into_owned()) {
            let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
            out.push(dir.join(format!("{name}.scss")));
            out.push(dir.join(format!("_{name}.scss")));
            out.push(dir.join(format!("{name}.css")));
            out.push(dir.join(format!("_{name}")));
        }
        out.push(target.join("index.scss"));
        out.push(target.join("_index.scss"));
        out
    }

    fn locate(&self, spec: &str, from_dir: &Path) -> Option<PathBuf> {
        let (spec, relative) = match spec.strip_prefix('~') {
            Some(rest) => (rest, false),
            None => (spec, true),
        };

        let bases = relative
            .then(|| from_dir.to_path_buf())
            .into_iter()
            .chain(self.include_paths.iter().cloned());

        for base in bases {
            if let Some(found) = Self::candidates(&base, spec)
                .into_iter()
                .find(|c| self.fs.is_file(c))
            {
                return Some(found);
            }
        }
        None
    }

    fn inline_file(&self, file: &Path, st: &mut Inlining) -> Result<()> {
        let text = self.fs.read_to_string(file).map_err(|e| {
            IpackError::transform(STAGE, format!("{}: {e:#}", file.display()))
        })?;
        let source = st
            .builder
            .add_source(&file.to_string_lossy(), Some(&text));
        st.stack.push(file.to_path_buf());
        st.seen.insert(file.to_path_buf());
        st.files.push(file.to_path_buf());

        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();

        for (i, line) in text.lines().enumerate() {
            if let Some(spec) = IMPORT_RE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str()) {
                let remote = spec.starts_with("http:")
                    || spec.starts_with("https:")
                    || spec.starts_with("//");
                if !remote {
                    let found = self.locate(spec, &dir).ok_or_else(|| {
                        IpackError::transform(
                            STAGE,
                            format!("{}:{}: cannot find stylesheet '{spec}'", file.display(), i + 1),
                        )
                    })?;
                    if st.stack.contains(&found) {
                        return Err(IpackError::transform(
                            STAGE,
                            format!("{}: circular @import of {}", file.display(), found.display()),
                        ));
                    }
                    if st.seen.contains(&found) {
                        debug!(?found, "stylesheet already inlined; skipping");
                    } else {
                        self.inline_file(&found, st)?;
                    }
                    continue;
                }
            }

            st.out.push_str(line);
            st.out.push('\n');
            st.builder.add_mapping(st.line, 0, source, i as u32, 0);
            st.line += 1;
        }

        st.stack.pop();
        Ok(())
    }
}

impl StyleCompiler for ImportInliner {
    fn compile<'a>(&'a self, entry: &'a Path) -> BoxFuture<'a, Result<StyleOutput>> {
        Box::pin(async move {
            let mut st = Inlining {
                out: String::new(),
                line: 0,
                builder: SourceMapBuilder::new(None),
                stack: Vec::new(),
                seen: HashSet::new(),
                files: Vec::new(),
            };
            self.inline_file(entry, &mut st)?;
            Ok(StyleOutput {
                code: st.out,
                map: st.builder.build(),
                files: st.files,
            })
        })
    }
}
