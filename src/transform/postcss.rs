// src/transform/postcss.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::Result;
use crate::sourcemap::{SourceMapBuilder, INPUT_SOURCE};
use crate::transform::{BoxFuture, CssPostProcessor, TransformOutput};

/// Source name the post-processor gives to lines it generates itself.
/// The CSS pipeline rewrites it to `__PostCSS/site.css`.
pub const POSTCSS_PLACEHOLDER: &str = "site.css";

static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)([a-z-]+)\s*:(.*)$")
        .unwrap_or_else(|e| panic!("invalid declaration pattern: {e}"))
});

/// Adds vendor-prefixed copies of a fixed set of declarations, each on its
/// own line just before the unprefixed one.
#[derive(Debug, Clone)]
pub struct VendorPrefixer {
    table: Vec<(&'static str, &'static [&'static str])>,
}

impl Default for VendorPrefixer {
    fn default() -> Self {
        Self {
            table: vec![
                ("appearance", &["-webkit-", "-moz-"]),
                ("backdrop-filter", &["-webkit-"]),
                ("hyphens", &["-webkit-", "-ms-"]),
                ("text-size-adjust", &["-webkit-", "-ms-"]),
                ("user-select", &["-webkit-", "-moz-", "-ms-"]),
            ],
        }
    }
}

impl VendorPrefixer {
    fn prefixes_for(&self, property: &str) -> &[&'static str] {
        self.table
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, prefixes)| *prefixes)
            .unwrap_or(&[])
    }
}

impl CssPostProcessor for VendorPrefixer {
    fn process<'a>(&'a self, css: &'a str) -> BoxFuture<'a, Result<TransformOutput>> {
        Box::pin(async move {
            let mut out = String::with_capacity(css.len());
            let mut builder = SourceMapBuilder::new(None);
            let input = builder.add_source(INPUT_SOURCE, None);
            let generated = builder.add_source(POSTCSS_PLACEHOLDER, None);
            let mut line_no = 0u32;

            for (i, line) in css.lines().enumerate() {
                if let Some(caps) = DECLARATION_RE.captures(line) {
                    let indent = caps.get(1).map_or("", |m| m.as_str());
                    let property = caps.get(2).map_or("", |m| m.as_str());
                    let rest = caps.get(3).map_or("", |m| m.as_str());
                    for prefix in self.prefixes_for(property) {
                        out.push_str(&format!("{indent}{prefix}{property}:{rest}\n"));
                        builder.add_mapping(line_no, 0, generated, i as u32, 0);
                        line_no += 1;
                    }
                }
                out.push_str(line);
                out.push('\n');
                builder.add_mapping(line_no, 0, input, i as u32, 0);
                line_no += 1;
            }

            Ok(TransformOutput {
                code: out,
                map: Some(builder.build()),
            })
        })
    }
}
