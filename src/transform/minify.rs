// src/transform/minify.rs

use crate::errors::Result;
use crate::sourcemap::{SourceMapBuilder, INPUT_SOURCE};
use crate::transform::{BoxFuture, CodeKind, Minifier, TransformOutput};

/// Conservative compressor that keeps one output line per kept input line:
/// drops blank lines and whole-line comments, strips indentation and
/// trailing whitespace. Lines inside a script template literal are copied
/// untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMinifier;

fn is_comment_line(trimmed: &str, kind: CodeKind) -> bool {
    match kind {
        CodeKind::Script => trimmed.starts_with("//") && !trimmed.starts_with("//#"),
        CodeKind::Style => trimmed.starts_with("/*") && trimmed.ends_with("*/") && !trimmed.starts_with("/*#"),
    }
}

fn unescaped_backticks(line: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '`' => count += 1,
            _ => {}
        }
    }
    count
}

impl Minifier for LineMinifier {
    fn minify<'a>(&'a self, code: &'a str, kind: CodeKind) -> BoxFuture<'a, Result<TransformOutput>> {
        Box::pin(async move {
            let mut out = String::with_capacity(code.len());
            let mut builder = SourceMapBuilder::new(None);
            let input = builder.add_source(INPUT_SOURCE, None);
            let mut line_no = 0u32;
            let mut in_template = false;

            for (i, line) in code.lines().enumerate() {
                let verbatim = in_template;
                if kind == CodeKind::Script && unescaped_backticks(line) % 2 == 1 {
                    in_template = !in_template;
                }

                let (text, column) = if verbatim {
                    (line, 0)
                } else {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || is_comment_line(trimmed, kind) {
                        continue;
                    }
                    let indent = line.len() - line.trim_start().len();
                    (trimmed, indent as u32)
                };

                out.push_str(text);
                out.push('\n');
                builder.add_mapping(line_no, 0, input, i as u32, column);
                line_no += 1;
            }

            Ok(TransformOutput {
                code: out,
                map: Some(builder.build()),
            })
        })
    }
}

/// Stand-in for the compressor when minification is off: output is the
/// human-readable input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Beautify;

impl Minifier for Beautify {
    fn minify<'a>(&'a self, code: &'a str, _kind: CodeKind) -> BoxFuture<'a, Result<TransformOutput>> {
        Box::pin(async move { Ok(TransformOutput::unchanged(code)) })
    }
}
