// src/sourcemap/mod.rs

//! Source Map v3: model, builder, lookup, source rewriting and composition.
//!
//! Maps produced here are line-oriented: each emitted segment pins a column
//! of a generated line to a line/column of an original source. That is all
//! the pipelines need, since every transform they run keeps line identity
//! or reports its own map.

pub mod vlq;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{IpackError, Result};

/// Pseudo source name a transform stage uses for "my input text".
///
/// [`compose`] traces segments pointing at it through the previous stage's
/// map; segments pointing at any other source are kept as they are.
pub const INPUT_SOURCE: &str = "<input>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
}

/// A resolved position in an original source. Lines and columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition<'a> {
    pub source: &'a str,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    pub file: Option<String>,
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    /// Segments per generated line, sorted by generated column.
    pub lines: Vec<Vec<Segment>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_root: Option<String>,
    sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources_content: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String> {
        let raw = RawSourceMap {
            version: 3,
            file: self.file.clone(),
            source_root: self.source_root.clone(),
            sources: self.sources.clone(),
            sources_content: if self.sources_content.iter().any(Option::is_some) {
                self.sources_content.clone()
            } else {
                Vec::new()
            },
            names: Vec::new(),
            mappings: self.encode_mappings(),
        };
        Ok(serde_json::to_string(&raw)?)
    }

    pub fn from_json(text: &str) -> Result<SourceMap> {
        let raw: RawSourceMap = serde_json::from_str(text)?;
        if raw.version != 3 {
            return Err(IpackError::transform(
                "source map",
                format!("unsupported version {}", raw.version),
            ));
        }
        let lines = decode_mappings(&raw.mappings, raw.sources.len())?;
        let mut sources_content = raw.sources_content;
        sources_content.resize(raw.sources.len(), None);
        Ok(SourceMap {
            file: raw.file,
            source_root: raw.source_root,
            sources: raw.sources,
            sources_content,
            lines,
        })
    }

    fn encode_mappings(&self) -> String {
        let mut out = String::new();
        let (mut prev_source, mut prev_line, mut prev_col) = (0i64, 0i64, 0i64);

        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let mut prev_gen_col = 0i64;
            for (j, seg) in line.iter().enumerate() {
                if j > 0 {
                    out.push(',');
                }
                vlq::encode(seg.generated_column as i64 - prev_gen_col, &mut out);
                vlq::encode(seg.source as i64 - prev_source, &mut out);
                vlq::encode(seg.original_line as i64 - prev_line, &mut out);
                vlq::encode(seg.original_column as i64 - prev_col, &mut out);
                prev_gen_col = seg.generated_column as i64;
                prev_source = seg.source as i64;
                prev_line = seg.original_line as i64;
                prev_col = seg.original_column as i64;
            }
        }
        out
    }

    /// Original position of a generated line/column (0-based): the closest
    /// segment at or before `column` on that line.
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalPosition<'_>> {
        let segments = self.lines.get(line as usize)?;
        let seg = segments
            .iter()
            .take_while(|s| s.generated_column <= column)
            .last()?;
        Some(OriginalPosition {
            source: self.sources.get(seg.source as usize)?,
            line: seg.original_line,
            column: seg.original_column,
        })
    }

    /// Rewrite every source path.
    pub fn map_sources(&mut self, f: impl Fn(&str) -> String) {
        for source in &mut self.sources {
            *source = f(source);
        }
    }

    pub fn generated_line_count(&self) -> usize {
        self.lines.len()
    }
}

fn decode_mappings(mappings: &str, source_count: usize) -> Result<Vec<Vec<Segment>>> {
    let invalid = |what: &str| IpackError::transform("source map", format!("invalid mappings: {what}"));

    let mut lines = Vec::new();
    let (mut source, mut orig_line, mut orig_col) = (0i64, 0i64, 0i64);

    for line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut gen_col = 0i64;
        for raw in line.split(',').filter(|s| !s.is_empty()) {
            let values = vlq::decode_segment(raw).ok_or_else(|| invalid(raw))?;
            match values.len() {
                1 => {
                    gen_col += values[0];
                    continue;
                }
                4 | 5 => {}
                _ => return Err(invalid(raw)),
            }
            gen_col += values[0];
            source += values[1];
            orig_line += values[2];
            orig_col += values[3];
            if gen_col < 0 || source < 0 || orig_line < 0 || orig_col < 0 {
                return Err(invalid(raw));
            }
            if source as usize >= source_count {
                return Err(invalid("source index out of range"));
            }
            segments.push(Segment {
                generated_column: gen_col as u32,
                source: source as u32,
                original_line: orig_line as u32,
                original_column: orig_col as u32,
            });
        }
        lines.push(segments);
    }
    Ok(lines)
}

#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    map: SourceMap,
    index: HashMap<String, u32>,
}

impl SourceMapBuilder {
    pub fn new(file: Option<&str>) -> Self {
        Self {
            map: SourceMap {
                file: file.map(str::to_string),
                ..SourceMap::default()
            },
            index: HashMap::new(),
        }
    }

    pub fn source_root(mut self, root: impl Into<String>) -> Self {
        self.map.source_root = Some(root.into());
        self
    }

    /// Register a source (deduplicated by name) and return its index.
    pub fn add_source(&mut self, name: &str, content: Option<&str>) -> u32 {
        if let Some(&idx) = self.index.get(name) {
            if content.is_some() && self.map.sources_content[idx as usize].is_none() {
                self.map.sources_content[idx as usize] = content.map(str::to_string);
            }
            return idx;
        }
        let idx = self.map.sources.len() as u32;
        self.map.sources.push(name.to_string());
        self.map.sources_content.push(content.map(str::to_string));
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn add_mapping(
        &mut self,
        generated_line: u32,
        generated_column: u32,
        source: u32,
        original_line: u32,
        original_column: u32,
    ) {
        let line = generated_line as usize;
        if self.map.lines.len() <= line {
            self.map.lines.resize_with(line + 1, Vec::new);
        }
        let segments = &mut self.map.lines[line];
        let seg = Segment {
            generated_column,
            source,
            original_line,
            original_column,
        };
        let at = segments.partition_point(|s| s.generated_column <= generated_column);
        segments.insert(at, seg);
    }

    /// Map `count` consecutive generated lines one-to-one onto consecutive
    /// original lines, column 0 to column 0.
    pub fn add_line_run(&mut self, generated_line: u32, source: u32, original_line: u32, count: u32) {
        for i in 0..count {
            self.add_mapping(generated_line + i, 0, source, original_line + i, 0);
        }
    }

    /// Make sure the map covers at least `count` generated lines.
    pub fn pad_lines(&mut self, count: usize) {
        if self.map.lines.len() < count {
            self.map.lines.resize_with(count, Vec::new);
        }
    }

    pub fn build(self) -> SourceMap {
        self.map
    }
}

/// Map of a transform stage whose output line `i` is input line `i`.
pub fn identity_lines(text: &str) -> SourceMap {
    let mut builder = SourceMapBuilder::new(None);
    let src = builder.add_source(INPUT_SOURCE, None);
    builder.add_line_run(0, src, 0, line_count(text));
    builder.build()
}

/// Number of lines `text` occupies once emitted (a trailing newline does not
/// open a new line).
pub fn line_count(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    let newlines = text.matches('\n').count() as u32;
    if text.ends_with('\n') { newlines } else { newlines + 1 }
}

/// Chain a stage map (`outer`, whose `<input>` is `inner`'s generated text)
/// onto the map of the previous stage.
pub fn compose(outer: &SourceMap, inner: &SourceMap) -> SourceMap {
    let mut builder = SourceMapBuilder::new(outer.file.as_deref().or(inner.file.as_deref()));
    if let Some(root) = inner.source_root.as_ref().or(outer.source_root.as_ref()) {
        builder = builder.source_root(root.clone());
    }

    for (gen_line, segments) in outer.lines.iter().enumerate() {
        for seg in segments {
            let Some(name) = outer.sources.get(seg.source as usize) else {
                continue;
            };

            if name == INPUT_SOURCE {
                let Some(pos) = inner.lookup(seg.original_line, seg.original_column) else {
                    continue;
                };
                let content = inner
                    .sources
                    .iter()
                    .position(|s| s == pos.source)
                    .and_then(|i| inner.sources_content.get(i).cloned().flatten());
                let src = builder.add_source(pos.source, content.as_deref());
                builder.add_mapping(gen_line as u32, seg.generated_column, src, pos.line, pos.column);
            } else {
                let content = outer.sources_content.get(seg.source as usize).cloned().flatten();
                let src = builder.add_source(name, content.as_deref());
                builder.add_mapping(
                    gen_line as u32,
                    seg.generated_column,
                    src,
                    seg.original_line,
                    seg.original_column,
                );
            }
        }
    }

    builder.pad_lines(outer.lines.len());
    builder.build()
}
