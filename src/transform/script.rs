// src/transform/script.rs

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{IpackError, Result};
use crate::sourcemap::identity_lines;
use crate::transform::{BoxFuture, ScriptTranspiler, TransformOutput};

fn pattern(p: &str) -> Regex {
    Regex::new(p).unwrap_or_else(|e| panic!("invalid module pattern {p}: {e}"))
}

static IMPORT_FROM: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^(\s*)import\s+(.+?)\s*from\s*["']([^"']+)["']\s*;?\s*$"#));
static IMPORT_BARE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^(\s*)import\s*["']([^"']+)["']\s*;?\s*$"#));
static EXPORT_FROM: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^(\s*)export\s*(.+?)\s*from\s*["']([^"']+)["']\s*;?\s*$"#));
static EXPORT_LIST: LazyLock<Regex> = LazyLock::new(|| pattern(r#"^\s*export\s*\{([^}]*)\}\s*;?\s*$"#));
static EXPORT_DEFAULT: LazyLock<Regex> = LazyLock::new(|| pattern(r#"^(\s*)export\s+default\s+"#));
static EXPORT_BINDING: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^(\s*)export\s+(const|let|var)\s+([A-Za-z_$][\w$]*)\s*="#));
static EXPORT_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"^(\s*)export\s+((?:async\s+)?function\s*\*?|class)\s*([A-Za-z_$][\w$]*)"#)
});
static MODULE_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"^\s*(?:import(?:\s+[\w{*$"']|\s*[{*"'])|export(?:\s|\{|\*))"#));

const ES_MODULE_FLAG: &str = r#"Object.defineProperty(exports, "__esModule", { value: true }); "#;

/// Built-in transpiler for the project's own modules.
///
/// Script text passes through except for ES module statements, which are
/// lowered to `require`/`exports` on the line they occupy. JSON modules
/// become `module.exports = <json>;` on one line per JSON line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranspiler;

impl ScriptTranspiler for PassthroughTranspiler {
    fn transpile<'a>(
        &'a self,
        path: &'a Path,
        source: &'a str,
    ) -> BoxFuture<'a, Result<TransformOutput>> {
        Box::pin(async move {
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if !is_json {
                return lower_es_modules(path, source);
            }

            serde_json::from_str::<serde_json::Value>(source).map_err(|e| {
                IpackError::transform("transpile", format!("{}: {e}", path.display()))
            })?;
            let body = source.trim_end();
            Ok(TransformOutput::unchanged(format!("module.exports = {body};\n")))
        })
    }
}

/// Names bound by an import clause such as `React, { useState as state }`.
#[derive(Debug, Default)]
struct ImportClause<'a> {
    default: Option<&'a str>,
    namespace: Option<&'a str>,
    /// `(imported, local)` pairs.
    named: Vec<(&'a str, &'a str)>,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `a, b as c` into `[(a, a), (b, c)]`. TypeScript `type` members are dropped.
fn parse_specifiers(list: &str) -> Option<Vec<(&str, &str)>> {
    let mut out = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let words: Vec<&str> = item.split_whitespace().collect();
        let pair = match words.as_slice() {
            ["type", _] | ["type", _, "as", _] => continue,
            [name] => (*name, *name),
            [name, "as", local] => (*name, *local),
            _ => return None,
        };
        if !is_identifier(pair.1) {
            return None;
        }
        out.push(pair);
    }
    Some(out)
}

fn parse_import_clause(clause: &str) -> Option<ImportClause<'_>> {
    let mut parsed = ImportClause::default();
    let mut rest = clause.trim();

    if let Some(open) = rest.find('{') {
        let close = rest.rfind('}')?;
        if close < open || !rest[close + 1..].trim().is_empty() {
            return None;
        }
        parsed.named = parse_specifiers(&rest[open + 1..close])?;
        rest = rest[..open].trim().trim_end_matches(',').trim();
    }

    for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('*') {
            Some(ns) => {
                let name = ns.trim().strip_prefix("as")?.trim();
                if !is_identifier(name) {
                    return None;
                }
                parsed.namespace = Some(name);
            }
            None if is_identifier(part) && parsed.default.is_none() => parsed.default = Some(part),
            None => return None,
        }
    }
    Some(parsed)
}

fn lower_import(clause: &str, specifier: &str, tmp: &str) -> Option<String> {
    let clause = parse_import_clause(clause)?;
    let load = format!("require({specifier:?})");

    match (&clause.default, &clause.namespace, clause.named.is_empty()) {
        (None, None, true) => return Some(format!("{load};")),
        (None, Some(ns), true) => return Some(format!("var {ns} = {load};")),
        _ => {}
    }

    let mut out = format!("var {tmp} = {load};");
    if let Some(name) = clause.default {
        out.push_str(&format!(" var {name} = {tmp} && {tmp}.__esModule ? {tmp}.default : {tmp};"));
    }
    if let Some(ns) = clause.namespace {
        out.push_str(&format!(" var {ns} = {tmp};"));
    }
    for (imported, local) in &clause.named {
        out.push_str(&format!(" var {local} = {tmp}.{imported};"));
    }
    Some(out)
}

fn lower_export_from(clause: &str, specifier: &str, tmp: &str) -> Option<String> {
    let load = format!("require({specifier:?})");
    let clause = clause.trim();

    if clause == "*" {
        return Some(format!(
            "(function (m) {{ for (var k in m) if (k !== \"default\") exports[k] = m[k]; }})({load});"
        ));
    }
    if let Some(ns) = clause.strip_prefix('*') {
        let name = ns.trim().strip_prefix("as")?.trim();
        return is_identifier(name).then(|| format!("exports.{name} = {load};"));
    }

    let inner = clause.strip_prefix('{')?.strip_suffix('}')?;
    let mut out = format!("var {tmp} = {load};");
    for (imported, exported) in parse_specifiers(inner)? {
        out.push_str(&format!(" exports.{exported} = {tmp}.{imported};"));
    }
    Some(out)
}

fn unsupported(path: &Path, line: usize) -> IpackError {
    IpackError::transform(
        "transpile",
        format!("{}:{}: unsupported module syntax", path.display(), line + 1),
    )
}

/// Rewrite ES module statements to CommonJS, one output line per input line.
///
/// `export function`/`export class` and `export { .. }` lists are assigned
/// on one extra line after the module body, where every binding exists.
fn lower_es_modules(path: &Path, source: &str) -> Result<TransformOutput> {
    if !source.contains("import") && !source.contains("export") {
        return Ok(TransformOutput::unchanged(source));
    }

    let mut lines: Vec<String> = Vec::new();
    let mut trailer: Vec<String> = Vec::new();
    let mut lowered = false;
    let mut exports = false;
    let mut temps = 0usize;
    let mut next_temp = || {
        temps += 1;
        format!("__import{temps}")
    };

    for (i, line) in source.lines().enumerate() {
        let out = if let Some(c) = IMPORT_BARE.captures(line) {
            format!("{}require({:?});", &c[1], &c[2])
        } else if let Some(c) = IMPORT_FROM.captures(line) {
            if c[2].trim_start().starts_with("type ") {
                String::new()
            } else {
                let body = lower_import(&c[2], &c[3], &next_temp()).ok_or_else(|| unsupported(path, i))?;
                format!("{}{body}", &c[1])
            }
        } else if let Some(c) = EXPORT_FROM.captures(line) {
            exports = true;
            let body = lower_export_from(&c[2], &c[3], &next_temp()).ok_or_else(|| unsupported(path, i))?;
            format!("{}{body}", &c[1])
        } else if let Some(c) = EXPORT_LIST.captures(line) {
            exports = true;
            for (local, exported) in parse_specifiers(&c[1]).ok_or_else(|| unsupported(path, i))? {
                trailer.push(format!("exports.{exported} = {local};"));
            }
            String::new()
        } else if let Some(c) = EXPORT_DEFAULT.captures(line) {
            exports = true;
            format!("{}exports.default = {}", &c[1], &line[c[0].len()..])
        } else if let Some(c) = EXPORT_BINDING.captures(line) {
            exports = true;
            let name = &c[3];
            format!("{}{} {name} = exports.{name} ={}", &c[1], &c[2], &line[c[0].len()..])
        } else if let Some(c) = EXPORT_DECLARATION.captures(line) {
            exports = true;
            let name = &c[3];
            trailer.push(format!("exports.{name} = {name};"));
            format!("{}{} {name}{}", &c[1], c[2].trim_end(), &line[c[0].len()..])
        } else if MODULE_SYNTAX.is_match(line) {
            return Err(unsupported(path, i));
        } else {
            lines.push(line.to_string());
            continue;
        };
        lowered = true;
        lines.push(out);
    }

    if !lowered {
        return Ok(TransformOutput::unchanged(source));
    }
    if exports {
        if let Some(first) = lines.first_mut() {
            first.insert_str(0, ES_MODULE_FLAG);
        }
    }

    let mut code = lines.join("\n");
    code.push('\n');
    if trailer.is_empty() {
        return Ok(TransformOutput::unchanged(code));
    }
    code.push_str(&trailer.join(" "));
    code.push('\n');
    Ok(TransformOutput {
        code,
        map: Some(identity_lines(source)),
    })
}
