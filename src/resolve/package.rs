// src/resolve/package.rs

use serde_json::Value;

/// Entry points named by a `package.json`, in `main_fields` order.
///
/// Only string-valued fields count; object-valued `browser` maps and empty
/// strings are skipped. Unparsable manifests yield nothing.
pub fn main_entries(manifest: &str, main_fields: &[String]) -> Vec<String> {
    let json: Value = match serde_json::from_str(manifest) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    main_fields
        .iter()
        .filter_map(|field| json.get(field).and_then(Value::as_str))
        .filter(|entry| !entry.trim().is_empty())
        .map(str::to_string)
        .collect()
}
