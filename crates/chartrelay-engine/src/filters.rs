//! Custom filters for release templates

use minijinja::Value;

/// Remove a prefix if present
///
/// Usage: {{ chart.app_version | trimprefix("v") }}
pub fn trimprefix(value: String, prefix: String) -> String {
    value
        .strip_prefix(&prefix)
        .map(str::to_string)
        .unwrap_or(value)
}

/// Remove a suffix if present
///
/// Usage: {{ name | trimsuffix("-chart") }}
pub fn trimsuffix(value: String, suffix: String) -> String {
    value
        .strip_suffix(&suffix)
        .map(str::to_string)
        .unwrap_or(value)
}

/// Escape characters that Markdown would interpret inline
///
/// Usage: {{ chart.description | mdescape }}
pub fn mdescape(value: Value) -> String {
    let s = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quote a string with double quotes
///
/// Usage: {{ chart.kube_version | quote }}
pub fn quote(value: Value) -> String {
    let s = if let Some(str_val) = value.as_str() {
        str_val.to_string()
    } else {
        value.to_string()
    };
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
