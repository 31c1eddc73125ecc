//! Redacting renderer for oracle prompts.
//!
//! Flattens a record into indented `key: value` lines. Keys that look like
//! opaque identifiers (`id`, `hash` anywhere in the lowercased key) are
//! dropped together with their values so they never reach the oracle.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref REDACTED_KEY: Regex = Regex::new(r"(?i)id|hash").unwrap();
}

const INDENT: &str = "  ";

/// Render a value into indented text, omitting identifier-like keys.
pub fn render(value: &Value) -> String {
    let mut lines = Vec::new();
    render_into(value, 0, &mut lines);
    lines.join("\n")
}

/// Whether a mapping key is withheld from rendered output.
pub fn is_redacted_key(key: &str) -> bool {
    REDACTED_KEY.is_match(key)
}

fn render_into(value: &Value, depth: usize, lines: &mut Vec<String>) {
    let pad = INDENT.repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter().filter(|(k, _)| !is_redacted_key(k)) {
                match child {
                    Value::Object(_) | Value::Array(_) => {
                        lines.push(format!("{}{}:", pad, key));
                        render_into(child, depth + 1, lines);
                    }
                    scalar => lines.push(format!("{}{}: {}", pad, key, scalar_text(scalar))),
                }
            }
        }
        // Elements share the sequence's own indent level.
        Value::Array(items) => {
            for item in items {
                render_into(item, depth, lines);
            }
        }
        scalar => lines.push(format!("{}{}", pad, scalar_text(scalar))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
