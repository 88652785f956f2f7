//! Deterministic short identifiers for run environments.
//!
//! The identifier is the leading hex digits of the SHA-1 digest of a
//! canonical JSON encoding: keys sorted, `", "` and `": "` separators, every
//! character outside printable ASCII escaped as `\uXXXX` (surrogate pairs
//! above the BMP). The layout is fixed so that identifiers of result
//! directories stay valid across releases.

use std::fmt::Write as _;

use serde_json::Value;
use sha1::{Digest, Sha1};

/// Default identifier length in hex characters.
pub const DEFAULT_ID_LEN: usize = 10;

/// Canonical encoding of `value` used as the digest input.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&str, &Value)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
            entries.sort_by_key(|(k, _)| *k);
            write_object(&entries, out);
        }
    }
}

/// Encode an object with its entries in the given order, using the same
/// separators and escaping as [`canonical_json`].
pub fn ordered_json(entries: &[(&str, &Value)]) -> String {
    let mut out = String::new();
    write_object(entries, &mut out);
    out
}

fn write_object(entries: &[(&str, &Value)], out: &mut String) {
    out.push('{');
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_string(key, out);
        out.push_str(": ");
        write_canonical(value, out);
    }
    out.push('}');
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

/// Identifier of `value` with the default length.
pub fn fingerprint(value: &Value) -> String {
    fingerprint_with_len(value, DEFAULT_ID_LEN)
}

/// Identifier of `value` truncated to `len` hex characters (at most 40).
pub fn fingerprint_with_len(value: &Value, len: usize) -> String {
    let digest = Sha1::digest(canonical_json(value).as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(len);
    hex
}
