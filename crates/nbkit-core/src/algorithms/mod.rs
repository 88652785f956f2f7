//! Built-in reference algorithms.
//!
//! | Name | Module | Output |
//! |------|--------|--------|
//! | `Describe` | [`describe`] | JSON summary statistics |
//! | `Histogram` | [`histogram`] | CSV bin table |
//!
//! Both read one column of a whitespace-separated numeric text file. Lines
//! that are blank or start with `#` are skipped.

pub mod describe;
pub mod histogram;

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::params::Params;
use crate::plugin::PluginError;
use crate::registry::PluginEntry;

/// Registry entries for every built-in algorithm.
pub fn builtin_entries() -> Vec<PluginEntry> {
    vec![describe::entry(), histogram::entry()]
}

/// Read column `column` of a whitespace-separated numeric text file.
pub fn read_column(path: &Path, column: usize) -> Result<Vec<f64>, PluginError> {
    let content =
        fs::read_to_string(path).map_err(|e| PluginError::io(path.display().to_string(), e))?;
    parse_column(&content, column)
}

/// Parse column `column` out of text content.
pub fn parse_column(content: &str, column: usize) -> Result<Vec<f64>, PluginError> {
    let mut values = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let field = line.split_whitespace().nth(column).ok_or_else(|| {
            PluginError::Data(format!("line {}: no column {} in '{}'", idx + 1, column, line))
        })?;
        let value: f64 = field.parse().map_err(|_| {
            PluginError::Data(format!("line {}: '{}' is not a number", idx + 1, field))
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Shared `path` + `column` lookup for the column-based algorithms.
pub(crate) fn column_source(params: &Params) -> Result<(String, usize), PluginError> {
    let path = params
        .get_str("path")
        .ok_or_else(|| PluginError::InvalidParam {
            field: "path".into(),
            message: "a file path is required".into(),
        })?
        .to_string();
    let column = params.get_u64("column").unwrap_or(0) as usize;
    Ok((path, column))
}

/// Create the parent directories of `output`, if any.
pub(crate) fn ensure_parent(output: &Path) -> Result<(), PluginError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PluginError::io(parent.display().to_string(), e))?;
    }
    Ok(())
}

/// Write `value` as pretty-printed JSON to `output`.
pub(crate) fn write_json(output: &str, value: &Value) -> Result<(), PluginError> {
    let path = Path::new(output);
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PluginError::Data(format!("cannot encode result: {}", e)))?;
    fs::write(path, json).map_err(|e| PluginError::io(output, e))
}
