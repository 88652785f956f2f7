//! `Describe`: summary statistics of one data column.

use std::path::PathBuf;

use serde_json::json;

use super::{column_source, read_column, write_json};
use crate::params::{ParamKind, ParamSchema, ParamSpec, Params};
use crate::plugin::{Algorithm, AlgorithmResult, PluginError};
use crate::registry::{Factory, PluginEntry};
use crate::topology::GroupTopology;

pub struct Describe {
    path: PathBuf,
    column: usize,
    primary: bool,
}

pub fn entry() -> PluginEntry {
    PluginEntry::algorithm(
        "Describe",
        "summary statistics of one column of a text data file",
        ParamSchema::new(vec![
            ParamSpec::required("path", ParamKind::String, "whitespace-separated numeric text file"),
            ParamSpec::optional("column", ParamKind::Integer, Some(json!(0)), "zero-based column index"),
        ]),
        Factory::Builtin(build),
    )
    .with_description(
        "Computes count, mean, standard deviation, minimum and maximum and\n\
         saves them as a JSON object.",
    )
}

fn build(params: &Params, topology: &GroupTopology) -> Result<Box<dyn Algorithm>, PluginError> {
    let (path, column) = column_source(params)?;
    Ok(Box::new(Describe {
        path: PathBuf::from(path),
        column,
        primary: topology.role().is_primary(),
    }))
}

/// Population statistics of `values`; `None` when empty.
pub fn summarize(values: &[f64]) -> Option<(f64, f64, f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((mean, var.sqrt(), min, max))
}

impl Algorithm for Describe {
    fn run(&self) -> Result<AlgorithmResult, PluginError> {
        let values = read_column(&self.path, self.column)?;
        let (mean, std, min, max) = summarize(&values).ok_or_else(|| {
            PluginError::Data(format!("{} contains no samples", self.path.display()))
        })?;
        log::debug!("described {} samples from {}", values.len(), self.path.display());
        Ok(json!({
            "count": values.len(),
            "mean": mean,
            "std": std,
            "min": min,
            "max": max,
        }))
    }

    fn save(&self, output: &str, result: &AlgorithmResult) -> Result<(), PluginError> {
        if self.primary {
            write_json(output, result)?;
            log::info!("statistics written to {}", output);
        }
        Ok(())
    }
}
