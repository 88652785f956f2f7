//! `Histogram`: equal-width binned counts of one data column.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::{column_source, ensure_parent, read_column};
use crate::params::{ParamKind, ParamSchema, ParamSpec, Params};
use crate::plugin::{Algorithm, AlgorithmResult, PluginError};
use crate::registry::{Factory, PluginEntry};
use crate::topology::GroupTopology;

/// Largest accepted `bins`.
pub const MAX_BINS: u64 = 1 << 20;

pub struct Histogram {
    path: PathBuf,
    column: usize,
    bins: usize,
    range: Option<(f64, f64)>,
    primary: bool,
}

pub fn entry() -> PluginEntry {
    PluginEntry::algorithm(
        "Histogram",
        "equal-width histogram of one column of a text data file",
        ParamSchema::new(vec![
            ParamSpec::required("path", ParamKind::String, "whitespace-separated numeric text file"),
            ParamSpec::optional("column", ParamKind::Integer, Some(json!(0)), "zero-based column index"),
            ParamSpec::optional("bins", ParamKind::Integer, Some(json!(10)), "number of bins"),
            ParamSpec::optional(
                "range",
                ParamKind::FloatList,
                None,
                "[lower, upper] edges; defaults to the data extent",
            ),
        ]),
        Factory::Builtin(build),
    )
    .with_description(
        "Values outside the range are dropped; the last bin includes its\n\
         upper edge. Saved as CSV with one row per bin.",
    )
}

fn build(params: &Params, topology: &GroupTopology) -> Result<Box<dyn Algorithm>, PluginError> {
    let (path, column) = column_source(params)?;

    let bins = params.get_u64("bins").unwrap_or(10);
    if !(1..=MAX_BINS).contains(&bins) {
        return Err(PluginError::InvalidParam {
            field: "bins".into(),
            message: format!("must be between 1 and {}, got {}", MAX_BINS, bins),
        });
    }
    let bins = bins as usize;

    let range = match params.get_f64_list("range") {
        None => None,
        Some(r) if r.len() == 2 && r[0] < r[1] && (r[1] - r[0]).is_finite() => Some((r[0], r[1])),
        Some(r) => {
            return Err(PluginError::InvalidParam {
                field: "range".into(),
                message: format!("expected [lower, upper] with lower < upper and a finite span, got {:?}", r),
            })
        }
    };

    Ok(Box::new(Histogram {
        path: PathBuf::from(path),
        column,
        bins,
        range,
        primary: topology.role().is_primary(),
    }))
}

/// Bin `values` into `bins` equal-width bins over `[lo, hi]`.
///
/// Returns `(edges, counts)` with `edges.len() == bins + 1`.
pub fn histogram(values: &[f64], bins: usize, lo: f64, hi: f64) -> (Vec<f64>, Vec<u64>) {
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0u64; bins];
    for &v in values {
        if !(lo..=hi).contains(&v) {
            continue;
        }
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (edges, counts)
}

fn data_extent(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_finite() {
        return None;
    }
    if min == max {
        Some((min - 0.5, max + 0.5))
    } else {
        Some((min, max))
    }
}

impl Algorithm for Histogram {
    fn run(&self) -> Result<AlgorithmResult, PluginError> {
        let values = read_column(&self.path, self.column)?;
        let (lo, hi) = match self.range {
            Some(r) => r,
            None => data_extent(&values).ok_or_else(|| {
                PluginError::Data(format!("{} has no finite data extent", self.path.display()))
            })?,
        };
        let (edges, counts) = histogram(&values, self.bins, lo, hi);
        Ok(json!({
            "source": self.path.display().to_string(),
            "column": self.column,
            "samples": values.len(),
            "edges": edges,
            "counts": counts,
        }))
    }

    fn save(&self, output: &str, result: &AlgorithmResult) -> Result<(), PluginError> {
        if !self.primary {
            return Ok(());
        }
        let malformed = || PluginError::Data("histogram result is missing edges or counts".into());
        let edges: Vec<f64> = result["edges"]
            .as_array()
            .ok_or_else(malformed)?
            .iter()
            .filter_map(Value::as_f64)
            .collect();
        let counts: Vec<u64> = result["counts"]
            .as_array()
            .ok_or_else(malformed)?
            .iter()
            .filter_map(Value::as_u64)
            .collect();
        if edges.len() != counts.len() + 1 {
            return Err(malformed());
        }

        let path = Path::new(output);
        ensure_parent(path)?;
        let io_err = |e| PluginError::io(output, e);
        let mut file = File::create(path).map_err(io_err)?;

        writeln!(file, "# Histogram of {} column {}", self.path.display(), self.column).map_err(io_err)?;
        writeln!(file, "# samples: {}", result["samples"]).map_err(io_err)?;
        writeln!(file, "#").map_err(io_err)?;
        writeln!(file, "bin_low,bin_high,count").map_err(io_err)?;
        for (i, count) in counts.iter().enumerate() {
            writeln!(file, "{:.6e},{:.6e},{}", edges[i], edges[i + 1], count).map_err(io_err)?;
        }

        log::info!("histogram written to {}", output);
        Ok(())
    }
}
