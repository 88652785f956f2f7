//! Plugin capability traits.
//!
//! An algorithm plugin is anything that can be built from validated
//! [`Params`](crate::params::Params), run to produce a result, and save that
//! result to an output destination. The dispatcher never looks inside the
//! result: it hands whatever [`Algorithm::run`] returned straight to
//! [`Algorithm::save`].

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::params::ConfigError;

/// Errors from constructing, running or saving a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Invalid parameters: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid value for '{field}': {message}")]
    InvalidParam { field: String, message: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Input data error: {0}")]
    Data(String),

    #[error("External plugin '{name}' failed: {message}")]
    External { name: String, message: String },
}

impl PluginError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        PluginError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extension-point categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    DataSource,
    Algorithm,
    Transfer,
    Painter,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::DataSource,
        Category::Algorithm,
        Category::Transfer,
        Category::Painter,
    ];

    /// Human-readable plural used in listings.
    pub fn plural(self) -> &'static str {
        match self {
            Category::DataSource => "DataSources",
            Category::Algorithm => "Algorithms",
            Category::Transfer => "Transfer Functions",
            Category::Painter => "Painters",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::DataSource => "DataSource",
            Category::Algorithm => "Algorithm",
            Category::Transfer => "Transfer",
            Category::Painter => "Painter",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "datasource" => Ok(Category::DataSource),
            "algorithm" => Ok(Category::Algorithm),
            "transfer" => Ok(Category::Transfer),
            "painter" => Ok(Category::Painter),
            other => Err(format!(
                "unknown plugin category '{}'; valid categories: datasource, algorithm, transfer, painter",
                other
            )),
        }
    }
}

/// Opaque result of an algorithm run.
pub type AlgorithmResult = Value;

/// The `{run, save}` capability every algorithm plugin provides.
pub trait Algorithm {
    /// Execute the algorithm.
    fn run(&self) -> Result<AlgorithmResult, PluginError>;

    /// Persist a result previously returned by [`run`](Algorithm::run).
    fn save(&self, output: &str, result: &AlgorithmResult) -> Result<(), PluginError>;
}
