//! TOML deserialisation of benchmark matrix files.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::runner::BenchmarkRunner;
use crate::template::CommandTemplate;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Cannot read matrix file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid matrix file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Benchmark set {index}: {message}")]
    Invalid { index: usize, message: String },
}

/// Top-level benchmark matrix.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// Test module handed to the benchmark command as `{test_path}`.
    pub test_path: String,
    #[serde(default = "default_result_dir")]
    pub result_dir: PathBuf,
    /// Environment variable holding the host name. Empty disables it.
    #[serde(default = "default_host_env")]
    pub host_env: String,
    /// Command template; the historical benchmark command when absent.
    #[serde(default)]
    pub command: Option<CommandTemplate>,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkSet>,
}

/// One `[[benchmarks]]` table: a product of test names, core counts and
/// optional samples.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkSet {
    pub testnames: Vec<String>,
    pub ncores: Vec<u32>,
    #[serde(default)]
    pub samples: Vec<String>,
}

fn default_result_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_host_env() -> String {
    "NERSC_HOST".into()
}

impl MatrixConfig {
    /// Build a runner with every benchmark set registered, in file order.
    pub fn into_runner(self) -> Result<BenchmarkRunner, MatrixError> {
        let host_env = (!self.host_env.is_empty()).then_some(self.host_env);
        let mut runner = BenchmarkRunner::new(&self.test_path, self.result_dir)
            .with_template(self.command.unwrap_or_default())
            .with_host_env(host_env);

        for (index, set) in self.benchmarks.iter().enumerate() {
            if set.testnames.is_empty() {
                return Err(MatrixError::Invalid {
                    index,
                    message: "testnames must not be empty".into(),
                });
            }
            if set.ncores.is_empty() || set.ncores.contains(&0) {
                return Err(MatrixError::Invalid {
                    index,
                    message: "ncores must be a non-empty list of positive counts".into(),
                });
            }
            runner.add_commands(&set.testnames, &set.ncores, &set.samples);
        }
        Ok(runner)
    }
}

pub fn parse_matrix(text: &str) -> Result<MatrixConfig, MatrixError> {
    Ok(toml::from_str(text)?)
}

/// Load and parse a TOML benchmark matrix file.
pub fn load_matrix(path: &Path) -> Result<MatrixConfig, MatrixError> {
    let content = std::fs::read_to_string(path).map_err(|source| MatrixError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_matrix(&content)
}
