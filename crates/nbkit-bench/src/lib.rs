//! # nbkit Bench
//!
//! Benchmark matrix generation and execution. A matrix of test names, core
//! counts and samples is expanded into an index-addressed list of commands;
//! running entry `i` executes that command with its results stored in a
//! directory named after the environment it ran in.
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Cartesian expansion of parameter lists | [`grid`] |
//! | Index-addressed command list | [`registry`] |
//! | Argument templates rendered per entry | [`template`] |
//! | Environment identifiers | [`fingerprint`] |
//! | Fingerprinted result directories | [`resultdir`] |
//! | Registration and execution | [`runner`] |
//! | TOML matrix files | [`matrix`] |

pub mod fingerprint;
pub mod grid;
pub mod matrix;
pub mod registry;
pub mod resultdir;
pub mod runner;
pub mod template;

pub use fingerprint::{fingerprint, fingerprint_with_len};
pub use grid::{Combination, GridValue, ParameterGrid};
pub use matrix::{load_matrix, MatrixConfig, MatrixError};
pub use registry::{Command, CommandEntry, CommandRegistry, Tag};
pub use resultdir::{EnvironmentFacts, ResultDirectory};
pub use runner::{BenchCli, BenchError, BenchmarkRunner, ExecuteArgs};
pub use template::{ArgTemplate, CommandTemplate, TemplateError};
