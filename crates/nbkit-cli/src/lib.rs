//! # nbkit CLI
//!
//! The `nbkit` dispatcher: selects an algorithm by name, parses its YAML
//! configuration, runs it and saves the result. Every rank of a parallel
//! job runs the same dispatch; user-facing output appears once, from rank 0.
//!
//! ```sh
//! nbkit -c config.yaml -o power.json Describe
//! nbkit Histogram -h
//! nbkit -X plugins/ --list-algorithms
//! ```

pub mod dispatch;
pub mod logging;

pub use dispatch::{config_source, dispatch, Cli, DispatchError, Outcome};
