//! # nbkit Core
//!
//! Shared building blocks for the `nbkit` command-line tools: who prints in a
//! multi-process job, which plugins exist, and how a plugin's configuration
//! is parsed and validated.
//!
//! ## Modules
//!
//! - [`topology`]: Rank detection and the rank-gated [`Console`](topology::Console).
//! - [`plugin`]: Extension-point categories and the [`Algorithm`](plugin::Algorithm) capability.
//! - [`params`]: Parameter schemas and `parse_known_yaml`.
//! - [`registry`]: Name-keyed extension-point registry.
//! - [`manifest`]: Plugin manifests loaded through `-X`.
//! - [`external`]: Algorithms backed by external executables.
//! - [`algorithms`]: Built-in reference algorithms.

pub mod algorithms;
pub mod external;
pub mod manifest;
pub mod params;
pub mod plugin;
pub mod registry;
pub mod topology;

pub use params::{ConfigError, Extra, ParamKind, ParamSchema, ParamSpec, Params};
pub use plugin::{Algorithm, AlgorithmResult, Category, PluginError};
pub use registry::{Factory, PluginEntry, Registry, RegistryError};
pub use topology::{Console, GroupTopology, Role};
