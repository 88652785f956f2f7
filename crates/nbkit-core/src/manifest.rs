//! Plugin manifests loaded through `-X`.
//!
//! A manifest is a TOML file declaring one or more plugins:
//!
//! ```toml
//! [[plugin]]
//! name = "FFTPower"
//! category = "algorithm"
//! summary = "power spectrum of a particle catalogue"
//! command = ["python", "fftpower.py"]
//!
//! [[plugin.param]]
//! name = "Nmesh"
//! kind = "integer"
//! required = true
//! help = "mesh size per dimension"
//! ```
//!
//! `-X` accepts either a manifest file or a directory, in which case every
//! `*.toml` file directly inside it is loaded in name order.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::external::ExternalCommand;
use crate::params::{ParamSchema, ParamSpec};
use crate::plugin::Category;
use crate::registry::{Factory, PluginEntry};

/// Errors while locating or reading plugin manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Plugin path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid manifest {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    plugin: Vec<PluginDecl>,
}

#[derive(Debug, Deserialize)]
struct PluginDecl {
    name: String,
    category: Category,
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default)]
    param: Vec<ParamSpec>,
}

/// Load the plugin entries declared at `path` (file or directory).
pub fn load_path(path: &Path) -> Result<Vec<PluginEntry>, ManifestError> {
    if path.is_dir() {
        let read = fs::read_dir(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = read
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        files.sort();

        let mut entries = Vec::new();
        for file in files {
            entries.extend(load_file(&file)?);
        }
        Ok(entries)
    } else if path.is_file() {
        load_file(path)
    } else {
        Err(ManifestError::NotFound(path.to_path_buf()))
    }
}

fn load_file(path: &Path) -> Result<Vec<PluginEntry>, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: ManifestFile = toml::from_str(&content).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    manifest
        .plugin
        .into_iter()
        .map(|decl| build_entry(decl, base, path))
        .collect()
}

fn build_entry(decl: PluginDecl, base: &Path, path: &Path) -> Result<PluginEntry, ManifestError> {
    let invalid = |message: String| ManifestError::Invalid {
        path: path.to_path_buf(),
        message,
    };

    if decl.name.trim().is_empty() {
        return Err(invalid("plugin name must not be empty".into()));
    }

    let factory = match decl.command {
        Some(_) if decl.category != Category::Algorithm => {
            return Err(invalid(format!(
                "'{}': only algorithm plugins may declare a command",
                decl.name
            )))
        }
        Some(argv) => {
            let command = ExternalCommand::from_argv(&argv, base)
                .ok_or_else(|| invalid(format!("'{}': command must not be empty", decl.name)))?;
            Some(Factory::External(command))
        }
        None => None,
    };

    Ok(PluginEntry {
        name: decl.name,
        category: decl.category,
        summary: decl.summary,
        description: decl.description,
        schema: ParamSchema::new(decl.param),
        factory,
    })
}
