//! Name-keyed registry of extension points.
//!
//! The registry maps `(category, name)` to a [`PluginEntry`] carrying the
//! plugin's help text, its [`ParamSchema`] and, for algorithms, the
//! [`Factory`] that builds a runnable instance. Built-in algorithms are
//! registered by [`Registry::with_builtins`]; further entries come from
//! plugin manifests loaded with [`Registry::load_path`].

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use crate::algorithms;
use crate::external::{ExternalAlgorithm, ExternalCommand};
use crate::manifest::{self, ManifestError};
use crate::params::{ConfigError, Extra, ParamSchema, Params};
use crate::plugin::{Algorithm, Category, PluginError};
use crate::topology::GroupTopology;

/// Errors from registry lookups and registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{category} '{name}' is already registered")]
    Duplicate { category: Category, name: String },

    #[error("invalid choice: '{name}' (choose from {valid})")]
    Unknown {
        category: Category,
        name: String,
        valid: String,
    },

    #[error("{category} '{name}' has no runnable implementation")]
    NotRunnable { category: Category, name: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Constructor for a built-in algorithm.
pub type BuiltinFactory =
    fn(&Params, &GroupTopology) -> Result<Box<dyn Algorithm>, PluginError>;

/// How a runnable plugin is instantiated.
#[derive(Clone)]
pub enum Factory {
    /// Compiled into this binary.
    Builtin(BuiltinFactory),
    /// An executable described by a plugin manifest.
    External(ExternalCommand),
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Builtin(_) => f.write_str("Builtin"),
            Factory::External(cmd) => f.debug_tuple("External").field(cmd).finish(),
        }
    }
}

/// A registered extension point.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub name: String,
    pub category: Category,
    /// One-line summary shown in listings.
    pub summary: String,
    /// Longer free-form description shown in help.
    pub description: String,
    pub schema: ParamSchema,
    pub factory: Option<Factory>,
}

impl PluginEntry {
    pub fn algorithm(name: &str, summary: &str, schema: ParamSchema, factory: Factory) -> Self {
        Self {
            name: name.into(),
            category: Category::Algorithm,
            summary: summary.into(),
            description: String::new(),
            schema,
            factory: Some(factory),
        }
    }

    /// An entry that is listed and documented but not instantiated here.
    pub fn descriptor(category: Category, name: &str, summary: &str, schema: ParamSchema) -> Self {
        Self {
            name: name.into(),
            category,
            summary: summary.into(),
            description: String::new(),
            schema,
            factory: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.into();
        self
    }

    /// Full help text: summary, description and parameter table.
    pub fn format_help(&self) -> String {
        let mut help = String::new();
        let _ = writeln!(help, "{} ({}): {}", self.name, self.category, self.summary);
        if !self.description.is_empty() {
            let _ = writeln!(help);
            let _ = writeln!(help, "{}", self.description.trim_end());
        }
        let _ = writeln!(help);
        let _ = writeln!(help, "Parameters");
        let _ = writeln!(help, "----------");
        if self.schema.is_empty() {
            let _ = writeln!(help, "  (none)");
        }
        for spec in self.schema.specs() {
            let qualifier = match (&spec.default, spec.required) {
                (_, true) => "required".to_string(),
                (Some(default), false) => format!("default: {}", default),
                (None, false) => "optional".to_string(),
            };
            let _ = writeln!(help, "  {} : {} ({})", spec.name, spec.kind, qualifier);
            if !spec.help.is_empty() {
                let _ = writeln!(help, "      {}", spec.help);
            }
        }
        help
    }
}

/// All registered extension points, grouped by category.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<Category, BTreeMap<String, PluginEntry>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in algorithms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in algorithms::builtin_entries() {
            registry.insert(entry);
        }
        registry
    }

    fn insert(&mut self, entry: PluginEntry) {
        log::debug!("registered {} '{}'", entry.category, entry.name);
        self.entries
            .entry(entry.category)
            .or_default()
            .insert(entry.name.clone(), entry);
    }

    pub fn register(&mut self, entry: PluginEntry) -> Result<(), RegistryError> {
        if self.get(entry.category, &entry.name).is_some() {
            return Err(RegistryError::Duplicate {
                category: entry.category,
                name: entry.name,
            });
        }
        self.insert(entry);
        Ok(())
    }

    /// Register every plugin described by the manifest(s) at `path`.
    ///
    /// Returns the number of entries added.
    pub fn load_path(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let entries = manifest::load_path(path)?;
        let count = entries.len();
        for entry in entries {
            self.register(entry)?;
        }
        log::info!("loaded {} plugin(s) from {}", count, path.display());
        Ok(count)
    }

    /// Sorted names registered under `category`.
    pub fn names(&self, category: Category) -> Vec<&str> {
        self.entries
            .get(&category)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&PluginEntry> {
        self.entries.get(&category)?.get(name)
    }

    pub fn entries(&self, category: Category) -> impl Iterator<Item = &PluginEntry> {
        self.entries.get(&category).into_iter().flat_map(|m| m.values())
    }

    /// Look up `name` under `category`, naming the valid choices on failure.
    pub fn lookup(&self, category: Category, name: &str) -> Result<&PluginEntry, RegistryError> {
        self.get(category, name).ok_or_else(|| RegistryError::Unknown {
            category,
            name: name.into(),
            valid: self
                .names(category)
                .iter()
                .map(|n| format!("'{}'", n))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    pub fn format_help(&self, category: Category, name: &str) -> Result<String, RegistryError> {
        Ok(self.lookup(category, name)?.format_help())
    }

    /// Split YAML configuration text for algorithm `name` into known
    /// parameters and extra fields.
    pub fn parse_known_yaml(&self, name: &str, text: &str) -> Result<(Params, Extra), RegistryError> {
        let entry = self.lookup(Category::Algorithm, name)?;
        Ok(entry.schema.parse_known_yaml(text)?)
    }

    /// Build a runnable instance of algorithm `name`.
    pub fn instantiate(
        &self,
        name: &str,
        params: &Params,
        topology: &GroupTopology,
    ) -> Result<Box<dyn Algorithm>, RegistryError> {
        let entry = self.lookup(Category::Algorithm, name)?;
        match &entry.factory {
            Some(Factory::Builtin(build)) => Ok(build(params, topology)?),
            Some(Factory::External(command)) => Ok(Box::new(ExternalAlgorithm::new(
                &entry.name,
                command.clone(),
                params.clone(),
                topology.role(),
            ))),
            None => Err(RegistryError::NotRunnable {
                category: entry.category,
                name: entry.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamKind, ParamSpec};

    #[test]
    fn test_every_builtin_is_registered() {
        let registry = Registry::with_builtins();
        let mut expected: Vec<String> = algorithms::builtin_entries().into_iter().map(|e| e.name).collect();
        expected.sort();
        assert_eq!(registry.names(Category::Algorithm), expected);

        let mut again = Registry::new();
        for entry in algorithms::builtin_entries() {
            again.register(entry).unwrap();
        }
        assert_eq!(again.names(Category::Algorithm), expected);
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.names(Category::Algorithm), vec!["Describe", "Histogram"]);
        assert!(registry.names(Category::Painter).is_empty());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = Registry::new();
        let entry = PluginEntry::descriptor(Category::Painter, "Default", "paint", ParamSchema::default());
        registry.register(entry.clone()).unwrap();
        assert!(matches!(
            registry.register(entry),
            Err(RegistryError::Duplicate { category: Category::Painter, .. })
        ));
    }

    #[test]
    fn test_same_name_in_different_categories() {
        let mut registry = Registry::new();
        for category in [Category::Transfer, Category::Painter] {
            registry
                .register(PluginEntry::descriptor(category, "Default", "x", ParamSchema::default()))
                .unwrap();
        }
        assert_eq!(registry.names(Category::Transfer), vec!["Default"]);
    }

    #[test]
    fn test_unknown_name_lists_choices() {
        let registry = Registry::with_builtins();
        let err = registry.lookup(Category::Algorithm, "FFTPower").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid choice: 'FFTPower' (choose from 'Describe', 'Histogram')"
        );
    }

    #[test]
    fn test_help_lists_parameters() {
        let entry = PluginEntry::descriptor(
            Category::DataSource,
            "Plain",
            "plain text columns",
            ParamSchema::new(vec![
                ParamSpec::required("path", ParamKind::String, "the file"),
                ParamSpec::optional("skip", ParamKind::Integer, Some(serde_json::json!(0)), ""),
            ]),
        )
        .with_description("Reads columns.");
        let help = entry.format_help();
        assert!(help.starts_with("Plain (DataSource): plain text columns\n"));
        assert!(help.contains("Reads columns."));
        assert!(help.contains("  path : string (required)\n      the file\n"));
        assert!(help.contains("  skip : integer (default: 0)\n"));
    }

    #[test]
    fn test_descriptor_is_not_runnable() {
        let mut registry = Registry::new();
        registry
            .register(PluginEntry::descriptor(
                Category::Algorithm,
                "Remote",
                "documented only",
                ParamSchema::default(),
            ))
            .unwrap();
        let err = registry
            .instantiate("Remote", &Params::default(), &GroupTopology::single())
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::NotRunnable { .. }));
    }
}
