//! Parameter schemas and YAML configuration parsing.
//!
//! Each plugin declares a [`ParamSchema`]: the parameters it understands,
//! their kinds, defaults and help strings. [`ParamSchema::parse_known_yaml`]
//! splits a YAML mapping into the typed, validated parameters the plugin is
//! built from ([`Params`]) and everything else ([`Extra`]), which the
//! dispatcher inspects for fields such as `output`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{Number, Value};
use thiserror::Error;

/// Errors raised while turning configuration text into parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Malformed YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration must be a mapping of parameter names to values, got {0}")]
    NotAMapping(&'static str),

    #[error("Configuration keys must be strings, got {0}")]
    InvalidKey(String),

    #[error("Configuration value for '{field}' cannot be represented: {message}")]
    Unrepresentable { field: String, message: String },

    #[error("Missing required parameter '{0}'")]
    MissingField(String),

    #[error("Parameter '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: ParamKind,
        found: &'static str,
    },
}

/// The type a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamKind {
    String,
    Integer,
    /// Any number; integers are widened.
    Float,
    Boolean,
    FloatList,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Boolean => "boolean",
            ParamKind::FloatList => "float-list",
        };
        f.write_str(name)
    }
}

/// Declaration of a single plugin parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub help: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, help: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            help: help.into(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, default: Option<Value>, help: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default,
            help: help.into(),
        }
    }
}

/// Ordered list of parameter declarations for one plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    specs: Vec<ParamSpec>,
}

/// Validated parameter values keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, Value>);

/// Configuration fields not declared by the plugin's schema.
pub type Extra = Params;

impl ParamSchema {
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Parse YAML text into `(known, extra)` parameters.
    ///
    /// Empty text is an empty mapping. Known keys are type-checked and
    /// defaults are filled; a `null` value counts as absent.
    pub fn parse_known_yaml(&self, text: &str) -> Result<(Params, Extra), ConfigError> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        let mapping = match document {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            serde_yaml::Value::Mapping(m) => m,
            other => return Err(ConfigError::NotAMapping(yaml_kind(&other))),
        };

        let mut fields = BTreeMap::new();
        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                other => return Err(ConfigError::InvalidKey(format!("{:?}", other))),
            };
            let value = serde_json::to_value(&value).map_err(|e| ConfigError::Unrepresentable {
                field: key.clone(),
                message: e.to_string(),
            })?;
            fields.insert(key, value);
        }

        let mut known = BTreeMap::new();
        for spec in &self.specs {
            let supplied = fields.remove(&spec.name).filter(|v| !v.is_null());
            match supplied {
                Some(value) => {
                    known.insert(spec.name.clone(), coerce(spec, value)?);
                }
                None if spec.required => return Err(ConfigError::MissingField(spec.name.clone())),
                None => {
                    if let Some(default) = &spec.default {
                        known.insert(spec.name.clone(), coerce(spec, default.clone())?);
                    }
                }
            }
        }

        Ok((Params(known), Params(fields)))
    }
}

fn coerce(spec: &ParamSpec, value: Value) -> Result<Value, ConfigError> {
    let mismatch = |value: &Value| ConfigError::TypeMismatch {
        field: spec.name.clone(),
        expected: spec.kind,
        found: json_kind(value),
    };

    match spec.kind {
        ParamKind::String if value.is_string() => Ok(value),
        ParamKind::Integer if value.is_i64() || value.is_u64() => Ok(value),
        ParamKind::Boolean if value.is_boolean() => Ok(value),
        ParamKind::Float => value
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| mismatch(&value)),
        ParamKind::FloatList => {
            let items = value.as_array().ok_or_else(|| mismatch(&value))?;
            items
                .iter()
                .map(|item| item.as_f64().and_then(Number::from_f64).map(Value::Number))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
                .ok_or_else(|| mismatch(&value))
        }
        _ => Err(mismatch(&value)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    pub fn get_f64_list(&self, name: &str) -> Option<Vec<f64>> {
        self.0
            .get(name)?
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// All values as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}
