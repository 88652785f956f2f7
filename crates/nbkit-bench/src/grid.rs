//! Cartesian expansion of named parameter lists.
//!
//! Parameter names are kept sorted, so the combination order depends only
//! on the names and values, never on insertion order: the last name varies
//! fastest, as in a nested loop over the sorted names.
//!
//! A name bound to an empty list is skipped entirely. It contributes a
//! factor of 1 to the number of combinations and does not appear in them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for GridValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridValue::Int(v) => write!(f, "{}", v),
            GridValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for GridValue {
    fn from(v: i64) -> Self {
        GridValue::Int(v)
    }
}

impl From<u32> for GridValue {
    fn from(v: u32) -> Self {
        GridValue::Int(i64::from(v))
    }
}

impl From<&str> for GridValue {
    fn from(s: &str) -> Self {
        GridValue::Text(s.to_string())
    }
}

impl From<String> for GridValue {
    fn from(s: String) -> Self {
        GridValue::Text(s)
    }
}

/// One point of the grid: `(name, value)` pairs in sorted-name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination(Vec<(String, GridValue)>);

impl Combination {
    pub fn get(&self, name: &str) -> Option<&GridValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GridValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Named parameter lists to expand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterGrid {
    params: BTreeMap<String, Vec<GridValue>>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `values`, replacing any previous binding.
    pub fn with<V>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<GridValue>,
    {
        self.insert(name, values);
        self
    }

    pub fn insert<V>(&mut self, name: &str, values: impl IntoIterator<Item = V>)
    where
        V: Into<GridValue>,
    {
        self.params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
    }

    /// Number of combinations: the product of the non-empty list lengths.
    ///
    /// Never zero; a grid without active names has one empty combination.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.params
            .values()
            .filter(|v| !v.is_empty())
            .map(Vec::len)
            .product()
    }

    /// Invoke `f` once per combination, in generation order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Combination),
    {
        let active: Vec<(&String, &Vec<GridValue>)> =
            self.params.iter().filter(|(_, v)| !v.is_empty()).collect();
        let mut cursor = vec![0usize; active.len()];

        loop {
            let combo = Combination(
                active
                    .iter()
                    .zip(&cursor)
                    .map(|((name, values), &i)| ((*name).clone(), values[i].clone()))
                    .collect(),
            );
            f(&combo);

            // Odometer increment, last name fastest.
            let mut pos = active.len();
            loop {
                if pos == 0 {
                    return;
                }
                pos -= 1;
                cursor[pos] += 1;
                if cursor[pos] < active[pos].1.len() {
                    break;
                }
                cursor[pos] = 0;
            }
        }
    }

    /// All combinations, in generation order.
    pub fn combinations(&self) -> Vec<Combination> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|c| out.push(c.clone()));
        out
    }
}
