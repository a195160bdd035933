//! Tabular data model
//!
//! Profiling only needs a narrow view of a dataset: its row count, named
//! columns, stable row identifiers and the ability to repeat or subset rows.
//! That view is the [`TabularSource`] trait, with adapters for:
//! - [`Dataset`] - owned columnar storage, also the type handed to predictors
//! - polars [`DataFrame`](polars::prelude::DataFrame)
//! - ndarray matrices through [`MatrixSource`]

mod dataset;
mod frame;
mod matrix;

pub use dataset::Dataset;
pub use matrix::MatrixSource;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell value: numeric or categorical
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

impl Value {
    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Categorical(_) => None,
        }
    }

    /// Try to get as a category level
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Numeric(_) => None,
            Value::Categorical(s) => Some(s),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Numeric(_))
    }

    // -0.0 and 0.0 compare equal, so they must hash equal too
    fn numeric_bits(v: f64) -> u64 {
        if v == 0.0 {
            0.0f64.to_bits()
        } else {
            v.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Numeric(a), Value::Numeric(b)) => {
                Value::numeric_bits(*a) == Value::numeric_bits(*b)
            }
            (Value::Categorical(a), Value::Categorical(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Numeric(v) => {
                0u8.hash(state);
                Value::numeric_bits(*v).hash(state);
            }
            Value::Categorical(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numbers sort before categories; numbers use IEEE total order.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Numeric(a), Value::Numeric(b)) => a.total_cmp(b),
            (Value::Categorical(a), Value::Categorical(b)) => a.cmp(b),
            (Value::Numeric(_), Value::Categorical(_)) => Ordering::Less,
            (Value::Categorical(_), Value::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Categorical(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Numeric(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Categorical(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Categorical(s)
    }
}

/// Values of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Numeric column; missing values are NaN
    Numeric(Vec<f64>),
    /// Categorical column
    Categorical(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    /// Get the value at a row
    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            ColumnData::Numeric(v) => v.get(row).map(|x| Value::Numeric(*x)),
            ColumnData::Categorical(v) => v.get(row).map(|s| Value::Categorical(s.clone())),
        }
    }

    /// Repeat every element `times` times consecutively
    pub fn repeat_each(&self, times: usize) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(
                v.iter()
                    .flat_map(|x| std::iter::repeat(*x).take(times))
                    .collect(),
            ),
            ColumnData::Categorical(v) => ColumnData::Categorical(
                v.iter()
                    .flat_map(|s| std::iter::repeat(s).take(times).cloned())
                    .collect(),
            ),
        }
    }

    /// Select rows by index, in the given order
    pub fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// Read-only access to tabular data
///
/// Split selection and profile building depend only on this capability, so
/// any storage backend can be profiled once it has an adapter.
pub trait TabularSource: Sync {
    /// Number of observations
    fn n_rows(&self) -> usize;

    /// Column names in storage order
    fn column_names(&self) -> Vec<String>;

    /// Materialize one column, or fail with `FeatureNotFound`
    fn column(&self, name: &str) -> Result<Cow<'_, ColumnData>>;

    /// Stable identifier of every row: explicit labels if present, else the
    /// 1-based row position
    fn row_ids(&self) -> Vec<String>;

    fn has_column(&self, name: &str) -> bool {
        self.column_names().iter().any(|c| c == name)
    }

    /// Copy the rows into an owned [`Dataset`]
    fn to_dataset(&self) -> Result<Dataset> {
        let columns = self
            .column_names()
            .into_iter()
            .map(|name| {
                let data = self.column(&name)?.into_owned();
                Ok((name, data))
            })
            .collect::<Result<Vec<_>>>()?;
        Dataset::with_row_ids(columns, self.row_ids())
    }

    /// Repeat each row `times` times consecutively, keeping row ids aligned
    fn repeat_rows(&self, times: usize) -> Result<Dataset> {
        self.to_dataset()?.repeat_each_row(times)
    }

    /// Keep only the rows at `indices`, in that order
    fn take_rows(&self, indices: &[usize]) -> Result<Dataset> {
        self.to_dataset()?.take(indices)
    }
}

/// 1-based positional row ids
pub(crate) fn positional_ids(n_rows: usize) -> Vec<String> {
    (1..=n_rows).map(|i| i.to_string()).collect()
}
