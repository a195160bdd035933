//! Owned columnar dataset

use super::{positional_ids, ColumnData, TabularSource, Value};
use crate::error::{CeterisError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;

/// In-memory table of named columns with stable row ids
///
/// Synthetic profile rows are materialized as a `Dataset` before they are
/// passed to a [`Predictor`](crate::explainability::Predictor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<ColumnData>,
    row_ids: Vec<String>,
}

impl Dataset {
    /// Create a dataset with 1-based positional row ids
    pub fn new(columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        Self::with_row_ids(columns, positional_ids(n_rows))
    }

    /// Create a dataset with explicit row labels
    pub fn with_row_ids(columns: Vec<(String, ColumnData)>, row_ids: Vec<String>) -> Result<Self> {
        let n_rows = row_ids.len();
        let mut seen = HashSet::new();

        for (name, data) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(CeterisError::InvalidArgument(format!(
                    "Duplicate column name '{}'",
                    name
                )));
            }
            if data.len() != n_rows {
                return Err(CeterisError::ShapeError {
                    expected: format!("{} rows in column '{}'", n_rows, name),
                    actual: data.len().to_string(),
                });
            }
        }

        let (names, columns) = columns.into_iter().unzip();
        Ok(Self {
            names,
            columns,
            row_ids,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Borrow a column by name
    pub fn get(&self, name: &str) -> Option<&ColumnData> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    /// Iterate over `(name, column)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Value of one cell
    pub fn value(&self, row: usize, name: &str) -> Option<Value> {
        self.get(name).and_then(|c| c.get(row))
    }

    /// All values of one row, in column order
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        if row >= self.n_rows() {
            return None;
        }
        self.columns.iter().map(|c| c.get(row)).collect()
    }

    /// Replace the values of an existing column
    pub fn replace_column(&mut self, name: &str, data: ColumnData) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| CeterisError::FeatureNotFound(name.to_string()))?;
        if data.len() != self.n_rows() {
            return Err(CeterisError::ShapeError {
                expected: format!("{} rows in column '{}'", self.n_rows(), name),
                actual: data.len().to_string(),
            });
        }
        self.columns[idx] = data;
        Ok(())
    }

    /// Repeat each row `times` times consecutively
    pub fn repeat_each_row(&self, times: usize) -> Result<Dataset> {
        let row_ids = self
            .row_ids
            .iter()
            .flat_map(|id| std::iter::repeat(id).take(times).cloned())
            .collect();
        Ok(Dataset {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.repeat_each(times)).collect(),
            row_ids,
        })
    }

    /// Keep only the rows at `indices`, in that order
    pub fn take(&self, indices: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows()) {
            return Err(CeterisError::InvalidArgument(format!(
                "Row index {} out of bounds (n_rows={})",
                bad,
                self.n_rows()
            )));
        }
        Ok(Dataset {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            row_ids: indices.iter().map(|&i| self.row_ids[i].clone()).collect(),
        })
    }

    /// Draw `n` observations without replacement, keeping their original order
    ///
    /// Returns the whole dataset when `n` is not smaller than the row count.
    pub fn sample(&self, n: usize, seed: Option<u64>) -> Result<Dataset> {
        if n >= self.n_rows() {
            return Ok(self.clone());
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut indices = rand::seq::index::sample(&mut rng, self.n_rows(), n).into_vec();
        indices.sort_unstable();
        self.take(&indices)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl TabularSource for Dataset {
    fn n_rows(&self) -> usize {
        Dataset::n_rows(self)
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn column(&self, name: &str) -> Result<Cow<'_, ColumnData>> {
        self.get(name)
            .map(Cow::Borrowed)
            .ok_or_else(|| CeterisError::FeatureNotFound(name.to_string()))
    }

    fn row_ids(&self) -> Vec<String> {
        self.row_ids.clone()
    }

    fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn to_dataset(&self) -> Result<Dataset> {
        Ok(self.clone())
    }

    fn repeat_rows(&self, times: usize) -> Result<Dataset> {
        self.repeat_each_row(times)
    }

    fn take_rows(&self, indices: &[usize]) -> Result<Dataset> {
        self.take(indices)
    }
}
