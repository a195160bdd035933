//! ndarray adapter

use super::{positional_ids, ColumnData, Dataset, TabularSource};
use crate::error::{CeterisError, Result};
use ndarray::{Array2, ArrayView2};
use std::borrow::Cow;

/// Numeric feature matrix with column names
pub struct MatrixSource<'a> {
    x: ArrayView2<'a, f64>,
    feature_names: Vec<String>,
}

impl<'a> MatrixSource<'a> {
    /// Wrap a matrix whose columns are named by `feature_names`
    pub fn new(x: ArrayView2<'a, f64>, feature_names: Vec<String>) -> Result<Self> {
        if feature_names.len() != x.ncols() {
            return Err(CeterisError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: feature_names.len().to_string(),
            });
        }
        Ok(Self { x, feature_names })
    }

    /// Name the columns `x0, x1, ...`
    pub fn with_default_names(x: ArrayView2<'a, f64>) -> Self {
        let feature_names = (0..x.ncols()).map(|i| format!("x{}", i)).collect();
        Self { x, feature_names }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl TabularSource for MatrixSource<'_> {
    fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    fn column_names(&self) -> Vec<String> {
        self.feature_names.clone()
    }

    fn column(&self, name: &str) -> Result<Cow<'_, ColumnData>> {
        let idx = self
            .feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CeterisError::FeatureNotFound(name.to_string()))?;
        Ok(Cow::Owned(ColumnData::Numeric(self.x.column(idx).to_vec())))
    }

    fn row_ids(&self) -> Vec<String> {
        positional_ids(self.x.nrows())
    }
}

impl Dataset {
    /// Row-major numeric matrix of all columns, for predictors backed by
    /// ndarray models
    pub fn to_array2(&self) -> Result<Array2<f64>> {
        let col_refs = self
            .iter()
            .map(|(name, data)| match data {
                ColumnData::Numeric(values) => Ok(values.as_slice()),
                ColumnData::Categorical(_) => Err(CeterisError::DataError(format!(
                    "Column '{}' is categorical and cannot be converted to a numeric matrix",
                    name
                ))),
            })
            .collect::<Result<Vec<&[f64]>>>()?;

        Ok(Array2::from_shape_fn((self.n_rows(), col_refs.len()), |(r, c)| {
            col_refs[c][r]
        }))
    }

    /// Numeric matrix of the selected columns, in the given order
    pub fn select_array2(&self, names: &[&str]) -> Result<Array2<f64>> {
        let col_refs = names
            .iter()
            .map(|name| match self.get(name) {
                Some(ColumnData::Numeric(values)) => Ok(values.as_slice()),
                Some(ColumnData::Categorical(_)) => Err(CeterisError::DataError(format!(
                    "Column '{}' is categorical and cannot be converted to a numeric matrix",
                    name
                ))),
                None => Err(CeterisError::FeatureNotFound(name.to_string())),
            })
            .collect::<Result<Vec<&[f64]>>>()?;

        Ok(Array2::from_shape_fn((self.n_rows(), col_refs.len()), |(r, c)| {
            col_refs[c][r]
        }))
    }
}
