//! Split point selection
//!
//! For every requested variable a grid of representative values is chosen:
//! empirical quantiles (or an even sweep) for numeric columns, the distinct
//! observed levels for categorical ones.

use super::config::{validate_grid_points, ProfileConfig, SplitType};
use crate::data::{ColumnData, TabularSource, Value};
use crate::error::{CeterisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ordered distinct values a variable is swept across
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Grid {
    /// Strictly increasing numeric values
    Numeric(Vec<f64>),
    /// Distinct levels in first-occurrence order
    Categorical(Vec<String>),
}

impl Grid {
    pub fn len(&self) -> usize {
        match self {
            Grid::Numeric(v) => v.len(),
            Grid::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Grid::Numeric(_))
    }

    pub fn get(&self, idx: usize) -> Option<Value> {
        match self {
            Grid::Numeric(v) => v.get(idx).map(|x| Value::Numeric(*x)),
            Grid::Categorical(v) => v.get(idx).map(|s| Value::Categorical(s.clone())),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// The whole grid repeated once per observation, as a column
    pub fn tile(&self, n_observations: usize) -> ColumnData {
        match self {
            Grid::Numeric(v) => ColumnData::Numeric(v.repeat(n_observations)),
            Grid::Categorical(v) => ColumnData::Categorical(
                v.iter().cycle().take(v.len() * n_observations).cloned().collect(),
            ),
        }
    }
}

/// Grids for a set of variables, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSplits {
    splits: Vec<(String, Grid)>,
}

impl VariableSplits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grid, replacing an existing grid for the same variable in place
    pub fn insert(&mut self, variable: impl Into<String>, grid: Grid) {
        let variable = variable.into();
        match self.splits.iter_mut().find(|(name, _)| *name == variable) {
            Some((_, existing)) => *existing = grid,
            None => self.splits.push((variable, grid)),
        }
    }

    pub fn get(&self, variable: &str) -> Option<&Grid> {
        self.splits
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, grid)| grid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Grid)> {
        self.splits.iter().map(|(name, grid)| (name.as_str(), grid))
    }

    pub fn variables(&self) -> Vec<&str> {
        self.splits.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }
}

/// Empirical quantile of ascending `sorted` data with linear interpolation
/// between order statistics: `h = (n - 1) p`,
/// `q = x[floor h] + (h - floor h) (x[floor h + 1] - x[floor h])`.
///
/// Returns NaN for empty input; `p` is clamped to `[0, 1]`.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    if lo + 1 >= n {
        return sorted[n - 1];
    }
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

/// Selects grids for variables of a dataset
#[derive(Debug, Clone)]
pub struct SplitSelector {
    grid_points: usize,
    split_type: SplitType,
    include_observation_values: bool,
}

impl Default for SplitSelector {
    fn default() -> Self {
        Self::from_config(&ProfileConfig::default())
    }
}

impl SplitSelector {
    /// Create a quantile selector with `grid_points` candidate points
    pub fn new(grid_points: usize) -> Self {
        Self {
            grid_points,
            split_type: SplitType::Quantiles,
            include_observation_values: false,
        }
    }

    pub fn from_config(config: &ProfileConfig) -> Self {
        Self {
            grid_points: config.grid_points,
            split_type: config.split_type,
            include_observation_values: config.include_observation_values,
        }
    }

    pub fn with_split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = split_type;
        self
    }

    pub fn with_observation_values(mut self, include: bool) -> Self {
        self.include_observation_values = include;
        self
    }

    /// Compute grids for `variables` from `data`
    ///
    /// Every variable is checked before any grid is computed, so an unknown
    /// name aborts the whole call.
    pub fn compute<D, S>(&self, data: &D, variables: &[S]) -> Result<VariableSplits>
    where
        D: TabularSource + ?Sized,
        S: AsRef<str>,
    {
        validate_grid_points(self.grid_points)?;
        check_variables(data, variables)?;

        let mut splits = VariableSplits::new();
        for variable in variables {
            let variable = variable.as_ref();
            let column = data.column(variable)?;
            let grid = self.grid_for(variable, &column)?;
            debug!(variable, grid_size = grid.len(), "computed variable split");
            splits.insert(variable, grid);
        }
        Ok(splits)
    }

    /// Compute grids for every column of `data`
    pub fn compute_all<D>(&self, data: &D) -> Result<VariableSplits>
    where
        D: TabularSource + ?Sized,
    {
        self.compute(data, &data.column_names())
    }

    /// Compute grids from `reference`, merging in the values the explained
    /// `observations` take when observation values are enabled
    pub fn compute_with_observations<D, O, S>(
        &self,
        reference: &D,
        observations: &O,
        variables: &[S],
    ) -> Result<VariableSplits>
    where
        D: TabularSource + ?Sized,
        O: TabularSource + ?Sized,
        S: AsRef<str>,
    {
        check_variables(observations, variables)?;
        let mut splits = self.compute(reference, variables)?;
        if !self.include_observation_values {
            return Ok(splits);
        }

        for variable in variables {
            let variable = variable.as_ref();
            let observed = observations.column(variable)?;
            let grid = match splits.get(variable) {
                Some(grid) => merge_observed(variable, grid, &observed)?,
                None => continue,
            };
            debug!(variable, grid_size = grid.len(), "merged observation values into split");
            splits.insert(variable, grid);
        }
        Ok(splits)
    }

    fn grid_for(&self, variable: &str, column: &ColumnData) -> Result<Grid> {
        match column {
            ColumnData::Numeric(values) => {
                let grid = self.numeric_grid(variable, values)?;
                Ok(Grid::Numeric(grid))
            }
            ColumnData::Categorical(values) => Ok(Grid::Categorical(distinct_levels(values))),
        }
    }

    fn numeric_grid(&self, variable: &str, values: &[f64]) -> Result<Vec<f64>> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.len() < values.len() {
            warn!(
                variable,
                missing = values.len() - sorted.len(),
                "ignoring missing values in split computation"
            );
        }
        if sorted.is_empty() {
            return Err(CeterisError::InvalidArgument(format!(
                "Variable '{}' has no observed numeric values",
                variable
            )));
        }
        sorted.sort_by(f64::total_cmp);

        let steps = (self.grid_points - 1) as f64;
        let mut grid: Vec<f64> = match self.split_type {
            SplitType::Quantiles => (0..self.grid_points)
                .map(|i| quantile(&sorted, i as f64 / steps))
                .collect(),
            SplitType::Uniform => {
                let min = sorted[0];
                let max = sorted[sorted.len() - 1];
                let step = (max - min) / steps;
                (0..self.grid_points)
                    .map(|i| if i + 1 == self.grid_points { max } else { min + i as f64 * step })
                    .collect()
            }
        };
        grid.sort_by(f64::total_cmp);
        grid.dedup();
        Ok(grid)
    }
}

/// Compute grids for `variables` with the quantile method
pub fn compute_splits<D, S>(data: &D, variables: &[S], grid_points: usize) -> Result<VariableSplits>
where
    D: TabularSource + ?Sized,
    S: AsRef<str>,
{
    SplitSelector::new(grid_points).compute(data, variables)
}

fn check_variables<D, S>(data: &D, variables: &[S]) -> Result<()>
where
    D: TabularSource + ?Sized,
    S: AsRef<str>,
{
    let available = data.column_names();
    for variable in variables {
        let variable = variable.as_ref();
        if !available.iter().any(|c| c == variable) {
            return Err(CeterisError::FeatureNotFound(variable.to_string()));
        }
    }
    Ok(())
}

fn distinct_levels(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

fn merge_observed(variable: &str, grid: &Grid, observed: &ColumnData) -> Result<Grid> {
    match (grid, observed) {
        (Grid::Numeric(grid), ColumnData::Numeric(observed)) => {
            let mut merged: Vec<f64> = grid
                .iter()
                .chain(observed.iter())
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            merged.sort_by(f64::total_cmp);
            merged.dedup();
            Ok(Grid::Numeric(merged))
        }
        (Grid::Categorical(grid), ColumnData::Categorical(observed)) => {
            let merged: Vec<String> = grid.iter().chain(observed.iter()).cloned().collect();
            Ok(Grid::Categorical(distinct_levels(&merged)))
        }
        _ => Err(CeterisError::DataError(format!(
            "Variable '{}' has different types in the reference data and the observations",
            variable
        ))),
    }
}
