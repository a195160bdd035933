//! Ceteris paribus profile construction
//!
//! For every variable with a grid, each observation is repeated once per grid
//! point with only that variable overridden, the predictor is asked for all
//! synthetic rows at once, and the predictions are attached as profile rows.

use super::config::ProfileConfig;
use super::splits::{Grid, SplitSelector, VariableSplits};
use crate::data::{Dataset, TabularSource, Value};
use crate::error::{CeterisError, Result};
use crate::utils::{try_map_ordered, ParallelConfig};
use ndarray::{Array1, Array2};
use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Output of a predictor for a batch of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predictions {
    /// One value per row
    Scalar(Vec<f64>),
    /// One probability per class per row; `values[row][class]`
    Probabilities {
        classes: Vec<String>,
        values: Vec<Vec<f64>>,
    },
}

impl Predictions {
    /// Number of rows predicted
    pub fn len(&self) -> usize {
        match self {
            Predictions::Scalar(v) => v.len(),
            Predictions::Probabilities { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Class probabilities from a `(n_rows, n_classes)` matrix
    pub fn from_probabilities(classes: Vec<String>, probabilities: &Array2<f64>) -> Result<Self> {
        if probabilities.ncols() != classes.len() {
            return Err(CeterisError::ShapeError {
                expected: format!("{} class columns", classes.len()),
                actual: probabilities.ncols().to_string(),
            });
        }
        let values = probabilities.rows().into_iter().map(|row| row.to_vec()).collect();
        Ok(Predictions::Probabilities { classes, values })
    }
}

impl From<Vec<f64>> for Predictions {
    fn from(values: Vec<f64>) -> Self {
        Predictions::Scalar(values)
    }
}

impl From<Array1<f64>> for Predictions {
    fn from(values: Array1<f64>) -> Self {
        Predictions::Scalar(values.to_vec())
    }
}

/// A fitted model seen only through its prediction function
///
/// Implementations must return one prediction per input row, in row order.
/// Model handles and extra arguments live inside the implementor.
pub trait Predictor: Send + Sync {
    fn predict(&self, rows: &Dataset) -> Result<Predictions>;
}

impl<F> Predictor for F
where
    F: Fn(&Dataset) -> Result<Predictions> + Send + Sync,
{
    fn predict(&self, rows: &Dataset) -> Result<Predictions> {
        self(rows)
    }
}

/// One evaluation point of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Id of the observation the row was derived from
    pub ids: String,
    /// Variable swept in this row
    pub vname: String,
    /// Model prediction
    pub yhat: f64,
    /// Source tag (model label, suffixed with the class for probabilities)
    pub label: String,
    /// Feature values, aligned with [`ProfileTable::feature_names`]
    pub features: Vec<Value>,
}

/// Ordered collection of profile rows sharing one feature schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileTable {
    feature_names: Vec<String>,
    rows: Vec<ProfileRow>,
}

impl ProfileTable {
    /// Empty table with the given feature schema
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[ProfileRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProfileRow> {
        self.rows.iter()
    }

    /// Position of a feature in each row's `features`
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Look up a feature value of a row of this table
    pub fn feature<'a>(&self, row: &'a ProfileRow, name: &str) -> Option<&'a Value> {
        self.feature_index(name).and_then(|idx| row.features.get(idx))
    }

    /// Swept variables in first-appearance order
    pub fn variables(&self) -> Vec<&str> {
        let mut variables: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !variables.contains(&row.vname.as_str()) {
                variables.push(&row.vname);
            }
        }
        variables
    }

    /// Rows of one observation's curve for one variable, in grid order
    pub fn profile(&self, ids: &str, vname: &str) -> Vec<&ProfileRow> {
        self.rows
            .iter()
            .filter(|row| row.ids == ids && row.vname == vname)
            .collect()
    }

    /// Whether each feature column holds numbers, read from the first row
    fn column_kinds(&self) -> Option<Vec<bool>> {
        self.rows
            .first()
            .map(|row| row.features.iter().map(Value::is_numeric).collect())
    }

    /// Concatenate tables in order
    ///
    /// All tables must share the same feature columns with the same types.
    /// Observation ids are not deduplicated across tables.
    pub fn union<I>(tables: I) -> Result<ProfileTable>
    where
        I: IntoIterator<Item = ProfileTable>,
    {
        let mut tables = tables.into_iter();
        let mut merged = match tables.next() {
            Some(first) => first,
            None => return Ok(ProfileTable::default()),
        };
        for table in tables {
            if table.feature_names != merged.feature_names {
                return Err(CeterisError::ShapeError {
                    expected: format!("feature columns {:?}", merged.feature_names),
                    actual: format!("{:?}", table.feature_names),
                });
            }
            if let (Some(expected), Some(actual)) = (merged.column_kinds(), table.column_kinds()) {
                if let Some(idx) = expected.iter().zip(&actual).position(|(a, b)| a != b) {
                    return Err(CeterisError::InvalidArgument(format!(
                        "Feature column '{}' is numeric in one table and categorical in another",
                        merged.feature_names[idx]
                    )));
                }
            }
            merged.rows.extend(table.rows);
        }
        Ok(merged)
    }

    /// Tabular form for presentation: feature columns followed by `yhat`,
    /// `vname`, `ids` and `label`
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.feature_names.len() + 4);
        let kinds = self
            .column_kinds()
            .unwrap_or_else(|| vec![true; self.feature_names.len()]);

        for (idx, (name, numeric)) in self.feature_names.iter().zip(kinds).enumerate() {
            let mixed = || {
                CeterisError::DataError(format!(
                    "Feature column '{}' mixes numeric and categorical values",
                    name
                ))
            };
            let column = if numeric {
                let values = self
                    .rows
                    .iter()
                    .map(|row| match row.features.get(idx) {
                        Some(Value::Numeric(v)) => Ok(*v),
                        _ => Err(mixed()),
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Column::new(name.as_str().into(), values)
            } else {
                let values = self
                    .rows
                    .iter()
                    .map(|row| match row.features.get(idx) {
                        Some(Value::Categorical(s)) => Ok(s.as_str()),
                        _ => Err(mixed()),
                    })
                    .collect::<Result<Vec<&str>>>()?;
                Column::new(name.as_str().into(), values)
            };
            columns.push(column);
        }

        let yhat: Vec<f64> = self.rows.iter().map(|row| row.yhat).collect();
        let vname: Vec<&str> = self.rows.iter().map(|row| row.vname.as_str()).collect();
        let ids: Vec<&str> = self.rows.iter().map(|row| row.ids.as_str()).collect();
        let label: Vec<&str> = self.rows.iter().map(|row| row.label.as_str()).collect();
        columns.push(Column::new("yhat".into(), yhat));
        columns.push(Column::new("vname".into(), vname));
        columns.push(Column::new("ids".into(), ids));
        columns.push(Column::new("label".into(), label));

        Ok(DataFrame::new(columns)?)
    }
}

impl<'a> IntoIterator for &'a ProfileTable {
    type Item = &'a ProfileRow;
    type IntoIter = std::slice::Iter<'a, ProfileRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Builds ceteris paribus profiles with a predictor
pub struct ProfileBuilder<P: Predictor> {
    predictor: P,
    label: String,
    selector: SplitSelector,
    parallel: ParallelConfig,
}

impl<P: Predictor> ProfileBuilder<P> {
    /// Create a builder with the default configuration
    pub fn new(predictor: P) -> Self {
        Self::from_config(predictor, &ProfileConfig::default())
    }

    /// Create a builder from a configuration
    pub fn from_config(predictor: P, config: &ProfileConfig) -> Self {
        Self {
            predictor,
            label: config.label.clone(),
            selector: SplitSelector::from_config(config),
            parallel: config.parallel.clone(),
        }
    }

    /// Set the label attached to every row
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set parallel computation of per-variable blocks
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the selector used by [`explain`](Self::explain)
    pub fn with_selector(mut self, selector: SplitSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Build the profile table for every observation of `data` and every
    /// variable of `splits`, in `splits` order
    ///
    /// All variables are validated before the predictor is called. Errors
    /// returned by the predictor are passed through unchanged.
    pub fn build<D>(&self, data: &D, splits: &VariableSplits) -> Result<ProfileTable>
    where
        D: TabularSource + ?Sized,
    {
        for (variable, grid) in splits.iter() {
            let column = data.column(variable)?;
            if column.is_numeric() != grid.is_numeric() {
                return Err(CeterisError::InvalidArgument(format!(
                    "Grid for variable '{}' does not match the column type",
                    variable
                )));
            }
        }

        info!(
            label = %self.label,
            variables = splits.len(),
            observations = data.n_rows(),
            "computing ceteris paribus profiles"
        );

        let items: Vec<(&str, &Grid)> = splits.iter().collect();
        let blocks = try_map_ordered(&items, &self.parallel, |(variable, grid)| {
            self.build_block(data, variable, grid)
        })?;

        let rows: Vec<ProfileRow> = blocks.into_iter().flatten().collect();
        debug!(rows = rows.len(), "profile table assembled");
        Ok(ProfileTable {
            feature_names: data.column_names(),
            rows,
        })
    }

    /// Compute grids from `reference` with the configured selector, then
    /// profile `observations`
    pub fn explain<D, O, S>(
        &self,
        reference: &D,
        observations: &O,
        variables: &[S],
    ) -> Result<ProfileTable>
    where
        D: TabularSource + ?Sized,
        O: TabularSource + ?Sized,
        S: AsRef<str>,
    {
        let splits = self
            .selector
            .compute_with_observations(reference, observations, variables)?;
        self.build(observations, &splits)
    }

    fn build_block<D>(&self, data: &D, variable: &str, grid: &Grid) -> Result<Vec<ProfileRow>>
    where
        D: TabularSource + ?Sized,
    {
        let n_grid = grid.len();
        let n_obs = data.n_rows();
        if n_grid == 0 || n_obs == 0 {
            return Ok(Vec::new());
        }

        let mut expanded = data.repeat_rows(n_grid)?;
        expanded.replace_column(variable, grid.tile(n_obs))?;

        let predictions = self.predictor.predict(&expanded)?;
        if predictions.len() != expanded.n_rows() {
            return Err(CeterisError::ShapeError {
                expected: format!("{} predictions for variable '{}'", expanded.n_rows(), variable),
                actual: predictions.len().to_string(),
            });
        }
        debug!(variable, grid_size = n_grid, rows = expanded.n_rows(), "predicted profile block");

        let features: Vec<Vec<Value>> = (0..expanded.n_rows())
            .map(|i| expanded.row(i).unwrap_or_default())
            .collect();

        let rows: Vec<ProfileRow> = match predictions {
            Predictions::Scalar(yhat) => expanded
                .ids()
                .iter()
                .zip(yhat)
                .zip(features)
                .map(|((ids, yhat), features)| ProfileRow {
                    ids: ids.clone(),
                    vname: variable.to_string(),
                    yhat,
                    label: self.label.clone(),
                    features,
                })
                .collect(),
            Predictions::Probabilities { classes, values } => {
                if let Some(bad) = values.iter().find(|v| v.len() != classes.len()) {
                    return Err(CeterisError::ShapeError {
                        expected: format!("{} class probabilities per row", classes.len()),
                        actual: bad.len().to_string(),
                    });
                }
                let mut rows = Vec::with_capacity(values.len() * classes.len());
                for (class_idx, class) in classes.iter().enumerate() {
                    let label = format!("{}.{}", self.label, class);
                    for (i, ids) in expanded.ids().iter().enumerate() {
                        rows.push(ProfileRow {
                            ids: ids.clone(),
                            vname: variable.to_string(),
                            yhat: values[i][class_idx],
                            label: label.clone(),
                            features: features[i].clone(),
                        });
                    }
                }
                rows
            }
        };
        Ok(rows)
    }
}

/// Build profiles for every observation of `data` with the default label
pub fn build_profiles<D, P>(data: &D, splits: &VariableSplits, predictor: P) -> Result<ProfileTable>
where
    D: TabularSource + ?Sized,
    P: Predictor,
{
    ProfileBuilder::new(predictor).build(data, splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;
    use crate::explainability::compute_splits;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn apartments() -> Dataset {
        Dataset::with_row_ids(
            vec![
                ("surface".to_string(), ColumnData::Numeric(vec![40.0, 80.0])),
                ("floor".to_string(), ColumnData::Numeric(vec![2.0, 7.0])),
                (
                    "district".to_string(),
                    ColumnData::Categorical(vec!["Ochota".into(), "Wola".into()]),
                ),
            ],
            vec!["apt1".into(), "apt2".into()],
        )
        .unwrap()
    }

    fn surface_model(rows: &Dataset) -> Result<Predictions> {
        let x = rows.select_array2(&["surface", "floor"])?;
        Ok(x.rows()
            .into_iter()
            .map(|r| 1000.0 + 10.0 * r[0] - 5.0 * r[1])
            .collect::<Vec<f64>>()
            .into())
    }

    #[test]
    fn test_block_layout() {
        let data = apartments();
        let mut splits = VariableSplits::new();
        splits.insert("floor", Grid::Numeric(vec![1.0, 5.0, 10.0]));

        let table = build_profiles(&data, &splits, surface_model).unwrap();
        assert_eq!(table.len(), 6);

        let ids: Vec<&str> = table.iter().map(|r| r.ids.as_str()).collect();
        assert_eq!(ids, vec!["apt1", "apt1", "apt1", "apt2", "apt2", "apt2"]);

        let floors: Vec<f64> = table
            .iter()
            .map(|r| table.feature(r, "floor").and_then(Value::as_f64).unwrap())
            .collect();
        assert_eq!(floors, vec![1.0, 5.0, 10.0, 1.0, 5.0, 10.0]);

        let surfaces: Vec<f64> = table
            .iter()
            .map(|r| table.feature(r, "surface").and_then(Value::as_f64).unwrap())
            .collect();
        assert_eq!(surfaces, vec![40.0, 40.0, 40.0, 80.0, 80.0, 80.0]);

        assert_eq!(table.rows()[0].yhat, 1000.0 + 400.0 - 5.0);
        assert!(table.iter().all(|r| r.vname == "floor" && r.label == "model"));
    }

    #[test]
    fn test_variable_blocks_in_split_order() {
        let data = apartments();
        let splits = compute_splits(&data, &["district", "surface"], 3).unwrap();
        let predictor = |rows: &Dataset| -> Result<Predictions> { Ok(vec![0.0; rows.n_rows()].into()) };

        let table = build_profiles(&data, &splits, predictor).unwrap();
        // district: 2 levels, surface: 3 quantiles (40, 60, 80)
        assert_eq!(table.len(), 2 * 2 + 2 * 3);
        assert_eq!(table.variables(), vec!["district", "surface"]);
        assert_eq!(table.profile("apt2", "surface").len(), 3);
    }

    #[test]
    fn test_unknown_variable_fails_before_prediction() {
        let calls = AtomicUsize::new(0);
        let predictor = |rows: &Dataset| -> Result<Predictions> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.0; rows.n_rows()].into())
        };

        let mut splits = VariableSplits::new();
        splits.insert("floor", Grid::Numeric(vec![1.0]));
        splits.insert("rooms", Grid::Numeric(vec![1.0, 2.0]));

        let result = ProfileBuilder::new(&predictor).build(&apartments(), &splits);
        assert!(matches!(result, Err(CeterisError::FeatureNotFound(name)) if name == "rooms"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_grid_type_mismatch() {
        let mut splits = VariableSplits::new();
        splits.insert("district", Grid::Numeric(vec![1.0]));
        let result = build_profiles(&apartments(), &splits, surface_model);
        assert!(matches!(result, Err(CeterisError::InvalidArgument(_))));
    }

    #[test]
    fn test_predictor_error_propagates_unchanged() {
        let predictor = |_: &Dataset| -> Result<Predictions> {
            Err(CeterisError::PredictionError("model exploded".to_string()))
        };
        let splits = compute_splits(&apartments(), &["floor"], 2).unwrap();
        let err = build_profiles(&apartments(), &splits, predictor).unwrap_err();
        assert_eq!(err.to_string(), "Prediction error: model exploded");
    }

    #[test]
    fn test_wrong_prediction_count() {
        let predictor = |_: &Dataset| -> Result<Predictions> { Ok(vec![1.0].into()) };
        let splits = compute_splits(&apartments(), &["floor"], 2).unwrap();
        let result = build_profiles(&apartments(), &splits, predictor);
        assert!(matches!(result, Err(CeterisError::ShapeError { .. })));
    }

    #[test]
    fn test_class_probabilities() {
        let predictor = |rows: &Dataset| -> Result<Predictions> {
            let surface = rows.select_array2(&["surface"])?;
            let probs = Array2::from_shape_fn((rows.n_rows(), 2), |(i, j)| {
                let p = surface[[i, 0]] / 100.0;
                if j == 0 { p } else { 1.0 - p }
            });
            Predictions::from_probabilities(vec!["big".into(), "small".into()], &probs)
        };

        let mut splits = VariableSplits::new();
        splits.insert("surface", Grid::Numeric(vec![20.0, 50.0]));
        let table = ProfileBuilder::new(predictor)
            .with_label("clf")
            .build(&apartments(), &splits)
            .unwrap();

        assert_eq!(table.len(), 2 * 2 * 2);
        let big: Vec<&ProfileRow> = table.iter().filter(|r| r.label == "clf.big").collect();
        assert_eq!(big.len(), 4);
        assert!((big[1].yhat - 0.5).abs() < 1e-12);
        assert!(table.iter().filter(|r| r.label == "clf.small").all(|r| r.yhat > 0.0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = apartments();
        let splits = compute_splits(&data, &["surface", "floor", "district"], 5).unwrap();

        let sequential = ProfileBuilder::new(surface_model).build(&data, &splits).unwrap();
        let parallel = ProfileBuilder::new(surface_model)
            .with_parallel(ParallelConfig::enabled().with_threads(2))
            .build(&data, &splits)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_explain_with_observation_values() {
        let reference = apartments();
        let observation = reference.take(&[1]).unwrap();
        let config = ProfileConfig::new()
            .with_grid_points(2)
            .with_observation_values(true);
        let table = ProfileBuilder::from_config(surface_model, &config)
            .explain(&reference, &observation, &["floor"])
            .unwrap();

        // grid 2, 7 already contains the observation's own floor
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| r.ids == "apt2"));
    }

    #[test]
    fn test_union_and_dataframe() {
        let data = apartments();
        let splits = compute_splits(&data, &["floor", "district"], 2).unwrap();
        let a = ProfileBuilder::new(surface_model).with_label("a").build(&data, &splits).unwrap();
        let b = ProfileBuilder::new(surface_model).with_label("b").build(&data, &splits).unwrap();
        let n = a.len();

        let both = ProfileTable::union(vec![a, b]).unwrap();
        assert_eq!(both.len(), 2 * n);

        let df = both.to_dataframe().unwrap();
        assert_eq!(df.height(), 2 * n);
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["surface", "floor", "district", "yhat", "vname", "ids", "label"]
        );

        let other = ProfileTable::new(vec!["x".to_string()]);
        assert!(ProfileTable::union(vec![both, other]).is_err());
    }

    #[test]
    fn test_union_rejects_column_type_mismatch() {
        let data = apartments();
        let splits = compute_splits(&data, &["district"], 2).unwrap();
        let numeric_floor = build_profiles(&data, &splits, surface_model).unwrap();

        let text_floor = Dataset::new(vec![
            ("surface".to_string(), ColumnData::Numeric(vec![40.0])),
            ("floor".to_string(), ColumnData::Categorical(vec!["ground".into()])),
            ("district".to_string(), ColumnData::Categorical(vec!["Wola".into()])),
        ])
        .unwrap();
        let constant = |rows: &Dataset| -> Result<Predictions> { Ok(vec![1.0; rows.n_rows()].into()) };
        let text_floor = build_profiles(&text_floor, &splits, constant).unwrap();

        let result = ProfileTable::union(vec![numeric_floor, text_floor]);
        assert!(matches!(result, Err(CeterisError::InvalidArgument(msg)) if msg.contains("floor")));
    }

    #[test]
    fn test_dataframe_rejects_mixed_column() {
        let row = |floor: Value| ProfileRow {
            ids: "1".into(),
            vname: "floor".into(),
            yhat: 0.0,
            label: "model".into(),
            features: vec![floor],
        };
        let table = ProfileTable {
            feature_names: vec!["floor".to_string()],
            rows: vec![row(Value::Numeric(1.0)), row(Value::from("ground"))],
        };
        assert!(matches!(table.to_dataframe(), Err(CeterisError::DataError(_))));
    }

    #[test]
    fn test_build_from_dataframe() {
        let df = polars::df!(
            "surface" => &[40.0, 80.0],
            "floor" => &[2.0, 7.0],
        )
        .unwrap();
        let mut splits = VariableSplits::new();
        splits.insert("floor", Grid::Numeric(vec![1.0, 5.0, 10.0]));

        let table = build_profiles(&df, &splits, surface_model).unwrap();
        assert_eq!(table.feature_names(), &["surface", "floor"]);
        assert_eq!(table.profile("2", "floor").len(), 3);
        assert_eq!(table.rows()[3].yhat, 1000.0 + 800.0 - 5.0);
    }
}
