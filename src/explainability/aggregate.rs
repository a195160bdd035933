//! Aggregation of ceteris paribus profiles into partial dependence curves

use super::profiles::{ProfileRow, ProfileTable};
use crate::data::Value;
use crate::error::{CeterisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// How profile rows are partitioned before averaging
///
/// Rows are always kept apart by their label, so profiles from different
/// models or classes never share a cell. The grouping adds a partition on top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// A single group with every observation of each label
    #[default]
    All,
    /// Value of a feature column as it appears in each profile row
    ///
    /// Rows sweeping that same feature are grouped by their grid value.
    Feature(String),
    /// Source tag of each row as the group key, for consumers that read
    /// only the `group` column
    Label,
    /// Observation id; every group is one individual profile
    Observation,
}

/// Mean prediction at one grid value of one variable within one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub vname: String,
    /// Grid value of the swept variable
    pub value: Value,
    /// Source tag of the averaged rows
    pub label: String,
    /// Group key, `None` for [`Grouping::All`]
    pub group: Option<Value>,
    /// Mean prediction
    pub yhat: f64,
    /// Number of profile rows averaged
    pub count: usize,
}

/// Mean prediction curves keyed by (variable, grid value, label, group)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCurve {
    points: Vec<AggregatedPoint>,
}

impl AggregatedCurve {
    pub fn points(&self) -> &[AggregatedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean prediction at one cell
    pub fn get(&self, vname: &str, value: &Value, label: &str, group: Option<&Value>) -> Option<f64> {
        self.points
            .iter()
            .find(|p| {
                p.vname == vname && p.value == *value && p.label == label && p.group.as_ref() == group
            })
            .map(|p| p.yhat)
    }

    /// Points of one curve, in grid order
    pub fn curve(&self, vname: &str, label: &str, group: Option<&Value>) -> Vec<&AggregatedPoint> {
        self.points
            .iter()
            .filter(|p| p.vname == vname && p.label == label && p.group.as_ref() == group)
            .collect()
    }

    /// Distinct labels in first-appearance order
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for point in &self.points {
            if !labels.contains(&point.label.as_str()) {
                labels.push(&point.label);
            }
        }
        labels
    }

    /// Distinct group keys in first-appearance order
    pub fn groups(&self) -> Vec<Option<&Value>> {
        let mut groups: Vec<Option<&Value>> = Vec::new();
        for point in &self.points {
            let group = point.group.as_ref();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }
}

/// Averages profiles across observations
#[derive(Debug, Clone, Default)]
pub struct ProfileAggregator {
    grouping: Grouping,
    variables: Option<Vec<String>>,
    center: bool,
}

impl ProfileAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Restrict aggregation to these swept variables
    pub fn with_variables<S: AsRef<str>>(mut self, variables: &[S]) -> Self {
        self.variables = Some(variables.iter().map(|v| v.as_ref().to_string()).collect());
        self
    }

    /// Shift each group's curve so that the groups of one label share that
    /// label's overall mean level
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    /// Aggregate one or more profile tables
    pub fn aggregate(&self, tables: &[ProfileTable]) -> Result<AggregatedCurve> {
        let selected = self.selected_variables(tables)?;

        if let Grouping::Feature(name) = &self.grouping {
            if let Some(table) = tables.iter().find(|t| t.feature_index(name).is_none()) {
                return Err(CeterisError::FeatureNotFound(format!(
                    "{} (grouping column; available: {:?})",
                    name,
                    table.feature_names()
                )));
            }
        }

        // (vname, grid value, label, group) -> index into cells
        let mut index: HashMap<(String, Value, String, Option<Value>), usize> = HashMap::new();
        let mut cells: Vec<(AggregatedPoint, Vec<f64>)> = Vec::new();
        let mut n_rows = 0usize;

        for table in tables {
            let group_idx = match &self.grouping {
                Grouping::Feature(name) => table.feature_index(name),
                _ => None,
            };

            for row in table.iter() {
                if !selected.contains(row.vname.as_str()) {
                    continue;
                }
                let value = table
                    .feature(row, &row.vname)
                    .cloned()
                    .ok_or_else(|| {
                        CeterisError::DataError(format!(
                            "Profile row sweeps '{}' which is not a feature column",
                            row.vname
                        ))
                    })?;
                let group = self.group_key(row, group_idx);

                let key = (row.vname.clone(), value, row.label.clone(), group);
                let cell = match index.get(&key) {
                    Some(&cell) => cell,
                    None => {
                        let (vname, value, label, group) = key.clone();
                        cells.push((
                            AggregatedPoint {
                                vname,
                                value,
                                label,
                                group,
                                yhat: 0.0,
                                count: 0,
                            },
                            Vec::new(),
                        ));
                        index.insert(key, cells.len() - 1);
                        cells.len() - 1
                    }
                };
                let (point, values) = &mut cells[cell];
                values.push(row.yhat);
                point.count += 1;
                n_rows += 1;
            }
        }

        let mut points: Vec<AggregatedPoint> = cells
            .into_iter()
            .map(|(mut point, values)| {
                point.yhat = mean(values);
                point
            })
            .collect();

        if self.center {
            center_groups(&mut points);
        }

        info!(
            tables = tables.len(),
            rows = n_rows,
            points = points.len(),
            "aggregated ceteris paribus profiles"
        );
        Ok(AggregatedCurve { points })
    }

    fn selected_variables<'a>(&'a self, tables: &'a [ProfileTable]) -> Result<HashSet<&'a str>> {
        let available: HashSet<&str> = tables
            .iter()
            .flat_map(|t| t.iter().map(|row| row.vname.as_str()))
            .collect();

        let requested = match &self.variables {
            None => return Ok(available),
            Some(requested) => requested,
        };

        let selected: HashSet<&str> = requested
            .iter()
            .map(String::as_str)
            .filter(|v| available.contains(v))
            .collect();
        if selected.is_empty() {
            return Err(CeterisError::InvalidArgument(format!(
                "None of the requested variables {:?} were profiled",
                requested
            )));
        }
        Ok(selected)
    }

    fn group_key(&self, row: &ProfileRow, group_idx: Option<usize>) -> Option<Value> {
        match &self.grouping {
            Grouping::All => None,
            Grouping::Feature(_) => group_idx.and_then(|idx| row.features.get(idx).cloned()),
            Grouping::Label => Some(Value::Categorical(row.label.clone())),
            Grouping::Observation => Some(Value::Categorical(row.ids.clone())),
        }
    }
}

/// Aggregate `tables`, optionally restricted to `variables`
pub fn aggregate<S: AsRef<str>>(
    tables: &[ProfileTable],
    grouping: Grouping,
    variables: Option<&[S]>,
) -> Result<AggregatedCurve> {
    let mut aggregator = ProfileAggregator::new().with_grouping(grouping);
    if let Some(variables) = variables {
        aggregator = aggregator.with_variables(variables);
    }
    aggregator.aggregate(tables)
}

// Sorted before summing so the result does not depend on row order.
fn mean(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    values.into_iter().sum::<f64>() / n
}

// Subtract each (vname, label, group) curve's mean and add the mean of that
// (vname, label) over all groups.
fn center_groups(points: &mut [AggregatedPoint]) {
    let shifts: Vec<f64> = {
        let mut group_values: HashMap<(&str, &str, Option<&Value>), Vec<f64>> = HashMap::new();
        let mut label_values: HashMap<(&str, &str), Vec<f64>> = HashMap::new();

        for point in points.iter() {
            group_values
                .entry((point.vname.as_str(), point.label.as_str(), point.group.as_ref()))
                .or_default()
                .push(point.yhat);
            label_values
                .entry((point.vname.as_str(), point.label.as_str()))
                .or_default()
                .push(point.yhat);
        }

        points
            .iter()
            .map(|point| {
                let group = &group_values[&(point.vname.as_str(), point.label.as_str(), point.group.as_ref())];
                let label = &label_values[&(point.vname.as_str(), point.label.as_str())];
                mean(label.clone()) - mean(group.clone())
            })
            .collect()
    };

    for (point, shift) in points.iter_mut().zip(shifts) {
        point.yhat += shift;
    }
}
