//! polars adapter

use super::{positional_ids, ColumnData, Dataset, TabularSource};
use crate::error::{CeterisError, Result};
use polars::prelude::*;
use std::borrow::Cow;

/// Convert a polars column into crate column data
///
/// Integer, unsigned and float columns become numeric (nulls as NaN); every
/// other dtype is read as categorical through its string representation.
fn column_data(df: &DataFrame, name: &str) -> Result<ColumnData> {
    let column = df
        .column(name)
        .map_err(|_| CeterisError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    if is_numeric_dtype(series.dtype()) {
        let series_f64 = series.cast(&DataType::Float64)?;
        let values = series_f64
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        return Ok(ColumnData::Numeric(values));
    }

    let series_str = series.cast(&DataType::String)?;
    let values = series_str
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string).ok_or_else(|| {
                CeterisError::DataError(format!(
                    "Categorical column '{}' contains null values",
                    name
                ))
            })
        })
        .collect::<Result<Vec<String>>>()?;
    Ok(ColumnData::Categorical(values))
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// A polars frame has no row labels, so rows are identified by position.
impl TabularSource for DataFrame {
    fn n_rows(&self) -> usize {
        self.height()
    }

    fn column_names(&self) -> Vec<String> {
        self.get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn column(&self, name: &str) -> Result<Cow<'_, ColumnData>> {
        column_data(self, name).map(Cow::Owned)
    }

    fn row_ids(&self) -> Vec<String> {
        positional_ids(self.height())
    }
}

impl Dataset {
    /// Read every column of a polars frame
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        df.to_dataset()
    }

    /// Read a polars frame, taking row labels from `id_column`
    ///
    /// The id column itself is not kept as a feature.
    pub fn from_dataframe_with_ids(df: &DataFrame, id_column: &str) -> Result<Self> {
        let ids = match column_data(df, id_column)? {
            ColumnData::Categorical(ids) => ids,
            ColumnData::Numeric(values) => values.iter().map(|v| v.to_string()).collect(),
        };

        let columns = TabularSource::column_names(df)
            .into_iter()
            .filter(|name| name != id_column)
            .map(|name| {
                let data = column_data(df, &name)?;
                Ok((name, data))
            })
            .collect::<Result<Vec<_>>>()?;

        Dataset::with_row_ids(columns, ids)
    }

    /// Convert to a polars frame (row ids are not included)
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .iter()
            .map(|(name, data)| match data {
                ColumnData::Numeric(values) => Column::new(name.into(), values.as_slice()),
                ColumnData::Categorical(values) => Column::new(name.into(), values.as_slice()),
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}
