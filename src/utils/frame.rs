//! Conversions between Polars frames and ndarray matrices

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Fail with `FeatureNotFound` for the first name missing from `df`
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<()> {
    for name in columns {
        let name = name.as_ref();
        if df.column(name).is_err() {
            return Err(PipelineError::FeatureNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Numeric check used by every stage that does arithmetic on a column
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    dtype.is_integer() || dtype.is_float()
}

/// Gather rows of `df` in the order given by `indices`
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Extract named numeric columns into a row-major `Array2<f64>`.
///
/// Null cells are rejected: the booster has no missing-value handling.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?
                .as_materialized_series();
            if !is_numeric_dtype(series.dtype()) {
                return Err(PipelineError::NonNumericColumn {
                    column: col_name.clone(),
                    dtype: series.dtype().to_string(),
                });
            }
            if series.null_count() > 0 {
                return Err(PipelineError::DataError(format!(
                    "column '{}' contains {} missing values",
                    col_name,
                    series.null_count()
                )));
            }
            let series_f64 = series.cast(&DataType::Float64)?;
            let values: Vec<f64> = series_f64.f64()?.into_no_null_iter().collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}
