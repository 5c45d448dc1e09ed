//! Standard scaling (z-score normalization)

use crate::error::{PipelineError, Result};
use crate::utils::{column_names, is_numeric_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where the statistics used to scale the test frame come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleStrategy {
    /// Each frame is standardized with its own mean and standard deviation
    #[default]
    PerSplit,
    /// Statistics are fit on the training frame and applied to both
    TrainStatistics,
}

/// Fitted statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    pub std: f64,
}

/// Feature scaler: `(x - mean) / std` with the population standard deviation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scaler {
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler on every column of `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.params = df
            .get_columns()
            .iter()
            .map(|column| {
                let series = column.as_materialized_series();
                let params = Self::compute_params(series)?;
                debug!(column = %series.name(), mean = params.mean, std = params.std, "fitted column");
                Ok((series.name().to_string(), params))
            })
            .collect::<Result<Vec<_>>>()?;

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the fitted columns of `df`; other columns are left untouched
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|(col_name, params)| {
                let series = df
                    .column(col_name)
                    .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?
                    .as_materialized_series();
                Self::scale_series(series, params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Fitted statistics for a column
    pub fn params(&self, column: &str) -> Option<&ScalerParams> {
        self.params
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, p)| p)
    }

    fn compute_params(series: &Series) -> Result<ScalerParams> {
        let name = series.name().to_string();
        if !is_numeric_dtype(series.dtype()) {
            return Err(PipelineError::NonNumericColumn {
                column: name,
                dtype: series.dtype().to_string(),
            });
        }

        let values = series.cast(&DataType::Float64)?;
        let values: Vec<f64> = values.f64()?.into_iter().flatten().collect();
        if values.is_empty() {
            return Err(PipelineError::ZeroVariance(name));
        }

        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(PipelineError::DataError(format!(
                "column '{}' contains non-finite value {}",
                name, bad
            )));
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        if !var.is_finite() {
            return Err(PipelineError::DataError(format!(
                "variance of column '{}' overflows",
                name
            )));
        }

        // Relative bound: rounding in the mean leaves a residual of order n * eps * mean
        let upper = n * f64::EPSILON * var + (n * mean * f64::EPSILON).powi(2);
        if var <= upper {
            return Err(PipelineError::ZeroVariance(name));
        }
        let std = var.sqrt();

        Ok(ScalerParams { mean, std })
    }

    fn scale_series(series: &Series, params: &ScalerParams) -> Result<Series> {
        if !is_numeric_dtype(series.dtype()) {
            return Err(PipelineError::NonNumericColumn {
                column: series.name().to_string(),
                dtype: series.dtype().to_string(),
            });
        }
        let values = series.cast(&DataType::Float64)?;

        let scaled: Float64Chunked = values
            .f64()?
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.mean) / params.std))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}

/// Scaled train and test feature frames
#[derive(Debug, Clone)]
pub struct ScaledData {
    pub x_train_scaled: DataFrame,
    pub x_test_scaled: DataFrame,
}

/// Standardize train and test features, each with its own statistics
pub fn scale_data(x_train: &DataFrame, x_test: &DataFrame) -> Result<ScaledData> {
    scale_data_with(x_train, x_test, ScaleStrategy::PerSplit)
}

/// Standardize train and test features with the given strategy
pub fn scale_data_with(
    x_train: &DataFrame,
    x_test: &DataFrame,
    strategy: ScaleStrategy,
) -> Result<ScaledData> {
    let mut train_cols = column_names(x_train);
    let mut test_cols = column_names(x_test);
    train_cols.sort();
    test_cols.sort();
    if train_cols != test_cols {
        return Err(PipelineError::ShapeError {
            expected: format!("columns {:?}", train_cols),
            actual: format!("columns {:?}", test_cols),
        });
    }

    let mut train_scaler = Scaler::new();
    let x_train_scaled = train_scaler.fit_transform(x_train)?;
    let x_test_scaled = match strategy {
        ScaleStrategy::PerSplit => Scaler::new().fit_transform(x_test)?,
        ScaleStrategy::TrainStatistics => train_scaler.transform(x_test)?,
    };

    Ok(ScaledData {
        x_train_scaled,
        x_test_scaled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name).unwrap().f64().unwrap().into_no_null_iter().collect()
    }

    fn mean_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_standard_scaler() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = Scaler::new();
        let result = scaler.fit_transform(&df).unwrap();

        let (mean, std) = mean_std(&column_values(&result, "a"));
        assert!(mean.abs() < 1e-10);
        assert!((std - 1.0).abs() < 1e-10);
        assert!((scaler.params("a").unwrap().std - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_integer_columns_become_float() {
        let df = df!("a" => &[1i64, 2, 3, 4]).unwrap();
        let result = Scaler::new().fit_transform(&df).unwrap();
        assert_eq!(result.column("a").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_zero_variance_is_rejected() {
        let df = df!("a" => &[0.1, 0.1, 0.1]).unwrap();
        let err = Scaler::new().fit(&df).unwrap_err();
        assert!(matches!(err, PipelineError::ZeroVariance(ref c) if c == "a"));
    }

    #[test]
    fn test_small_magnitude_column_is_scaled() {
        let df = df!("a" => &[1e-16, 2e-16, 3e-16]).unwrap();
        let result = Scaler::new().fit_transform(&df).unwrap();
        let (mean, std) = mean_std(&column_values(&result, "a"));
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_offset_constant_is_rejected() {
        let df = df!("a" => &[1e6 + 0.1, 1e6 + 0.1, 1e6 + 0.1]).unwrap();
        assert!(matches!(Scaler::new().fit(&df), Err(PipelineError::ZeroVariance(_))));
    }

    #[test]
    fn test_nan_is_a_data_error() {
        let df = df!("a" => &[1.0, f64::NAN, 3.0]).unwrap();
        let err = Scaler::new().fit(&df).unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));

        let df = df!("a" => &[1.0, f64::INFINITY]).unwrap();
        assert!(matches!(Scaler::new().fit(&df), Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_non_numeric_is_rejected() {
        let df = df!("a" => &["x", "y"]).unwrap();
        let err = Scaler::new().fit(&df).unwrap_err();
        assert!(matches!(err, PipelineError::NonNumericColumn { .. }));
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        assert!(matches!(Scaler::new().transform(&df), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_scale_data_uses_own_statistics() {
        let train = df!("a" => &[1.0, 2.0, 3.0], "b" => &[10.0, 20.0, 60.0]).unwrap();
        let test = df!("a" => &[100.0, 200.0], "b" => &[-1.0, 1.0]).unwrap();

        let scaled = scale_data(&train, &test).unwrap();
        for df in [&scaled.x_train_scaled, &scaled.x_test_scaled] {
            for col in ["a", "b"] {
                let (mean, std) = mean_std(&column_values(df, col));
                assert!(mean.abs() < 1e-10);
                assert!((std - 1.0).abs() < 1e-10);
            }
        }
        assert_eq!(column_values(&scaled.x_test_scaled, "a"), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_scale_data_with_train_statistics() {
        let train = df!("a" => &[0.0, 2.0]).unwrap();
        let test = df!("a" => &[4.0, 6.0]).unwrap();

        let scaled = scale_data_with(&train, &test, ScaleStrategy::TrainStatistics).unwrap();
        assert_eq!(column_values(&scaled.x_test_scaled, "a"), vec![3.0, 5.0]);
    }

    #[test]
    fn test_scale_data_column_mismatch() {
        let train = df!("a" => &[1.0, 2.0]).unwrap();
        let test = df!("b" => &[1.0, 2.0]).unwrap();
        assert!(matches!(scale_data(&train, &test), Err(PipelineError::ShapeError { .. })));
    }

    #[test]
    fn test_nulls_pass_through() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0)]).unwrap();
        let result = Scaler::new().fit_transform(&df).unwrap();
        let col = result.column("a").unwrap().f64().unwrap();
        assert_eq!(col.null_count(), 1);
        assert!((col.get(0).unwrap() + 1.0).abs() < 1e-12);
    }
}
