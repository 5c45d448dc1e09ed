//! Seeded train/test splitting

use crate::error::{PipelineError, Result};
use crate::utils::{require_columns, take_rows};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for [`split_data`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Feature columns, in output order
    pub input_cols: Vec<String>,
    /// Target column
    pub target_col: String,
    /// Fraction of rows held out for testing, in (0, 1)
    pub test_size: f64,
    /// Seed for the row permutation
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            input_cols: Vec::new(),
            target_col: "target".to_string(),
            test_size: 0.25,
            random_state: 42,
        }
    }
}

impl SplitConfig {
    /// Create a new configuration
    pub fn new<S: Into<String>>(input_cols: impl IntoIterator<Item = S>, target_col: impl Into<String>) -> Self {
        Self {
            input_cols: input_cols.into_iter().map(Into::into).collect(),
            target_col: target_col.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the test fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Check ranges that do not depend on the data
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::invalid_param(
                "test_size",
                self.test_size,
                "must be strictly between 0 and 1",
            ));
        }
        if self.input_cols.is_empty() {
            return Err(PipelineError::invalid_param(
                "input_cols",
                "[]",
                "at least one input column is required",
            ));
        }
        Ok(())
    }
}

/// Train/test partitions of features and targets
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: DataFrame,
    pub y_test: DataFrame,
}

/// Number of (train, test) rows for `n_samples` rows
pub fn split_sizes(n_samples: usize, test_size: f64) -> Result<(usize, usize)> {
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_train == 0 || n_test == 0 {
        return Err(PipelineError::DataError(format!(
            "with n_samples={} and test_size={} one of the partitions would be empty",
            n_samples, test_size
        )));
    }
    Ok((n_train, n_test))
}

/// Split `df` into train/test feature and target frames.
///
/// Rows are permuted with a generator seeded by `random_state`; the first
/// `ceil(test_size * n)` permuted rows become the test set. Features and
/// targets are gathered with the same indices so row `i` of `x_test` matches
/// row `i` of `y_test`.
pub fn split_data(df: &DataFrame, config: &SplitConfig) -> Result<SplitData> {
    config.validate()?;
    require_columns(df, &config.input_cols)?;
    require_columns(df, std::slice::from_ref(&config.target_col))?;

    let n_samples = df.height();
    let (n_train, n_test) = split_sizes(n_samples, config.test_size)?;

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    let x = df.select(config.input_cols.iter().map(|c| c.as_str()))?;
    let y = df.select([config.target_col.as_str()])?;

    let split = SplitData {
        x_train: take_rows(&x, train_idx)?,
        x_test: take_rows(&x, test_idx)?,
        y_train: take_rows(&y, train_idx)?,
        y_test: take_rows(&y, test_idx)?,
    };

    info!(n_samples, n_train, n_test, seed = config.random_state, "split dataset");
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;

    fn sample_df(n: usize) -> DataFrame {
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| (i * 2) as f64).collect();
        let y: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
        df!("a" => a, "b" => b, "label" => y).unwrap()
    }

    fn config() -> SplitConfig {
        SplitConfig::new(["a", "b"], "label").with_test_size(0.2).with_random_state(42)
    }

    #[test]
    fn test_split_sizes() {
        let split = split_data(&sample_df(100), &config()).unwrap();
        assert_eq!(split.x_test.height(), 20);
        assert_eq!(split.x_train.height(), 80);
        assert_eq!(split.y_test.height(), 20);
        assert_eq!(split.y_train.height(), 80);
    }

    #[test]
    fn test_split_rounds_test_up() {
        assert_eq!(split_sizes(10, 0.25).unwrap(), (7, 3));
        assert_eq!(split_sizes(3, 0.1).unwrap(), (2, 1));
    }

    #[test]
    fn test_split_columns() {
        let split = split_data(&sample_df(10), &config()).unwrap();
        assert_eq!(column_names(&split.x_train), vec!["a", "b"]);
        assert_eq!(column_names(&split.y_train), vec!["label"]);
    }

    #[test]
    fn test_split_is_reproducible() {
        let df = sample_df(50);
        let first = split_data(&df, &config()).unwrap();
        let second = split_data(&df, &config()).unwrap();
        assert!(first.x_test.equals(&second.x_test));
        assert!(first.y_train.equals(&second.y_train));

        let other = split_data(&df, &config().with_random_state(7)).unwrap();
        assert!(!first.x_test.equals(&other.x_test));
    }

    #[test]
    fn test_split_keeps_rows_aligned() {
        let split = split_data(&sample_df(40), &config()).unwrap();
        let a = split.x_test.column("a").unwrap().f64().unwrap();
        let y = split.y_test.column("label").unwrap().i64().unwrap();
        for (a, y) in a.into_no_null_iter().zip(y.into_no_null_iter()) {
            assert_eq!((a as i64) % 2, y);
        }
    }

    #[test]
    fn test_split_missing_column() {
        let cfg = SplitConfig::new(["a", "nope"], "label").with_test_size(0.2);
        let err = split_data(&sample_df(10), &cfg).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureNotFound(ref c) if c == "nope"));

        let cfg = SplitConfig::new(["a"], "missing_target").with_test_size(0.2);
        assert!(split_data(&sample_df(10), &cfg).is_err());
    }

    #[test]
    fn test_split_rejects_bad_test_size() {
        for bad in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let cfg = config().with_test_size(bad);
            let err = split_data(&sample_df(10), &cfg).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidParameter { .. }));
        }
    }
}
