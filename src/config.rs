//! Flat pipeline parameters, as read from a JSON parameters file

use crate::error::{PipelineError, Result};
use crate::evaluation::Scoring;
use crate::preprocessing::{ScaleStrategy, SplitConfig};
use crate::training::{ErrorScore, SearchConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Every knob of the pipeline in one mapping.
///
/// Keys not present in the file take the defaults of [`SplitConfig`] and
/// [`SearchConfig`]; `input_cols` and `target_col` have no usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParameters {
    pub input_cols: Vec<String>,
    pub target_col: String,
    pub test_size: f64,
    /// Seeds the split, the fold shuffle, candidate sampling and the booster
    pub random_state: u64,
    pub scale_strategy: ScaleStrategy,
    pub n_iter: usize,
    pub scoring: Scoring,
    pub error_score: ErrorScore,
    pub verbose: u8,
    pub n_jobs: i64,
    pub k: usize,
    pub k_shuffle: bool,
    pub subsample: Vec<f64>,
    pub xgb_max_depth: Vec<usize>,
    pub colsample_bytree: Vec<f64>,
    pub xgb_min_child_weight: Vec<f64>,
    pub n_estimators_low: i64,
    pub n_estimators_high: i64,
    pub learning_rate_loc: f64,
    pub learning_rate_scale: f64,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        let split = SplitConfig::default();
        let search = SearchConfig::default();
        Self {
            input_cols: split.input_cols,
            target_col: String::new(),
            test_size: split.test_size,
            random_state: split.random_state,
            scale_strategy: ScaleStrategy::default(),
            n_iter: search.n_iter,
            scoring: search.scoring,
            error_score: search.error_score,
            verbose: search.verbose,
            n_jobs: search.n_jobs,
            k: search.k,
            k_shuffle: search.k_shuffle,
            subsample: search.subsample,
            xgb_max_depth: search.max_depth,
            colsample_bytree: search.colsample_bytree,
            xgb_min_child_weight: search.min_child_weight,
            n_estimators_low: search.n_estimators_low,
            n_estimators_high: search.n_estimators_high,
            learning_rate_loc: search.learning_rate_loc,
            learning_rate_scale: search.learning_rate_scale,
        }
    }
}

impl PipelineParameters {
    /// Parse and validate parameters from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Parse and validate parameters from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_col.is_empty() {
            return Err(PipelineError::ConfigError("target_col is required".to_string()));
        }
        if self.input_cols.iter().any(|c| *c == self.target_col) {
            warn!(target_col = %self.target_col, "target column is also listed as an input column");
        }
        self.split_config().validate()?;
        self.search_config().validate()
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig::new(self.input_cols.iter().cloned(), self.target_col.clone())
            .with_test_size(self.test_size)
            .with_random_state(self.random_state)
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::new()
            .with_n_iter(self.n_iter)
            .with_scoring(self.scoring)
            .with_error_score(self.error_score)
            .with_verbose(self.verbose)
            .with_n_jobs(self.n_jobs)
            .with_folds(self.k, self.k_shuffle)
            .with_random_state(self.random_state)
            .with_subsample(self.subsample.clone())
            .with_max_depth(self.xgb_max_depth.clone())
            .with_colsample_bytree(self.colsample_bytree.clone())
            .with_min_child_weight(self.xgb_min_child_weight.clone())
            .with_n_estimators_range(self.n_estimators_low, self.n_estimators_high)
            .with_learning_rate(self.learning_rate_loc, self.learning_rate_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Average;
    use std::io::Write;

    const PARAMS: &str = r#"{
        "input_cols": ["a", "b"],
        "target_col": "label",
        "test_size": 0.2,
        "random_state": 7,
        "n_iter": 4,
        "scoring": "f1_macro",
        "error_score": "raise",
        "verbose": 1,
        "n_jobs": -1,
        "k": 3,
        "k_shuffle": true,
        "subsample": [0.5, 1.0],
        "xgb_max_depth": [2, 3],
        "colsample_bytree": [1.0],
        "xgb_min_child_weight": [1, 2]
    }"#;

    #[test]
    fn test_parse_full_parameters() {
        let params = PipelineParameters::from_json_str(PARAMS).unwrap();
        let split = params.split_config();
        assert_eq!(split.input_cols, vec!["a", "b"]);
        assert_eq!(split.test_size, 0.2);
        assert_eq!(split.random_state, 7);

        let search = params.search_config();
        assert_eq!(search.n_iter, 4);
        assert_eq!(search.scoring, Scoring::F1(Average::Macro));
        assert!(matches!(search.error_score, ErrorScore::Raise));
        assert_eq!(search.n_jobs, -1);
        assert_eq!(search.k, 3);
        assert!(search.k_shuffle);
        assert_eq!(search.random_state, 7);
        assert_eq!(search.max_depth, vec![2, 3]);
        assert_eq!(search.min_child_weight, vec![1.0, 2.0]);
        assert_eq!(search.n_estimators_high, 100);
    }

    #[test]
    fn test_missing_target_rejected() {
        let err = PipelineParameters::from_json_str(r#"{"input_cols": ["a"]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_bad_values_rejected() {
        let bad_scoring = r#"{"input_cols": ["a"], "target_col": "y", "scoring": "f2"}"#;
        assert!(PipelineParameters::from_json_str(bad_scoring).is_err());

        let bad_size = r#"{"input_cols": ["a"], "target_col": "y", "test_size": 1.5}"#;
        assert!(matches!(
            PipelineParameters::from_json_str(bad_size),
            Err(PipelineError::InvalidParameter { .. })
        ));

        let bad_k = r#"{"input_cols": ["a"], "target_col": "y", "k": 1}"#;
        assert!(PipelineParameters::from_json_str(bad_k).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PARAMS.as_bytes()).unwrap();
        let params = PipelineParameters::from_json_file(file.path()).unwrap();
        assert_eq!(params.target_col, "label");

        assert!(matches!(
            PipelineParameters::from_json_file("/nonexistent/params.json"),
            Err(PipelineError::IoError(_))
        ));
    }
}
