//! Randomized, k-fold cross-validated hyperparameter search for the booster
//!
//! Candidates are drawn from an [`XgbSearchSpace`], every (candidate, fold)
//! pair is fitted and scored on a rayon pool sized by `n_jobs`, and the best
//! candidate by mean fold score is refit on the whole training set.

use super::cross_validation::{CVResults, CVSplit, KFold};
use super::model::Classifier;
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{PipelineError, Result};
use crate::evaluation::Scoring;
use crate::optimizer::{ParameterValue, RandomSampler, SearchSpace, TrialParams};
use crate::preprocessing::{labels_from_series, labels_to_series, target_series, ClassLabel, LabelEncoder};
use crate::utils::{column_names, columns_to_array2, require_columns, ParallelConfig, StageTimer};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// What to do when fitting or scoring a (candidate, fold) pair fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "ErrorScoreRepr", into = "ErrorScoreRepr")]
pub enum ErrorScore {
    /// Abort the search
    Raise,
    /// Record this score for the failed fold (may be NaN)
    Value(f64),
}

impl Default for ErrorScore {
    fn default() -> Self {
        ErrorScore::Value(f64::NAN)
    }
}

impl fmt::Display for ErrorScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorScore::Raise => f.write_str("raise"),
            ErrorScore::Value(v) if v.is_nan() => f.write_str("nan"),
            ErrorScore::Value(v) => write!(f, "{}", v),
        }
    }
}

/// `"raise"`, `"nan"` or a number
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ErrorScoreRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<ErrorScoreRepr> for ErrorScore {
    type Error = PipelineError;

    fn try_from(repr: ErrorScoreRepr) -> Result<Self> {
        match repr {
            ErrorScoreRepr::Number(v) => Ok(ErrorScore::Value(v)),
            ErrorScoreRepr::Text(s) => match s.to_ascii_lowercase().as_str() {
                "raise" => Ok(ErrorScore::Raise),
                "nan" => Ok(ErrorScore::Value(f64::NAN)),
                _ => s.parse::<f64>().map(ErrorScore::Value).map_err(|_| {
                    PipelineError::ConfigError(format!(
                        "error_score must be 'raise', 'nan' or a number, got '{}'",
                        s
                    ))
                }),
            },
        }
    }
}

impl From<ErrorScore> for ErrorScoreRepr {
    fn from(e: ErrorScore) -> Self {
        match e {
            ErrorScore::Value(v) if v.is_finite() => ErrorScoreRepr::Number(v),
            other => ErrorScoreRepr::Text(other.to_string()),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of sampled candidates
    pub n_iter: usize,
    pub scoring: Scoring,
    pub error_score: ErrorScore,
    /// 0 silent, 1 summary, 2 per candidate, 3 per fold
    pub verbose: u8,
    /// 1 sequential, n > 1 workers, -1 all cores, -m all cores but m - 1
    pub n_jobs: i64,
    /// Number of folds
    pub k: usize,
    pub k_shuffle: bool,
    pub random_state: u64,
    pub subsample: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub colsample_bytree: Vec<f64>,
    pub min_child_weight: Vec<f64>,
    /// `n_estimators` is drawn from `[n_estimators_low, n_estimators_high)`
    pub n_estimators_low: i64,
    pub n_estimators_high: i64,
    /// `learning_rate` is drawn from `[loc, loc + scale]`
    pub learning_rate_loc: f64,
    pub learning_rate_scale: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_iter: 10,
            scoring: Scoring::Accuracy,
            error_score: ErrorScore::default(),
            verbose: 0,
            n_jobs: 1,
            k: 5,
            k_shuffle: false,
            random_state: 42,
            subsample: vec![0.6, 0.8, 1.0],
            max_depth: vec![3, 4, 5, 6],
            colsample_bytree: vec![0.6, 0.8, 1.0],
            min_child_weight: vec![1.0, 3.0, 5.0],
            n_estimators_low: 1,
            n_estimators_high: 100,
            learning_rate_loc: 0.01,
            learning_rate_scale: 0.6,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_error_score(mut self, error_score: ErrorScore) -> Self {
        self.error_score = error_score;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: i64) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Set the number of folds and whether rows are shuffled before folding
    pub fn with_folds(mut self, k: usize, shuffle: bool) -> Self {
        self.k = k;
        self.k_shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_subsample(mut self, values: Vec<f64>) -> Self {
        self.subsample = values;
        self
    }

    pub fn with_max_depth(mut self, values: Vec<usize>) -> Self {
        self.max_depth = values;
        self
    }

    pub fn with_colsample_bytree(mut self, values: Vec<f64>) -> Self {
        self.colsample_bytree = values;
        self
    }

    pub fn with_min_child_weight(mut self, values: Vec<f64>) -> Self {
        self.min_child_weight = values;
        self
    }

    pub fn with_n_estimators_range(mut self, low: i64, high: i64) -> Self {
        self.n_estimators_low = low;
        self.n_estimators_high = high;
        self
    }

    pub fn with_learning_rate(mut self, loc: f64, scale: f64) -> Self {
        self.learning_rate_loc = loc;
        self.learning_rate_scale = scale;
        self
    }

    /// Check counts, ranges and candidate lists
    pub fn validate(&self) -> Result<()> {
        if self.n_iter == 0 {
            return Err(PipelineError::invalid_param("n_iter", 0, "must be positive"));
        }
        if self.k < 2 {
            return Err(PipelineError::invalid_param("k", self.k, "must be at least 2"));
        }
        if self.n_estimators_low < 1 {
            return Err(PipelineError::invalid_param(
                "n_estimators_low",
                self.n_estimators_low,
                "must be at least 1",
            ));
        }
        if !(self.learning_rate_loc.is_finite() && self.learning_rate_loc >= 0.0) {
            return Err(PipelineError::invalid_param(
                "learning_rate_loc",
                self.learning_rate_loc,
                "must be a non-negative finite number",
            ));
        }

        for (name, values) in [("subsample", &self.subsample), ("colsample_bytree", &self.colsample_bytree)] {
            if let Some(bad) = values.iter().find(|v| !(**v > 0.0 && **v <= 1.0)) {
                return Err(PipelineError::invalid_param(name, bad, "every candidate must be in (0, 1]"));
            }
        }
        if let Some(bad) = self.max_depth.iter().find(|d| **d == 0) {
            return Err(PipelineError::invalid_param("xgb_max_depth", bad, "every candidate must be positive"));
        }
        if let Some(bad) = self
            .min_child_weight
            .iter()
            .find(|w| !(w.is_finite() && **w >= 0.0))
        {
            return Err(PipelineError::invalid_param(
                "xgb_min_child_weight",
                bad,
                "every candidate must be non-negative",
            ));
        }

        // Empty lists and degenerate ranges are caught by the distributions
        XgbSearchSpace::from_config(self).map(|_| ())
    }
}

/// Hyperparameter distributions for the booster
#[derive(Debug, Clone)]
pub struct XgbSearchSpace {
    space: SearchSpace,
    random_state: u64,
}

impl XgbSearchSpace {
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let space = SearchSpace::new()
            .randint("n_estimators", config.n_estimators_low, config.n_estimators_high)
            .uniform("learning_rate", config.learning_rate_loc, config.learning_rate_scale)
            .choice("subsample", config.subsample.iter().copied())
            .choice("max_depth", config.max_depth.iter().map(|&d| d as i64))
            .choice("colsample_bytree", config.colsample_bytree.iter().copied())
            .choice("min_child_weight", config.min_child_weight.iter().copied());
        space.validate()?;

        Ok(Self {
            space,
            random_state: config.random_state,
        })
    }

    /// Draw `n` candidates, reproducibly for a given seed
    pub fn sample_candidates(&self, n: usize) -> Vec<TrialParams> {
        RandomSampler::new(Some(self.random_state)).sample_n(&self.space, n)
    }

    /// Booster configuration for one sampled candidate
    pub fn to_xgb_config(&self, params: &TrialParams) -> Result<XGBoostConfig> {
        let int = |name: &str| -> Result<usize> {
            param(params, name)?
                .as_int()
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .ok_or_else(|| {
                    PipelineError::TrainingError(format!("parameter '{}' must be a positive integer", name))
                })
        };
        let float = |name: &str| -> Result<f64> { Ok(param(params, name)?.as_float()) };

        Ok(XGBoostConfig {
            n_estimators: int("n_estimators")?,
            learning_rate: float("learning_rate")?,
            max_depth: int("max_depth")?,
            min_child_weight: float("min_child_weight")?,
            subsample: float("subsample")?,
            colsample_bytree: float("colsample_bytree")?,
            random_state: Some(self.random_state),
            ..XGBoostConfig::default()
        })
    }
}

fn param<'a>(params: &'a TrialParams, name: &str) -> Result<&'a ParameterValue> {
    params
        .get(name)
        .ok_or_else(|| PipelineError::TrainingError(format!("candidate is missing parameter '{}'", name)))
}

/// Cross-validation outcome of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: TrialParams,
    pub cv: CVResults,
    /// 1 is best; tied scores share a rank
    pub rank: usize,
    /// Folds whose fit or scoring failed and got `error_score`
    pub n_failed_folds: usize,
}

impl CandidateResult {
    pub fn mean_score(&self) -> f64 {
        self.cv.mean_score
    }
}

/// `a` beats `b`: larger wins, NaN loses to any number
fn beats(a: f64, b: f64) -> bool {
    match (a.is_nan(), b.is_nan()) {
        (true, _) => false,
        (false, true) => true,
        (false, false) => a > b,
    }
}

/// Competition ranks over mean scores
fn rank_scores(means: &[f64]) -> Vec<usize> {
    means
        .iter()
        .map(|&m| 1 + means.iter().filter(|&&other| beats(other, m)).count())
        .collect()
}

/// The refitted best booster with its search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidatedClassifier {
    model: XGBoostClassifier,
    encoder: LabelEncoder,
    feature_names: Vec<String>,
    scoring: Scoring,
    best_index: usize,
    best_config: XGBoostConfig,
    cv_results: Vec<CandidateResult>,
}

impl CrossValidatedClassifier {
    fn features(&self, x: &DataFrame) -> Result<Array2<f64>> {
        require_columns(x, &self.feature_names)?;
        columns_to_array2(x, &self.feature_names)
    }

    /// Class probabilities, one column per entry of [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        self.model.predict_proba(&self.features(x)?)
    }

    /// Predicted label for every row of `x`
    pub fn predict(&self, x: &DataFrame) -> Result<Vec<ClassLabel>> {
        self.model
            .predict(&self.features(x)?)?
            .into_iter()
            .map(|idx| {
                self.encoder.decode(idx).cloned().ok_or_else(|| {
                    PipelineError::TrainingError(format!("predicted class index {} out of range", idx))
                })
            })
            .collect()
    }

    /// Predictions as a named series
    pub fn predict_series(&self, x: &DataFrame, name: &str) -> Result<Series> {
        Ok(labels_to_series(name, &self.predict(x)?))
    }

    pub fn best_params(&self) -> &TrialParams {
        &self.cv_results[self.best_index].params
    }

    /// Booster configuration that was refit
    pub fn best_config(&self) -> &XGBoostConfig {
        &self.best_config
    }

    /// Mean cross-validated score of the best candidate
    pub fn best_score(&self) -> f64 {
        self.cv_results[self.best_index].mean_score()
    }

    pub fn best_index(&self) -> usize {
        self.best_index
    }

    /// One entry per sampled candidate, in sampling order
    pub fn cv_results(&self) -> &[CandidateResult] {
        &self.cv_results
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// Split-count importances keyed by feature name
    pub fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        let importances = self.model.feature_importances()?;
        Some(self.feature_names.iter().cloned().zip(importances.iter().copied()).collect())
    }
}

impl Classifier for CrossValidatedClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn classes(&self) -> &[ClassLabel] {
        self.encoder.classes()
    }

    fn predict_labels(&self, x: &DataFrame) -> Result<Vec<ClassLabel>> {
        self.predict(x)
    }
}

/// Fit on the training rows of one fold and score the held-out rows
fn evaluate_fold(
    config: &XGBoostConfig,
    x: &Array2<f64>,
    y: &[usize],
    split: &CVSplit,
    n_classes: usize,
    scoring: Scoring,
    classes: &[ClassLabel],
) -> Result<f64> {
    let x_train = x.select(Axis(0), &split.train_indices);
    let y_train: Vec<usize> = split.train_indices.iter().map(|&i| y[i]).collect();
    let x_val = x.select(Axis(0), &split.test_indices);
    let y_val: Vec<usize> = split.test_indices.iter().map(|&i| y[i]).collect();

    let mut model = XGBoostClassifier::new(config.clone());
    model.fit(&x_train, &y_train, n_classes)?;
    let proba = model.predict_proba(&x_val)?;
    scoring.score(&y_val, &proba, classes)
}

fn check_class_counts(y: &[usize], encoder: &LabelEncoder, k: usize) -> Result<()> {
    if encoder.n_classes() < 2 {
        return Err(PipelineError::ValidationError(format!(
            "the target needs at least 2 classes, got {}",
            encoder.n_classes()
        )));
    }
    if y.len() < k {
        return Err(PipelineError::ValidationError(format!(
            "cannot run {}-fold cross-validation on {} samples",
            k,
            y.len()
        )));
    }
    let mut counts = vec![0usize; encoder.n_classes()];
    for &c in y {
        counts[c] += 1;
    }
    for (idx, &count) in counts.iter().enumerate() {
        if count < k {
            let label = encoder.decode(idx).map(|l| l.to_string()).unwrap_or_default();
            return Err(PipelineError::ValidationError(format!(
                "class '{}' has {} samples, fewer than k={}",
                label, count, k
            )));
        }
    }
    Ok(())
}

/// Randomized search over the booster's hyperparameters with k-fold
/// cross-validation, refitting the best candidate on all of `x_train`.
///
/// `y_train` must hold exactly one column aligned with `x_train`; every
/// column of `x_train` is used as a feature.
pub fn train_xgb_crossvalidated(
    x_train: &DataFrame,
    y_train: &DataFrame,
    config: &SearchConfig,
) -> Result<CrossValidatedClassifier> {
    config.validate()?;
    let search_space = XgbSearchSpace::from_config(config)?;

    let feature_names = column_names(x_train);
    if feature_names.is_empty() {
        return Err(PipelineError::DataError("training frame has no feature columns".to_string()));
    }
    let x = columns_to_array2(x_train, &feature_names)?;
    let labels = labels_from_series(target_series(y_train)?)?;
    if labels.len() != x.nrows() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} target rows", x.nrows()),
            actual: format!("{} target rows", labels.len()),
        });
    }

    let encoder = LabelEncoder::fit(&labels);
    let y = encoder.encode(&labels)?;
    check_class_counts(&y, &encoder, config.k)?;
    let n_classes = encoder.n_classes();
    let classes = encoder.classes();

    let folds = KFold::new(config.k, config.k_shuffle)
        .with_random_state(config.random_state)
        .split(x.nrows())?;

    let candidates = search_space.sample_candidates(config.n_iter);
    let xgb_configs = candidates
        .iter()
        .map(|p| search_space.to_xgb_config(p))
        .collect::<Result<Vec<_>>>()?;

    let parallel = ParallelConfig::from_n_jobs(config.n_jobs);
    let n_fits = candidates.len() * folds.len();
    if config.verbose >= 1 {
        info!(
            n_folds = folds.len(),
            n_candidates = candidates.len(),
            n_fits,
            n_threads = parallel.num_threads(),
            scoring = %config.scoring,
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            n_fits
        );
    }

    let mut timer = StageTimer::start("hyperparameter search");
    let tasks: Vec<(usize, usize)> = (0..xgb_configs.len())
        .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
        .collect();

    let outcomes: Vec<Result<f64>> = parallel.install(|| {
        tasks
            .par_iter()
            .map(|&(c, f)| {
                let outcome = evaluate_fold(&xgb_configs[c], &x, &y, &folds[f], n_classes, config.scoring, classes);
                debug!(candidate = c, fold = f, ok = outcome.is_ok(), "fit finished");
                outcome
            })
            .collect()
    })?;
    timer.lap("cross-validation");

    let n_folds = folds.len();
    let mut fold_scores: Vec<Vec<f64>> = vec![Vec::with_capacity(n_folds); candidates.len()];
    let mut failures = vec![0usize; candidates.len()];
    for (&(c, f), outcome) in tasks.iter().zip(outcomes) {
        let score = match outcome {
            Ok(score) => score,
            Err(e) => match config.error_score {
                ErrorScore::Raise => {
                    return Err(PipelineError::FitFailed {
                        candidate: c,
                        fold: f,
                        reason: e.to_string(),
                    })
                }
                ErrorScore::Value(v) => {
                    warn!(candidate = c, fold = f, error = %e, error_score = v, "fit failed; assigning error_score");
                    failures[c] += 1;
                    v
                }
            },
        };
        if config.verbose >= 3 {
            info!(candidate = c, fold = f, score, "[CV {}/{}] candidate {}", f + 1, n_folds, c);
        }
        fold_scores[c].push(score);
    }

    let total_failures: usize = failures.iter().sum();
    if total_failures == n_fits {
        return Err(PipelineError::TrainingError(format!(
            "all {} fits failed; check the data and the scoring '{}'",
            n_fits, config.scoring
        )));
    }

    let cv: Vec<CVResults> = fold_scores.into_iter().map(CVResults::from_scores).collect();
    let ranks = rank_scores(&cv.iter().map(|r| r.mean_score).collect::<Vec<_>>());
    let cv_results: Vec<CandidateResult> = candidates
        .into_iter()
        .zip(cv)
        .zip(ranks)
        .zip(failures)
        .map(|(((params, cv), rank), n_failed_folds)| CandidateResult {
            params,
            cv,
            rank,
            n_failed_folds,
        })
        .collect();

    if config.verbose >= 2 {
        for (c, result) in cv_results.iter().enumerate() {
            info!(
                candidate = c,
                mean_score = result.cv.mean_score,
                std_score = result.cv.std_score,
                rank = result.rank,
                params = ?result.params,
                "candidate evaluated"
            );
        }
    }

    let best_index = cv_results.iter().position(|r| r.rank == 1).unwrap_or(0);
    let best_config = xgb_configs[best_index].clone();
    if cv_results[best_index].mean_score().is_nan() {
        warn!("every candidate has a NaN mean score; refitting the first candidate");
    }

    let mut model = XGBoostClassifier::new(best_config.clone());
    model.fit(&x, &y, n_classes)?;
    timer.lap("refit");

    if config.verbose >= 1 {
        info!(
            best_index,
            best_score = cv_results[best_index].mean_score(),
            n_estimators = best_config.n_estimators,
            learning_rate = best_config.learning_rate,
            max_depth = best_config.max_depth,
            "Best candidate refit on the full training set"
        );
        timer.finish();
    }

    Ok(CrossValidatedClassifier {
        model,
        encoder,
        feature_names,
        scoring: config.scoring,
        best_index,
        best_config,
        cv_results,
    })
}
