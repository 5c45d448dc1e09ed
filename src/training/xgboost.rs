//! XGBoost-style gradient boosting classifier with second-order approximation
//!
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)]
//! - Splits must beat `gamma` and keep `min_child_weight` hessian on both sides
//! - Binary targets use the logistic loss, more classes use softmax with one
//!   tree per class and round

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const HESS_FLOOR: f64 = 1e-7;

/// XGBoost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
    /// Check every hyperparameter range
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::invalid_param("n_estimators", 0, "must be positive"));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::invalid_param("max_depth", 0, "must be positive"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(PipelineError::invalid_param(
                "learning_rate",
                self.learning_rate,
                "must be a non-negative finite number",
            ));
        }
        if !self.min_child_weight.is_finite() || self.min_child_weight < 0.0 {
            return Err(PipelineError::invalid_param(
                "min_child_weight",
                self.min_child_weight,
                "must be non-negative",
            ));
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::invalid_param(name, ratio, "must be in (0, 1]"));
            }
        }
        if self.reg_lambda < 0.0 || self.reg_alpha < 0.0 || self.gamma < 0.0 {
            return Err(PipelineError::invalid_param(
                "regularization",
                format!("lambda={}, alpha={}, gamma={}", self.reg_lambda, self.reg_alpha, self.gamma),
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Ties prefer the lower feature index so the parallel reduction is deterministic
    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.total_cmp(&b.2).then_with(|| b.0.cmp(&a.0)));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let denom = h_sum + lambda;
    if denom <= 0.0 {
        return 0.0;
    }
    if alpha > 0.0 {
        // Soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / denom
    } else {
        -g_sum / denom
    }
}

/// Best `(feature, threshold, gain)` for one feature using the exact greedy method
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    let lambda = config.reg_lambda;

    // The last position would leave the right child empty
    for (pos, &idx) in sorted_indices.iter().enumerate().take(sorted_indices.len().saturating_sub(1)) {
        g_left += grad[idx];
        h_left += hess[idx];

        let next_idx = sorted_indices[pos + 1];
        let value = x[[idx, feature]];
        let next_value = x[[next_idx, feature]];
        if (next_value - value).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |(_, best_gain)| gain > best_gain) {
            best = Some(((value + next_value) / 2.0, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

/// XGBoost classifier over dense class indices `0..n_classes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    /// One entry per boosting round, holding one tree per output group
    trees: Vec<Vec<XGBNode>>,
    base_score: Vec<f64>,
    n_classes: usize,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn is_fitted(&self) -> bool {
        self.n_classes > 0
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Number of trees grown per round
    fn n_groups(&self) -> usize {
        if self.n_classes == 2 { 1 } else { self.n_classes }
    }

    /// Fit on class indices `y`, each in `0..n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PipelineError::TrainingError(format!(
                "cannot fit on a {}x{} matrix",
                n_samples, n_features
            )));
        }
        if n_classes < 2 {
            return Err(PipelineError::TrainingError(format!(
                "classification needs at least 2 classes, got {}",
                n_classes
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(PipelineError::TrainingError(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::DataError("features contain non-finite values".to_string()));
        }

        self.n_features = n_features;
        self.n_classes = n_classes;
        let n_groups = self.n_groups();

        // Binary base score in log-odds space, softmax starts from zero margins
        self.base_score = if n_groups == 1 {
            let positives = y.iter().filter(|&&c| c == 1).count() as f64;
            let p = (positives / n_samples as f64).clamp(1e-7, 1.0 - 1e-7);
            vec![(p / (1.0 - p)).ln()]
        } else {
            vec![0.0; n_groups]
        };

        let mut raw = Array2::from_shape_fn((n_samples, n_groups), |(_, k)| self.base_score[k]);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let (grad, hess) = gradients(&raw, y, n_groups);
            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);

            let mut round = Vec::with_capacity(n_groups);
            for k in 0..n_groups {
                let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);
                let tree = build_xgb_tree(
                    x,
                    &grad.column(k).to_owned(),
                    &hess.column(k).to_owned(),
                    &row_indices,
                    &col_indices,
                    0,
                    &self.config,
                );

                for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
                round.push(tree);
            }
            self.trees.push(round);
        }

        Ok(())
    }

    /// Raw margins, one column per output group
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n_groups = self.n_groups();
        let mut raw = Array2::from_shape_fn((x.nrows(), n_groups), |(_, k)| self.base_score[k]);
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            for round in &self.trees {
                for (k, tree) in round.iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
            }
        }
        Ok(raw)
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let raw = self.decision_function(x)?;
        if self.n_groups() == 1 {
            Ok(Array2::from_shape_fn((x.nrows(), 2), |(i, k)| {
                let p = Self::sigmoid(raw[[i, 0]]);
                if k == 1 { p } else { 1.0 - p }
            }))
        } else {
            let mut probs = raw;
            probs.axis_iter_mut(Axis(0)).for_each(softmax_in_place);
            Ok(probs)
        }
    }

    /// Most probable class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (k, &p)| if p > best.1 { (k, p) } else { best })
                    .0
            })
            .collect())
    }

    /// Fraction of rows whose predicted class matches `y`
    pub fn score(&self, x: &Array2<f64>, y: &[usize]) -> Result<f64> {
        let preds = self.predict(x)?;
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        Ok(correct as f64 / y.len().max(1) as f64)
    }

    /// Compute feature importances by counting splits across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in self.trees.iter().flatten() {
            count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

/// Gradient and hessian of the loss for every row and output group
fn gradients(raw: &Array2<f64>, y: &[usize], n_groups: usize) -> (Array2<f64>, Array2<f64>) {
    let n = raw.nrows();
    let mut grad = Array2::zeros((n, n_groups));
    let mut hess = Array2::zeros((n, n_groups));

    if n_groups == 1 {
        // Logistic loss: grad = p - y, hess = p * (1 - p)
        for i in 0..n {
            let p = XGBoostClassifier::sigmoid(raw[[i, 0]]);
            let target = if y[i] == 1 { 1.0 } else { 0.0 };
            grad[[i, 0]] = p - target;
            hess[[i, 0]] = (p * (1.0 - p)).max(HESS_FLOOR);
        }
    } else {
        // Softmax loss: grad = p_k - 1{y = k}, hess = 2 p_k (1 - p_k)
        for i in 0..n {
            let mut probs = raw.row(i).to_owned();
            softmax_in_place(probs.view_mut());
            for k in 0..n_groups {
                let target = if y[i] == k { 1.0 } else { 0.0 };
                grad[[i, k]] = probs[k] - target;
                hess[[i, k]] = (2.0 * probs[k] * (1.0 - probs[k])).max(HESS_FLOOR);
            }
        }
    }

    (grad, hess)
}

fn softmax_in_place(mut values: ArrayViewMut1<f64>) {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    values.mapv_inplace(|v| (v - max).exp());
    let sum = values.sum();
    values.mapv_inplace(|v| v / sum);
}

fn count_splits(node: &XGBNode, counts: &mut [f64]) {
    match node {
        XGBNode::Leaf { .. } => {}
        XGBNode::Split { feature, left, right, .. } => {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            count_splits(left, counts);
            count_splits(right, counts);
        }
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_data() -> (Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1 } else { 0 })
            .collect();
        (x, y)
    }

    fn three_class_data() -> (Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| {
            let cluster = (i % 3) as f64;
            cluster * 5.0 + (i as f64 * 0.01) + j as f64 * 0.1
        });
        let y = (0..60).map(|i| i % 3).collect();
        (x, y)
    }

    #[test]
    fn test_binary_classifier() {
        let (x, y) = binary_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y, 2).unwrap();
        let acc = model.score(&x, &y).unwrap();
        assert!(acc >= 0.8, "binary accuracy = {}", acc);
    }

    #[test]
    fn test_multiclass_classifier() {
        let (x, y) = three_class_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y, 3).unwrap();
        let acc = model.score(&x, &y).unwrap();
        assert!(acc >= 0.9, "multiclass accuracy = {}", acc);

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[60, 3]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_predict_proba_range() {
        let (x, y) = binary_data();
        let mut model = XGBoostClassifier::new(Default::default());
        model.fit(&x, &y, 2).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.nrows(), x.nrows());
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_subsampled_fit_is_deterministic() {
        let (x, y) = binary_data();
        let config = XGBoostConfig {
            n_estimators: 10,
            subsample: 0.7,
            colsample_bytree: 0.5,
            random_state: Some(3),
            ..Default::default()
        };
        let mut a = XGBoostClassifier::new(config.clone());
        let mut b = XGBoostClassifier::new(config);
        a.fit(&x, &y, 2).unwrap();
        b.fit(&x, &y, 2).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_feature_importances_normalized() {
        let (x, y) = binary_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig { n_estimators: 5, ..Default::default() });
        model.fit(&x, &y, 2).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config() {
        let (x, y) = binary_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig { n_estimators: 0, ..Default::default() });
        assert!(matches!(model.fit(&x, &y, 2), Err(PipelineError::InvalidParameter { .. })));

        let mut model = XGBoostClassifier::new(XGBoostConfig { subsample: 0.0, ..Default::default() });
        assert!(model.fit(&x, &y, 2).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = binary_data();
        let model = XGBoostClassifier::new(Default::default());
        assert!(matches!(model.predict(&x), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_single_class_rejected() {
        let (x, _) = binary_data();
        let mut model = XGBoostClassifier::new(Default::default());
        assert!(model.fit(&x, &vec![0; 50], 1).is_err());
    }
}
