//! Classification metrics
//!
//! Per-class precision, recall and F1 with the usual averaging schemes.
//! Ratios with a zero denominator are reported as 0.0 and flagged so callers
//! can warn about them.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Scores for a single class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores<T> {
    pub label: T,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Aggregate precision / recall / F1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Which ratios hit a zero denominator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IllDefined {
    pub precision: Vec<String>,
    pub recall: Vec<String>,
}

impl IllDefined {
    pub fn is_empty(&self) -> bool {
        self.precision.is_empty() && self.recall.is_empty()
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    if den == 0 { None } else { Some(num as f64 / den as f64) }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// True positive, false positive and false negative counts for `label`
fn counts<T: PartialEq>(y_true: &[T], y_pred: &[T], label: &T) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (t == label, p == label) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    (tp, fp, fn_)
}

/// Precision, recall, F1 and support for each label, in the order given
pub fn precision_recall_fscore_support<T: PartialEq + Clone + ToString>(
    y_true: &[T],
    y_pred: &[T],
    labels: &[T],
) -> (Vec<ClassScores<T>>, IllDefined) {
    let mut ill_defined = IllDefined::default();

    let scores = labels
        .iter()
        .map(|label| {
            let (tp, fp, fn_) = counts(y_true, y_pred, label);
            let precision = ratio(tp, tp + fp).unwrap_or_else(|| {
                ill_defined.precision.push(label.to_string());
                0.0
            });
            let recall = ratio(tp, tp + fn_).unwrap_or_else(|| {
                ill_defined.recall.push(label.to_string());
                0.0
            });
            ClassScores {
                label: label.clone(),
                precision,
                recall,
                f1_score: f1(precision, recall),
                support: tp + fn_,
            }
        })
        .collect();

    (scores, ill_defined)
}

/// Unweighted mean of per-class scores
pub fn macro_average<T>(scores: &[ClassScores<T>]) -> AveragedScores {
    let n = scores.len().max(1) as f64;
    AveragedScores {
        precision: scores.iter().map(|s| s.precision).sum::<f64>() / n,
        recall: scores.iter().map(|s| s.recall).sum::<f64>() / n,
        f1_score: scores.iter().map(|s| s.f1_score).sum::<f64>() / n,
    }
}

/// Support-weighted mean of per-class scores
pub fn weighted_average<T>(scores: &[ClassScores<T>]) -> AveragedScores {
    let total: usize = scores.iter().map(|s| s.support).sum();
    if total == 0 {
        return AveragedScores { precision: 0.0, recall: 0.0, f1_score: 0.0 };
    }
    let total = total as f64;
    let weighted = |f: fn(&ClassScores<T>) -> f64| {
        scores.iter().map(|s| f(s) * s.support as f64).sum::<f64>() / total
    };
    AveragedScores {
        precision: weighted(|s| s.precision),
        recall: weighted(|s| s.recall),
        f1_score: weighted(|s| s.f1_score),
    }
}

/// Scores from pooled counts over `labels`
pub fn micro_average<T: PartialEq>(y_true: &[T], y_pred: &[T], labels: &[T]) -> AveragedScores {
    let (tp, fp, fn_) = labels.iter().fold((0, 0, 0), |acc, label| {
        let (tp, fp, fn_) = counts(y_true, y_pred, label);
        (acc.0 + tp, acc.1 + fp, acc.2 + fn_)
    });
    let precision = ratio(tp, tp + fp).unwrap_or(0.0);
    let recall = ratio(tp, tp + fn_).unwrap_or(0.0);
    AveragedScores {
        precision,
        recall,
        f1_score: f1(precision, recall),
    }
}

/// Fraction of exact matches
pub fn accuracy<T: PartialEq>(y_true: &[T], y_pred: &[T]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Mean recall over the classes present in `y_true`
pub fn balanced_accuracy<T: PartialEq + Clone>(y_true: &[T], y_pred: &[T]) -> f64 {
    let mut present: Vec<T> = Vec::new();
    for t in y_true {
        if !present.contains(t) {
            present.push(t.clone());
        }
    }
    if present.is_empty() {
        return 0.0;
    }
    let total: f64 = present
        .iter()
        .map(|label| {
            let (tp, _, fn_) = counts(y_true, y_pred, label);
            tp as f64 / (tp + fn_) as f64
        })
        .sum();
    total / present.len() as f64
}

/// Area under the ROC curve from positive-class scores.
///
/// Uses the rank-sum formulation with average ranks for ties. Returns `None`
/// when only one class is present.
pub fn roc_auc(is_positive: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = is_positive.iter().filter(|&&p| p).count();
    let n_neg = is_positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(is_positive.iter())
        .filter(|(_, &p)| p)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Mean negative log-likelihood of the true class; probabilities are clipped
pub fn log_loss(y_true: &[usize], proba: &Array2<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let eps = f64::EPSILON;
    let total: f64 = y_true
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let row_sum: f64 = proba.row(i).sum();
            let p = proba[[i, c]] / if row_sum > 0.0 { row_sum } else { 1.0 };
            -p.clamp(eps, 1.0 - eps).ln()
        })
        .sum();
    total / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_per_class_scores() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        let (scores, ill) = precision_recall_fscore_support(&y_true, &y_pred, &[0, 1]);

        assert!(ill.is_empty());
        assert!((scores[0].precision - 0.5).abs() < 1e-12);
        assert!((scores[0].recall - 0.5).abs() < 1e-12);
        assert!((scores[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores[1].recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(scores[1].support, 3);
    }

    #[test]
    fn test_zero_division_reported() {
        let y_true = [0, 0, 1];
        let y_pred = [0, 0, 0];
        let (scores, ill) = precision_recall_fscore_support(&y_true, &y_pred, &[0, 1]);
        assert_eq!(scores[1].precision, 0.0);
        assert_eq!(scores[1].f1_score, 0.0);
        assert_eq!(ill.precision, vec!["1".to_string()]);
    }

    #[test]
    fn test_averages() {
        let y_true = [0, 0, 0, 1];
        let y_pred = [0, 0, 1, 1];
        let (scores, _) = precision_recall_fscore_support(&y_true, &y_pred, &[0, 1]);

        let macro_avg = macro_average(&scores);
        assert!((macro_avg.precision - 0.75).abs() < 1e-12);
        assert!((macro_avg.recall - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-12);

        let weighted = weighted_average(&scores);
        assert!((weighted.precision - (1.0 * 3.0 + 0.5) / 4.0).abs() < 1e-12);

        let micro = micro_average(&y_true, &y_pred, &[0, 1]);
        assert!((micro.f1_score - accuracy(&y_true, &y_pred)).abs() < 1e-12);
    }

    #[test]
    fn test_balanced_accuracy() {
        let y_true = [0, 0, 0, 1];
        let y_pred = [0, 0, 0, 0];
        assert!((balanced_accuracy(&y_true, &y_pred) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&labels, &[0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.3, 0.4]), Some(1.0));
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.2]), None);
    }

    #[test]
    fn test_log_loss() {
        let proba = array![[0.9, 0.1], [0.2, 0.8]];
        let expected = -(0.9f64.ln() + 0.8f64.ln()) / 2.0;
        assert!((log_loss(&[0, 1], &proba) - expected).abs() < 1e-12);
    }
}
