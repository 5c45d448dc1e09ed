//! Named scoring metrics for model selection
//!
//! Larger is always better: losses are exposed negated (`neg_log_loss`).

use super::metrics::{
    accuracy, balanced_accuracy, log_loss, macro_average, micro_average,
    precision_recall_fscore_support, roc_auc, weighted_average, AveragedScores,
};
use crate::error::{PipelineError, Result};
use crate::preprocessing::ClassLabel;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How per-class scores are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    /// Score of the positive label `1` only
    Binary,
    Macro,
    Micro,
    Weighted,
}

/// Scoring metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scoring {
    Accuracy,
    BalancedAccuracy,
    Precision(Average),
    Recall(Average),
    F1(Average),
    RocAuc,
    NegLogLoss,
}

impl Scoring {
    /// Every accepted metric name
    pub const NAMES: &'static [&'static str] = &[
        "accuracy",
        "balanced_accuracy",
        "precision",
        "precision_macro",
        "precision_micro",
        "precision_weighted",
        "recall",
        "recall_macro",
        "recall_micro",
        "recall_weighted",
        "f1",
        "f1_macro",
        "f1_micro",
        "f1_weighted",
        "roc_auc",
        "neg_log_loss",
    ];

    /// Score predictions for one validation fold.
    ///
    /// `y_true` holds class indices into `classes`, `proba` one column per class.
    pub fn score(&self, y_true: &[usize], proba: &Array2<f64>, classes: &[ClassLabel]) -> Result<f64> {
        if y_true.is_empty() {
            return Err(PipelineError::ScoringError("cannot score an empty fold".to_string()));
        }
        if proba.nrows() != y_true.len() || proba.ncols() != classes.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{}x{} probabilities", y_true.len(), classes.len()),
                actual: format!("{}x{}", proba.nrows(), proba.ncols()),
            });
        }

        match self {
            Scoring::Accuracy => Ok(accuracy(y_true, &argmax(proba))),
            Scoring::BalancedAccuracy => Ok(balanced_accuracy(y_true, &argmax(proba))),
            Scoring::Precision(avg) => Ok(averaged(y_true, &argmax(proba), classes, *avg)?.precision),
            Scoring::Recall(avg) => Ok(averaged(y_true, &argmax(proba), classes, *avg)?.recall),
            Scoring::F1(avg) => Ok(averaged(y_true, &argmax(proba), classes, *avg)?.f1_score),
            Scoring::RocAuc => {
                if classes.len() != 2 {
                    return Err(PipelineError::ScoringError(format!(
                        "roc_auc needs a binary target, got {} classes",
                        classes.len()
                    )));
                }
                let is_positive: Vec<bool> = y_true.iter().map(|&c| c == 1).collect();
                let scores: Vec<f64> = proba.column(1).to_vec();
                roc_auc(&is_positive, &scores).ok_or_else(|| {
                    PipelineError::ScoringError(
                        "roc_auc is undefined when only one class is present in the fold".to_string(),
                    )
                })
            }
            Scoring::NegLogLoss => Ok(-log_loss(y_true, proba)),
        }
    }
}

fn argmax(proba: &Array2<f64>) -> Vec<usize> {
    proba
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (k, &p)| if p > best.1 { (k, p) } else { best })
                .0
        })
        .collect()
}

fn averaged(y_true: &[usize], y_pred: &[usize], classes: &[ClassLabel], average: Average) -> Result<AveragedScores> {
    let mut labels: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_unstable();
    labels.dedup();

    match average {
        Average::Binary => {
            if classes.len() > 2 {
                return Err(PipelineError::ScoringError(format!(
                    "binary averaging needs at most 2 classes, got {}; use a _macro, _micro or _weighted metric",
                    classes.len()
                )));
            }
            let pos = classes
                .iter()
                .position(|c| *c == ClassLabel::Int(1))
                .ok_or_else(|| {
                    PipelineError::ScoringError(format!(
                        "positive label 1 is not one of the classes {:?}",
                        classes.iter().map(|c| c.to_string()).collect::<Vec<_>>()
                    ))
                })?;
            let (scores, _) = precision_recall_fscore_support(y_true, y_pred, &[pos]);
            let s = &scores[0];
            Ok(AveragedScores {
                precision: s.precision,
                recall: s.recall,
                f1_score: s.f1_score,
            })
        }
        Average::Macro => Ok(macro_average(&precision_recall_fscore_support(y_true, y_pred, &labels).0)),
        Average::Weighted => Ok(weighted_average(&precision_recall_fscore_support(y_true, y_pred, &labels).0)),
        Average::Micro => Ok(micro_average(y_true, y_pred, &labels)),
    }
}

impl FromStr for Scoring {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let scoring = match s {
            "accuracy" => Scoring::Accuracy,
            "balanced_accuracy" => Scoring::BalancedAccuracy,
            "roc_auc" => Scoring::RocAuc,
            "neg_log_loss" => Scoring::NegLogLoss,
            other => {
                let (metric, suffix) = other.split_once('_').unwrap_or((other, ""));
                let average = match suffix {
                    "" => Average::Binary,
                    "macro" => Average::Macro,
                    "micro" => Average::Micro,
                    "weighted" => Average::Weighted,
                    _ => return Err(unknown_scoring(s)),
                };
                match metric {
                    "precision" => Scoring::Precision(average),
                    "recall" => Scoring::Recall(average),
                    "f1" => Scoring::F1(average),
                    _ => return Err(unknown_scoring(s)),
                }
            }
        };
        Ok(scoring)
    }
}

fn unknown_scoring(name: &str) -> PipelineError {
    PipelineError::ConfigError(format!(
        "unknown scoring '{}', expected one of: {}",
        name,
        Scoring::NAMES.join(", ")
    ))
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (metric, average) = match self {
            Scoring::Accuracy => return f.write_str("accuracy"),
            Scoring::BalancedAccuracy => return f.write_str("balanced_accuracy"),
            Scoring::RocAuc => return f.write_str("roc_auc"),
            Scoring::NegLogLoss => return f.write_str("neg_log_loss"),
            Scoring::Precision(a) => ("precision", a),
            Scoring::Recall(a) => ("recall", a),
            Scoring::F1(a) => ("f1", a),
        };
        match average {
            Average::Binary => f.write_str(metric),
            Average::Macro => write!(f, "{}_macro", metric),
            Average::Micro => write!(f, "{}_micro", metric),
            Average::Weighted => write!(f, "{}_weighted", metric),
        }
    }
}

impl TryFrom<String> for Scoring {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Scoring> for String {
    fn from(s: Scoring) -> Self {
        s.to_string()
    }
}
