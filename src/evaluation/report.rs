//! Classification report: per-class precision, recall and F1 plus aggregates

use super::metrics::{accuracy, macro_average, precision_recall_fscore_support, weighted_average};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{labels_from_series, target_series, ClassLabel};
use crate::training::Classifier;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

pub const ACCURACY_ROW: &str = "accuracy";
pub const MACRO_AVG_ROW: &str = "macro avg";
pub const WEIGHTED_AVG_ROW: &str = "weighted avg";

/// One row of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Classification report without support counts.
///
/// Rows are the class labels seen in the true targets (sorted), followed by
/// `accuracy`, `macro avg` and `weighted avg`. Aggregate rows are found by
/// position, so a class named like an aggregate never shadows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    rows: Vec<ReportRow>,
    n_classes: usize,
}

impl ClassificationReport {
    /// Build a report from true and predicted labels
    pub fn from_labels(y_true: &[ClassLabel], y_pred: &[ClassLabel]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PipelineError::DataError(
                "cannot build a classification report from zero samples".to_string(),
            ));
        }

        let mut labels = y_true.to_vec();
        labels.sort();
        labels.dedup();

        let (scores, ill_defined) = precision_recall_fscore_support(y_true, y_pred, &labels);
        if !ill_defined.precision.is_empty() {
            warn!(
                labels = ?ill_defined.precision,
                "Precision is ill-defined for labels with no predicted samples; reported as 0.0"
            );
        }
        if !ill_defined.recall.is_empty() {
            warn!(
                labels = ?ill_defined.recall,
                "Recall is ill-defined for labels with no true samples; reported as 0.0"
            );
        }

        let mut rows: Vec<ReportRow> = scores
            .iter()
            .map(|s| ReportRow {
                label: s.label.to_string(),
                precision: s.precision,
                recall: s.recall,
                f1_score: s.f1_score,
            })
            .collect();

        let acc = accuracy(y_true, y_pred);
        let macro_avg = macro_average(&scores);
        let weighted_avg = weighted_average(&scores);

        rows.push(ReportRow {
            label: ACCURACY_ROW.to_string(),
            precision: acc,
            recall: acc,
            f1_score: acc,
        });
        rows.push(ReportRow {
            label: MACRO_AVG_ROW.to_string(),
            precision: macro_avg.precision,
            recall: macro_avg.recall,
            f1_score: macro_avg.f1_score,
        });
        rows.push(ReportRow {
            label: WEIGHTED_AVG_ROW.to_string(),
            precision: weighted_avg.precision,
            recall: weighted_avg.recall,
            f1_score: weighted_avg.f1_score,
        });

        Ok(Self {
            rows,
            n_classes: labels.len(),
        })
    }

    /// All rows in display order
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Per-class rows only
    pub fn class_rows(&self) -> &[ReportRow] {
        &self.rows[..self.n_classes]
    }

    /// Row of the class whose label displays as `label`
    pub fn class_row(&self, label: &str) -> Option<&ReportRow> {
        self.class_rows().iter().find(|r| r.label == label)
    }

    pub fn accuracy_row(&self) -> &ReportRow {
        &self.rows[self.n_classes]
    }

    pub fn macro_avg(&self) -> &ReportRow {
        &self.rows[self.n_classes + 1]
    }

    pub fn weighted_avg(&self) -> &ReportRow {
        &self.rows[self.n_classes + 2]
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy_row().precision
    }

    /// Report as a frame with columns `label`, `precision`, `recall`, `f1-score`
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let labels: Vec<&str> = self.rows.iter().map(|r| r.label.as_str()).collect();
        let precision: Vec<f64> = self.rows.iter().map(|r| r.precision).collect();
        let recall: Vec<f64> = self.rows.iter().map(|r| r.recall).collect();
        let f1: Vec<f64> = self.rows.iter().map(|r| r.f1_score).collect();

        let df = df!(
            "label" => labels,
            "precision" => precision,
            "recall" => recall,
            "f1-score" => f1,
        )?;
        Ok(df)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.label.len())
            .max()
            .unwrap_or(0)
            .max(WEIGHTED_AVG_ROW.len());

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", width = width)?;
        writeln!(f)?;
        for (i, row) in self.rows.iter().enumerate() {
            if i == self.n_classes {
                writeln!(f)?;
            }
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2}",
                row.label,
                row.precision,
                row.recall,
                row.f1_score,
                width = width
            )?;
        }
        Ok(())
    }
}

/// Predict on `x_test` once and summarize the predictions against `y_test`.
///
/// `y_test` must hold exactly one column.
pub fn generate_classification_report<M: Classifier + ?Sized>(
    model: &M,
    x_test: &DataFrame,
    y_test: &DataFrame,
) -> Result<ClassificationReport> {
    if x_test.height() != y_test.height() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} target rows", x_test.height()),
            actual: format!("{} target rows", y_test.height()),
        });
    }

    let y_true = labels_from_series(target_series(y_test)?)?;
    let y_pred = model.predict_labels(x_test)?;
    let report = ClassificationReport::from_labels(&y_true, &y_pred)?;

    info!(
        n_samples = y_true.len(),
        n_classes = report.class_rows().len(),
        accuracy = report.accuracy(),
        "Classification report generated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(v: &[i64]) -> Vec<ClassLabel> {
        v.iter().copied().map(ClassLabel::Int).collect()
    }

    struct FixedModel {
        features: Vec<String>,
        classes: Vec<ClassLabel>,
        predictions: Vec<ClassLabel>,
    }

    impl Classifier for FixedModel {
        fn feature_names(&self) -> &[String] {
            &self.features
        }
        fn classes(&self) -> &[ClassLabel] {
            &self.classes
        }
        fn predict_labels(&self, _x: &DataFrame) -> Result<Vec<ClassLabel>> {
            Ok(self.predictions.clone())
        }
    }

    #[test]
    fn test_rows_and_order() {
        let report = ClassificationReport::from_labels(&ints(&[1, 0, 0, 0]), &ints(&[1, 0, 0, 1])).unwrap();
        let labels: Vec<&str> = report.rows().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "1", "accuracy", "macro avg", "weighted avg"]);
        assert_eq!(report.class_rows().len(), 2);
    }

    #[test]
    fn test_values() {
        let report = ClassificationReport::from_labels(&ints(&[0, 0, 0, 1]), &ints(&[0, 0, 1, 1])).unwrap();
        let zero = report.class_row("0").unwrap();
        assert!((zero.precision - 1.0).abs() < 1e-12);
        assert!((zero.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((zero.f1_score - 0.8).abs() < 1e-12);

        let acc = report.accuracy_row();
        assert!((acc.precision - 0.75).abs() < 1e-12);
        assert_eq!(acc.precision, acc.recall);
        assert_eq!(acc.recall, acc.f1_score);

        let macro_avg = report.macro_avg();
        assert!((macro_avg.precision - 0.75).abs() < 1e-12);
        let weighted = report.weighted_avg();
        assert!((weighted.precision - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_class_named_like_an_aggregate() {
        let strs = |v: &[&str]| v.iter().map(|s| ClassLabel::Str(s.to_string())).collect::<Vec<_>>();
        let report =
            ClassificationReport::from_labels(&strs(&["accuracy", "b", "b"]), &strs(&["b", "b", "b"])).unwrap();

        assert!((report.accuracy() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.accuracy_row().label, ACCURACY_ROW);
        assert_eq!(report.macro_avg().label, MACRO_AVG_ROW);
        assert_eq!(report.weighted_avg().label, WEIGHTED_AVG_ROW);

        let class = report.class_row("accuracy").unwrap();
        assert_eq!(class.recall, 0.0);
        assert_eq!(class.precision, 0.0);
    }

    #[test]
    fn test_predicted_only_label_has_no_row() {
        let report = ClassificationReport::from_labels(&ints(&[0, 0]), &ints(&[0, 1])).unwrap();
        assert_eq!(report.class_rows().len(), 1);
        assert!(report.class_row("1").is_none());
    }

    #[test]
    fn test_ill_defined_precision_is_zero() {
        let report = ClassificationReport::from_labels(&ints(&[0, 1]), &ints(&[0, 0])).unwrap();
        let one = report.class_row("1").unwrap();
        assert_eq!(one.precision, 0.0);
        assert_eq!(one.f1_score, 0.0);
    }

    #[test]
    fn test_dataframe_has_no_support() {
        let report = ClassificationReport::from_labels(&ints(&[0, 1, 1]), &ints(&[0, 1, 0])).unwrap();
        let df = report.to_dataframe().unwrap();
        assert_eq!(df.height(), 5);
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["label", "precision", "recall", "f1-score"]);
    }

    #[test]
    fn test_display() {
        let report = ClassificationReport::from_labels(&ints(&[0, 1]), &ints(&[0, 1])).unwrap();
        let text = report.to_string();
        assert!(text.contains("f1-score"));
        assert!(text.contains("weighted avg"));
        assert!(!text.contains("support"));
    }

    #[test]
    fn test_generate_from_model() {
        let model = FixedModel {
            features: vec!["a".to_string()],
            classes: ints(&[0, 1]),
            predictions: ints(&[0, 1, 1]),
        };
        let x = df!("a" => [0.1, 0.2, 0.3]).unwrap();
        let y = df!("target" => [0i64, 1, 0]).unwrap();
        let report = generate_classification_report(&model, &x, &y).unwrap();
        assert!((report.accuracy() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_count_mismatch() {
        let model = FixedModel {
            features: vec!["a".to_string()],
            classes: ints(&[0, 1]),
            predictions: ints(&[0, 1]),
        };
        let x = df!("a" => [0.1, 0.2]).unwrap();
        let y = df!("target" => [0i64, 1, 0]).unwrap();
        assert!(matches!(
            generate_classification_report(&model, &x, &y),
            Err(PipelineError::ShapeError { .. })
        ));
    }
}
