//! Class label extraction and encoding
//!
//! Targets arrive as a one-column frame of integers, booleans, strings or
//! integral floats. The booster works on dense class indices `0..n_classes`,
//! so labels are sorted, deduplicated and mapped back and forth here.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single class label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    Int(i64),
    Str(String),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Int(v) => write!(f, "{}", v),
            ClassLabel::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ClassLabel {
    fn from(v: i64) -> Self {
        ClassLabel::Int(v)
    }
}

impl From<&str> for ClassLabel {
    fn from(s: &str) -> Self {
        ClassLabel::Str(s.to_string())
    }
}

/// Return the only column of a target frame
pub fn target_series(y: &DataFrame) -> Result<&Series> {
    match y.get_columns() {
        [column] => Ok(column.as_materialized_series()),
        columns => Err(PipelineError::ShapeError {
            expected: "a single target column".to_string(),
            actual: format!("{} columns", columns.len()),
        }),
    }
}

/// Read every value of a target series as a class label
pub fn labels_from_series(series: &Series) -> Result<Vec<ClassLabel>> {
    if series.null_count() > 0 {
        return Err(PipelineError::DataError(format!(
            "target '{}' contains {} missing values",
            series.name(),
            series.null_count()
        )));
    }

    let dtype = series.dtype();
    if dtype.is_integer() {
        let ints = series.cast(&DataType::Int64)?;
        return Ok(ints.i64()?.into_no_null_iter().map(ClassLabel::Int).collect());
    }

    match dtype {
        DataType::Boolean => Ok(series
            .bool()?
            .into_no_null_iter()
            .map(|b| ClassLabel::Int(b as i64))
            .collect()),
        DataType::String => Ok(series
            .str()?
            .into_no_null_iter()
            .map(|s| ClassLabel::Str(s.to_string()))
            .collect()),
        dt if dt.is_float() => {
            let floats = series.cast(&DataType::Float64)?;
            floats
                .f64()?
                .into_no_null_iter()
                .map(|v| {
                    if v.is_finite() && v.fract() == 0.0 {
                        Ok(ClassLabel::Int(v as i64))
                    } else {
                        Err(PipelineError::DataError(format!(
                            "target '{}' holds non-integral value {}; classification needs discrete labels",
                            series.name(),
                            v
                        )))
                    }
                })
                .collect()
        }
        other => Err(PipelineError::DataError(format!(
            "target '{}' has unsupported dtype {}",
            series.name(),
            other
        ))),
    }
}

/// Build a series from labels; integer labels give `Int64`, string labels `String`
pub fn labels_to_series(name: &str, labels: &[ClassLabel]) -> Series {
    if labels.iter().all(|l| matches!(l, ClassLabel::Int(_))) {
        let values: Vec<i64> = labels
            .iter()
            .map(|l| match l {
                ClassLabel::Int(v) => *v,
                ClassLabel::Str(_) => 0,
            })
            .collect();
        Series::new(name.into(), values)
    } else {
        let values: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        Series::new(name.into(), values)
    }
}

/// Maps sorted class labels to dense indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<ClassLabel>,
}

impl LabelEncoder {
    /// Fit on observed labels
    pub fn fit(labels: &[ClassLabel]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Sorted distinct labels
    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode labels into class indices
    pub fn encode(&self, labels: &[ClassLabel]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.classes.binary_search(l).map_err(|_| {
                    PipelineError::ValidationError(format!("label '{}' was not seen during fit", l))
                })
            })
            .collect()
    }

    /// Decode a class index
    pub fn decode(&self, idx: usize) -> Option<&ClassLabel> {
        self.classes.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_labels() {
        let s = Series::new("y".into(), &[1i32, 0, 1]);
        let labels = labels_from_series(&s).unwrap();
        assert_eq!(labels, vec![ClassLabel::Int(1), ClassLabel::Int(0), ClassLabel::Int(1)]);
    }

    #[test]
    fn test_integral_float_labels() {
        let s = Series::new("y".into(), &[0.0, 2.0]);
        let labels = labels_from_series(&s).unwrap();
        assert_eq!(labels[1], ClassLabel::Int(2));

        let s = Series::new("y".into(), &[0.5, 2.0]);
        assert!(labels_from_series(&s).is_err());
    }

    #[test]
    fn test_string_labels_sorted() {
        let s = Series::new("y".into(), &["dog", "cat", "dog"]);
        let labels = labels_from_series(&s).unwrap();
        let encoder = LabelEncoder::fit(&labels);
        assert_eq!(encoder.classes(), &[ClassLabel::from("cat"), ClassLabel::from("dog")]);
        assert_eq!(encoder.encode(&labels).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_encode_unseen_label() {
        let encoder = LabelEncoder::fit(&[ClassLabel::Int(0), ClassLabel::Int(1)]);
        assert!(encoder.encode(&[ClassLabel::Int(7)]).is_err());
    }

    #[test]
    fn test_target_series_requires_one_column() {
        let df = df!("a" => &[1, 2], "b" => &[3, 4]).unwrap();
        assert!(matches!(target_series(&df), Err(PipelineError::ShapeError { .. })));
    }

    #[test]
    fn test_labels_to_series_dtype() {
        let s = labels_to_series("y", &[ClassLabel::Int(3), ClassLabel::Int(1)]);
        assert_eq!(s.dtype(), &DataType::Int64);
        let s = labels_to_series("y", &[ClassLabel::from("a")]);
        assert_eq!(s.dtype(), &DataType::String);
    }
}
