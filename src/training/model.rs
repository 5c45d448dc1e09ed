//! Classifier trait shared by trained models and the reporter

use crate::error::Result;
use crate::preprocessing::ClassLabel;
use polars::prelude::DataFrame;

/// A fitted classifier that predicts class labels for a feature frame
pub trait Classifier {
    /// Feature columns the model was trained on, in training order
    fn feature_names(&self) -> &[String];

    /// Known class labels, sorted
    fn classes(&self) -> &[ClassLabel];

    /// Predict one label per row of `x`.
    ///
    /// Columns are selected from `x` by name; extra columns are ignored.
    fn predict_labels(&self, x: &DataFrame) -> Result<Vec<ClassLabel>>;
}
