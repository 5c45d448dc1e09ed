//! Data preprocessing module
//!
//! Provides the data-preparation stages of the pipeline:
//! - Seeded train/test splitting of features and target
//! - Standard scaling of feature frames
//! - Class label extraction and encoding for the target

mod encoder;
mod scaler;
mod splitter;

pub use encoder::{labels_from_series, labels_to_series, target_series, ClassLabel, LabelEncoder};
pub use scaler::{scale_data, scale_data_with, ScaleStrategy, ScaledData, Scaler, ScalerParams};
pub use splitter::{split_data, split_sizes, SplitConfig, SplitData};
