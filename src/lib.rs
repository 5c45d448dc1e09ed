//! xgb-pipeline: a small tabular classification pipeline over Polars frames
//!
//! The pipeline runs four stages in order:
//! - [`preprocessing::split_data`] - seeded train/test split
//! - [`preprocessing::scale_data`] - standard scaling of feature frames
//! - [`training::train_xgb_crossvalidated`] - randomized, k-fold
//!   cross-validated search over a gradient-boosted tree classifier
//! - [`evaluation::generate_classification_report`] - precision, recall and
//!   F1 per class plus aggregate rows
//!
//! [`pipeline::run_pipeline`] chains them using a flat
//! [`config::PipelineParameters`] mapping.
//!
//! ```no_run
//! use polars::prelude::*;
//! use xgb_pipeline::prelude::*;
//!
//! # fn main() -> xgb_pipeline::Result<()> {
//! let df = df!(
//!     "a" => [0.1, 0.4, 0.35, 0.8, 0.9, 0.2],
//!     "label" => [0i64, 0, 1, 1, 1, 0],
//! )?;
//! let params = PipelineParameters::from_json_str(
//!     r#"{"input_cols": ["a"], "target_col": "label", "k": 2, "n_iter": 2}"#,
//! )?;
//! let output = run_pipeline(&df, &params)?;
//! println!("{}", output.report);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod evaluation;
pub mod optimizer;
pub mod pipeline;
pub mod preprocessing;
pub mod training;
pub mod utils;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::PipelineParameters;
    pub use crate::error::{PipelineError, Result};
    pub use crate::evaluation::{generate_classification_report, ClassificationReport, Scoring};
    pub use crate::pipeline::{run_pipeline, PipelineOutput};
    pub use crate::preprocessing::{scale_data, split_data, ScaleStrategy, ScaledData, SplitConfig, SplitData};
    pub use crate::training::{
        train_xgb_crossvalidated, Classifier, CrossValidatedClassifier, ErrorScore, SearchConfig,
    };
}
