//! Model evaluation: metrics, named scorers and the classification report

pub mod metrics;
mod report;
mod scoring;

pub use report::{
    generate_classification_report, ClassificationReport, ReportRow, ACCURACY_ROW, MACRO_AVG_ROW,
    WEIGHTED_AVG_ROW,
};
pub use scoring::{Average, Scoring};
