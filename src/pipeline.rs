//! Split, scale, search and report in one call

use crate::config::PipelineParameters;
use crate::error::Result;
use crate::evaluation::{generate_classification_report, ClassificationReport};
use crate::preprocessing::{scale_data_with, split_data, ScaledData, SplitData};
use crate::training::{train_xgb_crossvalidated, CrossValidatedClassifier};
use crate::utils::StageTimer;
use polars::prelude::DataFrame;
use std::time::Duration;
use tracing::info;

/// Everything the pipeline produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub split: SplitData,
    pub scaled: ScaledData,
    pub model: CrossValidatedClassifier,
    pub report: ClassificationReport,
    /// Wall-clock time of each stage, in run order
    pub timings: Vec<(String, Duration)>,
}

/// Run every stage on `df` with the given parameters
pub fn run_pipeline(df: &DataFrame, params: &PipelineParameters) -> Result<PipelineOutput> {
    params.validate()?;
    let mut timer = StageTimer::start("pipeline");

    let split = split_data(df, &params.split_config())?;
    timer.lap("split");

    let scaled = scale_data_with(&split.x_train, &split.x_test, params.scale_strategy)?;
    timer.lap("scale");

    let model = train_xgb_crossvalidated(&scaled.x_train_scaled, &split.y_train, &params.search_config())?;
    timer.lap("train");

    let report = generate_classification_report(&model, &scaled.x_test_scaled, &split.y_test)?;
    timer.lap("report");

    info!(
        best_score = model.best_score(),
        accuracy = report.accuracy(),
        "Pipeline finished"
    );
    let timings = timer.finish();

    Ok(PipelineOutput {
        split,
        scaled,
        model,
        report,
        timings,
    })
}
