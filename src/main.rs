//! xgb-pipeline command line entry point

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use polars::prelude::*;
use std::path::PathBuf;
use tracing::info;
use xgb_pipeline::config::PipelineParameters;
use xgb_pipeline::pipeline::run_pipeline;
use xgb_pipeline::preprocessing::ScaleStrategy;

#[derive(Parser)]
#[command(name = "xgb-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Split, scale, cross-validate an XGBoost-style classifier and report")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline and print the classification report
    Run {
        /// CSV file with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// JSON parameters file
        #[arg(short, long)]
        params: PathBuf,

        /// Override the scaling strategy from the parameters file
        #[arg(long, value_enum)]
        scale_strategy: Option<ScaleArg>,

        /// Also print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a parameters file without touching any data
    CheckParams {
        #[arg(short, long)]
        params: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScaleArg {
    PerSplit,
    TrainStatistics,
}

impl From<ScaleArg> for ScaleStrategy {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::PerSplit => ScaleStrategy::PerSplit,
            ScaleArg::TrainStatistics => ScaleStrategy::TrainStatistics,
        }
    }
}

fn load_csv(path: &PathBuf) -> anyhow::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.clone()))?
        .finish()?;
    Ok(df)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xgb_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            params,
            scale_strategy,
            json,
        } => {
            let mut parameters = PipelineParameters::from_json_file(&params)
                .with_context(|| format!("loading parameters from {}", params.display()))?;
            if let Some(strategy) = scale_strategy {
                parameters.scale_strategy = strategy.into();
            }

            let df = load_csv(&data).with_context(|| format!("reading {}", data.display()))?;
            info!(rows = df.height(), columns = df.width(), "Loaded data");

            let output = run_pipeline(&df, &parameters)?;
            println!("{}", output.report);
            println!("best params: {:?}", output.model.best_params());
            println!("best cv {}: {:.4}", output.model.scoring(), output.model.best_score());
            if json {
                println!("{}", serde_json::to_string_pretty(&output.report)?);
            }
        }
        Commands::CheckParams { params } => {
            let parameters = PipelineParameters::from_json_file(&params)
                .with_context(|| format!("checking {}", params.display()))?;
            println!("{}", serde_json::to_string_pretty(&parameters)?);
        }
    }

    Ok(())
}
