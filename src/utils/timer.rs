//! Per-stage wall-clock timing

use std::time::{Duration, Instant};
use tracing::info;

/// Splits a named run into consecutive stages and logs how long each took
#[derive(Debug)]
pub struct StageTimer {
    name: String,
    started: Instant,
    last_lap: Instant,
    stages: Vec<(String, Duration)>,
}

impl StageTimer {
    pub fn start(name: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            started: now,
            last_lap: now,
            stages: Vec::new(),
        }
    }

    /// Close the current stage under `stage` and return its duration
    pub fn lap(&mut self, stage: impl Into<String>) -> Duration {
        let now = Instant::now();
        let took = now - self.last_lap;
        self.last_lap = now;
        self.stages.push((stage.into(), took));
        took
    }

    /// Log every stage plus the total, returning the stage durations in order
    pub fn finish(self) -> Vec<(String, Duration)> {
        for (stage, took) in &self.stages {
            info!(run = %self.name, stage = %stage, secs = took.as_secs_f64(), "stage finished");
        }
        info!(run = %self.name, secs = self.started.elapsed().as_secs_f64(), "run finished");
        self.stages
    }
}
