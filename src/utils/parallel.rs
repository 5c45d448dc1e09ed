//! Worker pool sizing for the hyperparameter search

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { n_threads: Some(1) }
    }
}

impl ParallelConfig {
    /// Translate an `n_jobs` setting: `0`/`1` sequential, `n > 1` that many
    /// workers, `-1` every core, `-m` every core but `m - 1`.
    pub fn from_n_jobs(n_jobs: i64) -> Self {
        let n_threads = match n_jobs {
            0 | 1 => Some(1),
            n if n > 1 => Some(n as usize),
            -1 => None,
            n => {
                let available = std::thread::available_parallelism()
                    .map(|p| p.get())
                    .unwrap_or(1);
                let skip = usize::try_from(n.unsigned_abs() - 1).unwrap_or(usize::MAX);
                Some(available.saturating_sub(skip).max(1))
            }
        };
        Self { n_threads }
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1)
        })
    }

    /// Run `f` inside a dedicated rayon pool of `num_threads()` workers
    pub fn install<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()
            .map_err(|e| PipelineError::ThreadPoolError(e.to_string()))?;

        Ok(pool.install(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_from_n_jobs() {
        assert_eq!(ParallelConfig::from_n_jobs(1).num_threads(), 1);
        assert_eq!(ParallelConfig::from_n_jobs(0).num_threads(), 1);
        assert_eq!(ParallelConfig::from_n_jobs(4).num_threads(), 4);
        assert!(ParallelConfig::from_n_jobs(-1).num_threads() >= 1);
        assert!(ParallelConfig::from_n_jobs(-64).num_threads() >= 1);
    }

    #[test]
    fn test_most_negative_n_jobs_keeps_one_worker() {
        assert_eq!(ParallelConfig::from_n_jobs(i64::MIN).num_threads(), 1);
        assert_eq!(ParallelConfig::from_n_jobs(i64::MIN + 1).num_threads(), 1);
    }

    #[test]
    fn test_install_runs_closure() {
        let config = ParallelConfig::default().with_threads(2);
        let total: i32 = config
            .install(|| (0..100).into_par_iter().sum())
            .unwrap();
        assert_eq!(total, 4950);
    }
}
