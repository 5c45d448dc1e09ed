//! Hyperparameter search space and sampling
//!
//! Provides the randomized-search building blocks:
//! - Continuous and discrete uniform distributions
//! - Fixed candidate lists
//! - Seeded random sampling of configurations

mod sampler;
mod search_space;

pub use sampler::RandomSampler;
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
