//! Random sampling of candidate configurations

use super::search_space::{SearchSpace, TrialParams};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Draws independent configurations from a search space
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    /// Create a new random sampler
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self { rng }
    }

    /// Sample the next configuration
    pub fn sample(&mut self, search_space: &SearchSpace) -> TrialParams {
        search_space.sample(&mut self.rng)
    }

    /// Sample `n` configurations, with replacement
    pub fn sample_n(&mut self, search_space: &SearchSpace, n: usize) -> Vec<TrialParams> {
        (0..n).map(|_| self.sample(search_space)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .randint("n_estimators", 1, 100)
            .uniform("learning_rate", 0.01, 0.6)
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let a = RandomSampler::new(Some(42)).sample_n(&space(), 10);
        let b = RandomSampler::new(Some(42)).sample_n(&space(), 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = RandomSampler::new(Some(1)).sample_n(&space(), 10);
        let b = RandomSampler::new(Some(2)).sample_n(&space(), 10);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sample_n_len() {
        let samples = RandomSampler::new(None).sample_n(&space(), 7);
        assert_eq!(samples.len(), 7);
        assert!(samples.iter().all(|s| s.len() == 2));
    }
}
