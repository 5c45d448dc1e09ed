//! Search space definition for hyperparameters

use crate::error::{PipelineError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Distribution a parameter is drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous uniform over `[loc, loc + scale]`
    Uniform { loc: f64, scale: f64 },
    /// Discrete uniform over `[low, high)`
    RandInt { low: i64, high: i64 },
    /// Uniform choice among fixed candidates
    Choice { values: Vec<ParameterValue> },
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a continuous uniform parameter
    pub fn uniform(name: impl Into<String>, loc: f64, scale: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Uniform { loc, scale },
        }
    }

    /// Create a discrete uniform parameter, `high` excluded
    pub fn randint(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::RandInt { low, high },
        }
    }

    /// Create a parameter chosen among fixed values
    pub fn choice(name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Choice { values },
        }
    }

    /// Reject distributions that cannot be sampled
    pub fn validate(&self) -> Result<()> {
        match &self.param_type {
            ParameterType::Uniform { loc, scale } => {
                if !loc.is_finite() || !scale.is_finite() || *scale <= 0.0 {
                    return Err(PipelineError::invalid_param(
                        &self.name,
                        format!("uniform(loc={}, scale={})", loc, scale),
                        "scale must be positive and both bounds finite",
                    ));
                }
            }
            ParameterType::RandInt { low, high } => {
                if low >= high {
                    return Err(PipelineError::invalid_param(
                        &self.name,
                        format!("randint({}, {})", low, high),
                        "low must be smaller than high",
                    ));
                }
            }
            ParameterType::Choice { values } => {
                if values.is_empty() {
                    return Err(PipelineError::invalid_param(
                        &self.name,
                        "[]",
                        "at least one candidate value is required",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Uniform { loc, scale } => {
                ParameterValue::Float(rng.gen::<f64>() * scale + loc)
            }
            ParameterType::RandInt { low, high } => ParameterValue::Int(rng.gen_range(*low..*high)),
            ParameterType::Choice { values } => {
                let idx = rng.gen_range(0..values.len());
                values[idx].clone()
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> f64 {
        match self {
            ParameterValue::Float(v) => *v,
            ParameterValue::Int(v) => *v as f64,
        }
    }

    /// Get as int, if the value is integral
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            ParameterValue::Float(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a continuous uniform parameter
    pub fn uniform(self, name: impl Into<String>, loc: f64, scale: f64) -> Self {
        self.add(Parameter::uniform(name, loc, scale))
    }

    /// Add a discrete uniform parameter
    pub fn randint(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::randint(name, low, high))
    }

    /// Add a fixed-candidates parameter
    pub fn choice<V: Into<ParameterValue>>(self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.add(Parameter::choice(name, values.into_iter().map(Into::into).collect()))
    }

    /// Validate every parameter
    pub fn validate(&self) -> Result<()> {
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Sampled configuration, keyed by parameter name in sorted order
pub type TrialParams = BTreeMap<String, ParameterValue>;
