//! Model training
//!
//! - XGBoost-style boosted trees with second-order splits
//! - K-fold cross-validation
//! - Randomized hyperparameter search that refits the best candidate

pub mod cross_validation;
mod model;
mod search;
pub mod xgboost;

pub use cross_validation::{CVResults, CVSplit, KFold};
pub use model::Classifier;
pub use search::{
    train_xgb_crossvalidated, CandidateResult, CrossValidatedClassifier, ErrorScore, SearchConfig,
    XgbSearchSpace,
};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
