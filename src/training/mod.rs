//! Model training
//!
//! Baseline classifiers, their hyperparameter search, metrics, and the
//! trial log.

pub mod gbdt;
pub mod logistic;
pub mod metrics;
pub mod search;
pub mod tree;
pub mod trials;

pub use gbdt::{GbdtFamily, GradientBoostedTrees};
pub use logistic::{LogisticFamily, LogisticModel};
pub use metrics::{Metrics, TrainingHistory};
pub use search::{
    Classifier, FamilyReport, Hyperparams, ModelFamily, ModelSearch, ParamValue, SearchSpace,
    SearchStrategy,
};
pub use trials::{TrialLog, TrialRecord};
