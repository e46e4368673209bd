//! Gradient boosted trees for binary classification
//!
//! Boosting on log-loss: start from the training log-odds, then fit each
//! regression tree to the residuals `y - p` of a row subsample and add it
//! with shrinkage.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::Partition;
use crate::training::search::{Classifier, Hyperparams, ModelFamily, SearchSpace};
use crate::training::tree::RegressionTree;
use crate::{PlayCallError, Result, SearchConfig};

/// Validated boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Share of training rows drawn for each tree
    pub subsample: f64,
}

impl GbdtParams {
    pub fn from_hyperparams(params: &Hyperparams) -> Result<Self> {
        let parsed = GbdtParams {
            n_estimators: params.count("n_estimators")?,
            learning_rate: params.float("learning_rate")?,
            max_depth: params.count("max_depth")?,
            min_samples_leaf: params.count("min_samples_leaf")?,
            subsample: params.float("subsample")?,
        };

        if parsed.n_estimators == 0 {
            return Err(PlayCallError::InvalidHyperparameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if parsed.learning_rate.is_nan() || parsed.learning_rate <= 0.0 {
            return Err(PlayCallError::InvalidHyperparameter(format!(
                "learning_rate must be positive, got {}",
                parsed.learning_rate
            )));
        }
        if parsed.min_samples_leaf == 0 {
            return Err(PlayCallError::InvalidHyperparameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if parsed.subsample.is_nan() || parsed.subsample <= 0.0 || parsed.subsample > 1.0 {
            return Err(PlayCallError::InvalidHyperparameter(format!(
                "subsample must be in (0, 1], got {}",
                parsed.subsample
            )));
        }
        Ok(parsed)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    initial_log_odds: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn fit(train: &Partition, params: &GbdtParams, seed: u64) -> Result<Self> {
        let n = train.len();
        if n == 0 {
            return Err(PlayCallError::NoData(
                "cannot fit boosted trees on an empty partition".to_string(),
            ));
        }

        let p = (train.pass_rate() as f64).clamp(1e-6, 1.0 - 1e-6);
        let initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = vec![initial_log_odds; n];
        let mut rng = StdRng::seed_from_u64(seed);

        let n_sub = ((params.subsample * n as f64).ceil() as usize).clamp(1, n);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = train
                .targets
                .iter()
                .zip(&log_odds)
                .map(|(y, lo)| *y as f64 - sigmoid(*lo))
                .collect();

            let indices: Vec<usize> = if n_sub == n {
                (0..n).collect()
            } else {
                let mut sampled = rand::seq::index::sample(&mut rng, n, n_sub).into_vec();
                sampled.sort_unstable();
                sampled
            };

            let tree = RegressionTree::fit(
                train,
                &residuals,
                &indices,
                params.max_depth,
                params.min_samples_leaf,
            );
            for (i, lo) in log_odds.iter_mut().enumerate() {
                *lo += params.learning_rate * tree.predict_row(train.row(i));
            }
            trees.push(tree);
        }

        let model = GradientBoostedTrees {
            initial_log_odds,
            learning_rate: params.learning_rate,
            trees,
        };
        log::debug!(
            "Boosted {} trees (depth <= {}, subsample {} rows of {})",
            model.n_trees(),
            params.max_depth,
            n_sub,
            n
        );
        Ok(model)
    }

    pub fn predict_row(&self, row: &[f32]) -> f32 {
        let log_odds = self.trees.iter().fold(self.initial_log_odds, |acc, tree| {
            acc + self.learning_rate * tree.predict_row(row)
        });
        sigmoid(log_odds) as f32
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for GradientBoostedTrees {
    fn predict_proba(&self, data: &Partition) -> Vec<f32> {
        (0..data.len()).map(|i| self.predict_row(data.row(i))).collect()
    }
}

/// Boosted trees as a searchable family
pub struct GbdtFamily {
    seed: u64,
}

impl GbdtFamily {
    pub const NAME: &'static str = "gbdt";

    pub fn new(seed: u64) -> Self {
        GbdtFamily { seed }
    }
}

impl ModelFamily for GbdtFamily {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn space(&self, config: &SearchConfig) -> SearchSpace {
        let space = &config.gbdt;
        SearchSpace::new(Self::NAME)
            .ints("n_estimators", &space.n_estimators)
            .floats("learning_rate", &space.learning_rate)
            .ints("max_depth", &space.max_depth)
            .ints("min_samples_leaf", &space.min_samples_leaf)
            .floats("subsample", &space.subsample)
    }

    fn fit(&self, params: &Hyperparams, train: &Partition) -> Result<Box<dyn Classifier>> {
        let params = GbdtParams::from_hyperparams(params)?;
        Ok(Box::new(GradientBoostedTrees::fit(train, &params, self.seed)?))
    }
}
