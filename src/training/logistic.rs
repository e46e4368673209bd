//! Logistic regression trained with burn
//!
//! A single linear layer with a sigmoid, fitted full-batch with SGD on binary
//! cross-entropy plus an L2 penalty on the weights. The fitted weights are
//! copied out of the tensor graph so prediction is plain arithmetic.

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

use crate::data::dataset::Partition;
use crate::training::metrics::TrainingHistory;
use crate::training::search::{Classifier, Hyperparams, ModelFamily, SearchSpace};
use crate::{PlayCallError, Result, SearchConfig};

/// Validated logistic hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl LogisticParams {
    pub fn from_hyperparams(params: &Hyperparams) -> Result<Self> {
        let parsed = LogisticParams {
            learning_rate: params.float("learning_rate")?,
            epochs: params.count("epochs")?,
            l2: params.float("l2")?,
        };
        if parsed.learning_rate.is_nan() || parsed.learning_rate <= 0.0 {
            return Err(PlayCallError::InvalidHyperparameter(format!(
                "learning_rate must be positive, got {}",
                parsed.learning_rate
            )));
        }
        if parsed.epochs == 0 {
            return Err(PlayCallError::InvalidHyperparameter(
                "epochs must be at least 1".to_string(),
            ));
        }
        if parsed.l2.is_nan() || parsed.l2 < 0.0 {
            return Err(PlayCallError::InvalidHyperparameter(format!(
                "l2 must be non-negative, got {}",
                parsed.l2
            )));
        }
        Ok(parsed)
    }
}

/// Fitted weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl LogisticModel {
    pub fn predict_row(&self, row: &[f32]) -> f32 {
        let z: f32 = self
            .weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, data: &Partition) -> Vec<f32> {
        (0..data.len()).map(|i| self.predict_row(data.row(i))).collect()
    }
}

fn binary_cross_entropy<B: AutodiffBackend>(
    probs: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let eps = 1e-7;
    let probs_clamped = probs.clamp(eps, 1.0 - eps);
    let loss = targets.clone().neg() * probs_clamped.clone().log()
        - (targets.neg() + 1.0) * (probs_clamped.neg() + 1.0).log();
    loss.mean()
}

/// Full-batch SGD on one partition
pub fn train_logistic<B: AutodiffBackend>(
    train: &Partition,
    params: &LogisticParams,
    device: &B::Device,
) -> Result<(LogisticModel, TrainingHistory)> {
    if train.is_empty() {
        return Err(PlayCallError::NoData(
            "cannot fit logistic regression on an empty partition".to_string(),
        ));
    }

    // All weights start at zero
    let mut model: Linear<B> = LinearConfig::new(train.n_features, 1)
        .with_initializer(Initializer::Zeros)
        .init(device);
    let mut optimizer = SgdConfig::new().init::<B, Linear<B>>();
    let batch = train.to_batch::<B>(device);
    let mut history = TrainingHistory::new();

    for epoch in 0..params.epochs {
        let probs = sigmoid(model.forward(batch.features.clone()));
        let mut loss = binary_cross_entropy(probs, batch.targets.clone());
        if params.l2 > 0.0 {
            let weight = model.weight.val();
            loss = loss + (weight.clone() * weight).sum().mul_scalar(params.l2);
        }

        let loss_value: f32 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(PlayCallError::Training(format!(
                "logistic loss diverged at epoch {} (learning_rate={})",
                epoch, params.learning_rate
            )));
        }
        history.record_epoch(loss_value as f64);

        let grads = loss.backward();
        let grads_params = GradientsParams::from_grads(grads, &model);
        model = optimizer.step(params.learning_rate, model, grads_params);
    }

    let weights = model
        .weight
        .val()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PlayCallError::Training(format!("reading weights: {:?}", e)))?;
    let bias = match &model.bias {
        Some(bias) => bias.val().into_scalar().elem::<f32>(),
        None => 0.0,
    };

    log::debug!(
        "Logistic fit: {} epochs, final loss {:.4}",
        params.epochs,
        history.final_loss().unwrap_or_default()
    );
    Ok((LogisticModel { weights, bias }, history))
}

/// Logistic regression as a searchable family
pub struct LogisticFamily<B: AutodiffBackend> {
    device: B::Device,
}

impl<B: AutodiffBackend> LogisticFamily<B> {
    pub const NAME: &'static str = "logistic";

    pub fn new(device: B::Device) -> Self {
        LogisticFamily { device }
    }
}

impl<B: AutodiffBackend> ModelFamily for LogisticFamily<B> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn space(&self, config: &SearchConfig) -> SearchSpace {
        let space = &config.logistic;
        SearchSpace::new(Self::NAME)
            .floats("learning_rate", &space.learning_rate)
            .ints("epochs", &space.epochs)
            .floats("l2", &space.l2)
    }

    fn fit(&self, params: &Hyperparams, train: &Partition) -> Result<Box<dyn Classifier>> {
        let params = LogisticParams::from_hyperparams(params)?;
        let (model, _) = train_logistic::<B>(train, &params, &self.device)?;
        Ok(Box::new(model))
    }
}
