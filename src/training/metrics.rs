//! Classification metrics and training history

use std::fmt;

const PROB_EPS: f64 = 1e-7;

/// Metrics accumulated over pass/run predictions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    /// Sum of per-play binary cross-entropy
    pub log_loss_sum: f64,
    /// Predictions on the right side of 0.5
    pub correct: usize,
    pub total: usize,
    /// Predicted pass and was a pass
    pub true_pass: usize,
    pub predicted_pass: usize,
    pub actual_pass: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics of pass probabilities against 1.0/0.0 targets
    pub fn from_predictions(probs: &[f32], targets: &[f32]) -> Self {
        let mut metrics = Self::new();
        metrics.update(probs, targets);
        metrics
    }

    pub fn update(&mut self, probs: &[f32], targets: &[f32]) {
        for (p, t) in probs.iter().zip(targets) {
            let predicted = *p >= 0.5;
            let actual = *t >= 0.5;
            let p = (*p as f64).clamp(PROB_EPS, 1.0 - PROB_EPS);

            self.log_loss_sum += if actual { -p.ln() } else { -(1.0 - p).ln() };
            self.total += 1;
            if predicted == actual {
                self.correct += 1;
            }
            if predicted {
                self.predicted_pass += 1;
            }
            if actual {
                self.actual_pass += 1;
                if predicted {
                    self.true_pass += 1;
                }
            }
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Mean binary cross-entropy
    pub fn log_loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.log_loss_sum / self.total as f64
        }
    }

    /// Share of predicted passes that were passes
    pub fn pass_precision(&self) -> f64 {
        if self.predicted_pass == 0 {
            0.0
        } else {
            self.true_pass as f64 / self.predicted_pass as f64
        }
    }

    /// Share of passes predicted as passes
    pub fn pass_recall(&self) -> f64 {
        if self.actual_pass == 0 {
            0.0
        } else {
            self.true_pass as f64 / self.actual_pass as f64
        }
    }

    /// Accuracy of always predicting the majority class
    pub fn majority_baseline(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            let passes = self.actual_pass as f64 / self.total as f64;
            passes.max(1.0 - passes)
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Log loss: {:.4} | Acc: {:.2}% (majority {:.2}%) | Pass precision: {:.2}% recall: {:.2}%",
            self.log_loss(),
            self.accuracy() * 100.0,
            self.majority_baseline() * 100.0,
            self.pass_precision() * 100.0,
            self.pass_recall() * 100.0
        )
    }
}

/// Loss per epoch of an iterative fit
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub losses: Vec<f64>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_epoch(&mut self, loss: f64) {
        self.losses.push(loss);
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }
}
