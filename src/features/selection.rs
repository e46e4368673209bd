//! Feature selection by mutual information with the play call
//!
//! Scores are computed on the training rows only. The selected names, their
//! scores and the fitted scaler are persisted together so a matrix can be
//! checked against the selection it was built with.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;

use crate::features::frame::FeatureFrame;
use crate::features::scaling::ContinuousScaler;
use crate::{PlayCallError, Result};

const MAX_BINS: usize = 20;

/// Equal-width bin index of each value
fn discretize(values: &[f32], n_bins: usize) -> Vec<usize> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return vec![0; values.len()];
    }

    let width = range / n_bins as f32;
    values
        .iter()
        .map(|v| (((v - min) / width) as usize).min(n_bins - 1))
        .collect()
}

/// Mutual information (nats) between a feature and a binary target.
/// The feature is discretized into `sqrt(n)` bins, between 2 and 20.
pub fn mutual_information(values: &[f32], targets: &[f32]) -> f64 {
    let n = values.len().min(targets.len());
    if n < 2 {
        return 0.0;
    }

    let n_bins = ((n as f64).sqrt() as usize).clamp(2, MAX_BINS);
    let bins = discretize(&values[..n], n_bins);

    let mut joint = vec![[0usize; 2]; n_bins];
    let mut target_counts = [0usize; 2];
    for (bin, target) in bins.iter().zip(&targets[..n]) {
        let class = usize::from(*target >= 0.5);
        joint[*bin][class] += 1;
        target_counts[class] += 1;
    }

    let total = n as f64;
    let mut mi = 0.0;
    for counts in &joint {
        let p_x = (counts[0] + counts[1]) as f64 / total;
        for class in 0..2 {
            let p_xy = counts[class] as f64 / total;
            let p_y = target_counts[class] as f64 / total;
            if p_xy > 0.0 && p_x > 0.0 && p_y > 0.0 {
                mi += p_xy * (p_xy / (p_x * p_y)).ln();
            }
        }
    }
    mi.max(0.0)
}

/// Selected feature names (best first) with their scores and the scaler
/// fitted alongside them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub names: Vec<String>,
    pub scores: Vec<f64>,
    /// Number of candidate columns scored
    pub candidates: usize,
    pub scaler: ContinuousScaler,
}

impl FeatureSelection {
    /// Score every frame column on the `train` rows and keep the `top_k`
    /// best. Equal scores keep frame column order.
    pub fn fit(
        frame: &FeatureFrame,
        targets: &[f32],
        train: Range<usize>,
        top_k: usize,
        scaler: ContinuousScaler,
    ) -> Result<Self> {
        if train.is_empty() {
            return Err(PlayCallError::NoData(
                "training fold is empty; cannot select features".to_string(),
            ));
        }
        if train.end > targets.len() || train.end > frame.n_rows() {
            return Err(PlayCallError::SplitOutOfRange {
                boundary: train.end,
                rows: frame.n_rows().min(targets.len()),
            });
        }

        let train_targets = &targets[train.clone()];
        let mut ranked = frame
            .names()
            .iter()
            .map(|name| {
                let values = frame.column(name)?;
                Ok((name.clone(), mutual_information(&values[train.clone()], train_targets)))
            })
            .collect::<Result<Vec<_>>>()?;
        let candidates = ranked.len();

        // Stable sort, so ties stay in column order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);

        let (names, scores): (Vec<String>, Vec<f64>) = ranked.into_iter().unzip();
        if let (Some(best), Some(score)) = (names.first(), scores.first()) {
            log::info!(
                "Selected {} of {} features (best: {} = {:.4})",
                names.len(),
                candidates,
                best,
                score
            );
        }

        Ok(FeatureSelection {
            names,
            scores,
            candidates,
            scaler,
        })
    }

    /// Selected values of one frame row, in selection order
    pub fn row(&self, frame: &FeatureFrame, row: usize) -> Result<Vec<f32>> {
        frame.row_values(row, &self.names)
    }

    /// A matrix header must list exactly the selected features, in order
    pub fn validate_columns(&self, header: &[String]) -> Result<()> {
        if header != self.names.as_slice() {
            return Err(PlayCallError::FeatureMismatch {
                expected: self.names.join(", "),
                found: header.join(", "),
            });
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        log::info!("Saved feature selection to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
