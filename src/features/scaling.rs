//! Standardize-then-normalize scaling of continuous features
//!
//! Parameters come from the training rows only and are then applied to every
//! row, so validation and test values may fall outside [0, 1].

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::features::frame::FeatureFrame;
use crate::Result;

/// Fitted parameters for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub name: String,
    pub mean: f32,
    pub std: f32,
    /// Min of the standardized training values
    pub min: f32,
    /// Max of the standardized training values
    pub max: f32,
}

impl ColumnScale {
    fn fit(name: &str, values: &[f32]) -> Self {
        let n = values.len().max(1) as f32;
        let mean = values.iter().sum::<f32>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let std = variance.sqrt();

        let mut scale = ColumnScale {
            name: name.to_string(),
            mean,
            std,
            min: 0.0,
            max: 0.0,
        };
        let (min, max) = values
            .iter()
            .map(|v| scale.standardize(*v))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), z| {
                (lo.min(z), hi.max(z))
            });
        if min.is_finite() && max.is_finite() {
            scale.min = min;
            scale.max = max;
        }
        scale
    }

    fn standardize(&self, value: f32) -> f32 {
        if self.std > f32::EPSILON {
            (value - self.mean) / self.std
        } else {
            0.0
        }
    }

    pub fn transform(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        let z = self.standardize(value);
        if range > f32::EPSILON {
            (z - self.min) / range
        } else {
            0.0
        }
    }
}

/// Scaler for the configured continuous columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuousScaler {
    pub columns: Vec<ColumnScale>,
}

impl ContinuousScaler {
    /// Fit on `train` rows of each named column
    pub fn fit(frame: &FeatureFrame, names: &[String], train: Range<usize>) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                let values = frame.column(name)?;
                Ok(ColumnScale::fit(name, &values[train.clone()]))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Fitted scaler on {} columns over {} training rows",
            columns.len(),
            train.len()
        );
        Ok(ContinuousScaler { columns })
    }

    /// Scale every row of the fitted columns in place
    pub fn transform(&self, frame: &mut FeatureFrame) -> Result<()> {
        for scale in &self.columns {
            for value in frame.column_mut(&scale.name)?.iter_mut() {
                *value = scale.transform(*value);
            }
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}
