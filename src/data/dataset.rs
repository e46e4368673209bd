//! Model-ready partitions and tensor batches

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use sha2::{Digest, Sha256};

use crate::data::split::FoldSplit;
use crate::{PlayCallError, Result};

/// One fold of the feature matrix, row-major
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// `len() * n_features` values
    pub features: Vec<f32>,
    /// 1.0 = pass, 0.0 = run
    pub targets: Vec<f32>,
    pub n_features: usize,
}

impl Partition {
    pub fn new(features: Vec<f32>, targets: Vec<f32>, n_features: usize) -> Result<Self> {
        if features.len() != targets.len() * n_features {
            return Err(PlayCallError::Training(format!(
                "partition has {} values for {} rows x {} features",
                features.len(),
                targets.len(),
                n_features
            )));
        }
        Ok(Partition {
            features,
            targets,
            n_features,
        })
    }

    /// Build from a slice of rows
    pub fn from_rows(rows: &[Vec<f32>], targets: &[f32], n_features: usize) -> Result<Self> {
        let mut features = Vec::with_capacity(rows.len() * n_features);
        for row in rows {
            if row.len() != n_features {
                return Err(PlayCallError::Training(format!(
                    "row has {} features, expected {}",
                    row.len(),
                    n_features
                )));
            }
            features.extend_from_slice(row);
        }
        Self::new(features, targets.to_vec(), n_features)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.features[i * self.n_features..(i + 1) * self.n_features]
    }

    /// Share of pass plays
    pub fn pass_rate(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.targets.iter().sum::<f32>() / self.len() as f32
    }

    /// Full-batch tensors on a device
    pub fn to_batch<B: Backend>(&self, device: &B::Device) -> PlayBatch<B> {
        let batch_size = self.len();

        let features = Tensor::<B, 1>::from_floats(self.features.as_slice(), device)
            .reshape([batch_size, self.n_features]);
        let targets = Tensor::<B, 1>::from_floats(self.targets.as_slice(), device)
            .reshape([batch_size, 1]);

        PlayBatch { features, targets }
    }
}

/// Train/validation/test partitions of one matrix
#[derive(Debug, Clone)]
pub struct SplitPartitions {
    pub feature_names: Vec<String>,
    pub train: Partition,
    pub validation: Partition,
    pub test: Partition,
}

impl SplitPartitions {
    /// Cut row-aligned features and targets along a fold split
    pub fn from_split(
        feature_names: Vec<String>,
        rows: &[Vec<f32>],
        targets: &[f32],
        split: &FoldSplit,
    ) -> Result<Self> {
        if rows.len() != split.rows() || targets.len() != split.rows() {
            return Err(PlayCallError::SplitOutOfRange {
                boundary: split.rows(),
                rows: rows.len().min(targets.len()),
            });
        }
        let n = feature_names.len();
        let part = |range: std::ops::Range<usize>| {
            Partition::from_rows(&rows[range.clone()], &targets[range], n)
        };

        Ok(SplitPartitions {
            train: part(split.train.clone())?,
            validation: part(split.validation.clone())?,
            test: part(split.test.clone())?,
            feature_names,
        })
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// SHA-256 over feature names, fold sizes and every value, as hex.
    /// Trials scored on one matrix are not reused for another.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.feature_names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        for part in [&self.train, &self.validation, &self.test] {
            hasher.update((part.len() as u64).to_le_bytes());
            for value in part.features.iter().chain(&part.targets) {
                hasher.update(value.to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Batch of plays for training
#[derive(Debug, Clone)]
pub struct PlayBatch<B: Backend> {
    /// [batch, features]
    pub features: Tensor<B, 2>,
    /// [batch, 1]
    pub targets: Tensor<B, 2>,
}
