//! Depth-limited regression tree used as the boosting base learner

use serde::{Deserialize, Serialize};

use crate::data::dataset::Partition;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Rows with `feature <= threshold` go left
    Split {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f32]) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Squared-error regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f32,
    gain: f64,
}

struct TreeBuilder<'a> {
    data: &'a Partition,
    targets: &'a [f64],
    max_depth: usize,
    min_samples_leaf: usize,
}

impl<'a> TreeBuilder<'a> {
    fn build(&self, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let value = mean(indices.iter().map(|&i| self.targets[i]), n_samples);

        if depth >= self.max_depth || n_samples < 2 * self.min_samples_leaf.max(1) {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(split) = self.best_split(indices) else {
            return TreeNode::Leaf { value, n_samples };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.data.row(i)[split.feature] <= split.threshold);

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
            n_samples,
        }
    }

    /// Largest reduction in squared error; earlier features win ties
    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let parent_score = total_sum * total_sum / n as f64;
        let mut best: Option<SplitCandidate> = None;

        let mut order = indices.to_vec();
        for feature in 0..self.data.n_features {
            let value = |i: usize| self.data.row(i)[feature];
            order.sort_by(|&a, &b| {
                value(a)
                    .partial_cmp(&value(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += self.targets[order[pos]];
                let left_count = pos + 1;
                let right_count = n - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }
                let (lo, hi) = (value(order[pos]), value(order[pos + 1]));
                if lo >= hi {
                    continue;
                }

                // SSE reduction = sum_l^2/n_l + sum_r^2/n_r - sum^2/n
                let right_sum = total_sum - left_sum;
                let gain = left_sum * left_sum / left_count as f64
                    + right_sum * right_sum / right_count as f64
                    - parent_score;

                if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() / n as f64
    }
}

impl RegressionTree {
    /// Fit `targets` (one per partition row) on the rows in `indices`
    pub fn fit(
        data: &Partition,
        targets: &[f64],
        indices: &[usize],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let builder = TreeBuilder {
            data,
            targets,
            max_depth,
            min_samples_leaf,
        };
        RegressionTree {
            root: builder.build(indices, 0),
        }
    }

    pub fn predict_row(&self, row: &[f32]) -> f64 {
        self.root.predict(row)
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn n_leaves(&self) -> usize {
        self.root.n_leaves()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Partition, Vec<f64>) {
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![0.5, i as f32]).collect();
        let targets: Vec<f64> = (0..10).map(|i| if i < 6 { -1.0 } else { 2.0 }).collect();
        let labels: Vec<f32> = vec![0.0; 10];
        (Partition::from_rows(&rows, &labels, 2).unwrap(), targets)
    }

    #[test]
    fn test_finds_step() {
        let (data, targets) = step_data();
        let indices: Vec<usize> = (0..10).collect();
        let tree = RegressionTree::fit(&data, &targets, &indices, 3, 1);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert!((tree.predict_row(&[0.5, 2.0]) + 1.0).abs() < 1e-9);
        assert!((tree.predict_row(&[0.5, 8.0]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_respects_max_depth_and_leaf_size() {
        let (data, targets) = step_data();
        let indices: Vec<usize> = (0..10).collect();

        let stump = RegressionTree::fit(&data, &targets, &indices, 0, 1);
        assert_eq!(stump.n_leaves(), 1);
        assert!((stump.predict_row(&[0.5, 0.0]) - 0.2).abs() < 1e-9);

        // The step at 6/4 is not allowed with leaves of at least 5
        let wide = RegressionTree::fit(&data, &targets, &indices, 3, 5);
        assert!(wide.n_leaves() <= 2);
        assert!((wide.predict_row(&[0.5, 0.0]) - (-1.0 * 5.0) / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_subset_of_rows() {
        let (data, targets) = step_data();
        let tree = RegressionTree::fit(&data, &targets, &[6, 7, 8], 2, 1);
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict_row(&[0.5, 0.0]) - 2.0).abs() < 1e-9);
    }
}
