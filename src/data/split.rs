//! Chronological train/validation/test partition

use crate::{PlayCallError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Partition a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fold {
    Train,
    Validation,
    Test,
}

impl Fold {
    pub fn code(&self) -> &'static str {
        match self {
            Fold::Train => "train",
            Fold::Validation => "validation",
            Fold::Test => "test",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "train" => Some(Fold::Train),
            "validation" => Some(Fold::Validation),
            "test" => Some(Fold::Test),
            _ => None,
        }
    }
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fixed row ranges; train precedes validation precedes test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Range<usize>,
    pub validation: Range<usize>,
    pub test: Range<usize>,
}

impl FoldSplit {
    /// Split `rows` rows at two boundaries: `[0, train_end)`,
    /// `[train_end, validation_end)`, `[validation_end, rows)`
    pub fn from_boundaries(train_end: usize, validation_end: usize, rows: usize) -> Result<Self> {
        if train_end > rows {
            return Err(PlayCallError::SplitOutOfRange {
                boundary: train_end,
                rows,
            });
        }
        if validation_end > rows {
            return Err(PlayCallError::SplitOutOfRange {
                boundary: validation_end,
                rows,
            });
        }
        if validation_end < train_end {
            return Err(PlayCallError::Config(format!(
                "validation boundary {} precedes train boundary {}",
                validation_end, train_end
            )));
        }

        let split = FoldSplit {
            train: 0..train_end,
            validation: train_end..validation_end,
            test: validation_end..rows,
        };
        for fold in [Fold::Train, Fold::Validation, Fold::Test] {
            if split.range(fold).is_empty() {
                return Err(PlayCallError::NoData(format!(
                    "{} fold is empty (boundaries {}/{} over {} rows)",
                    fold, train_end, validation_end, rows
                )));
            }
        }
        Ok(split)
    }

    /// Derive boundaries from the week of each row. Rows must already be in
    /// week order, so every fold is a contiguous range.
    pub fn by_week(weeks: &[u8], train_through: u8, validation_through: u8) -> Result<Self> {
        if validation_through < train_through {
            return Err(PlayCallError::Config(format!(
                "validation_through_week {} precedes train_through_week {}",
                validation_through, train_through
            )));
        }
        if let Some(pos) = weeks.windows(2).position(|w| w[1] < w[0]) {
            return Err(PlayCallError::Config(format!(
                "rows are not in week order at row {}",
                pos + 1
            )));
        }

        let train_end = weeks.partition_point(|w| *w <= train_through);
        let validation_end = weeks.partition_point(|w| *w <= validation_through);
        let split = Self::from_boundaries(train_end, validation_end, weeks.len())?;

        log::info!(
            "Fold split by week: train={} (weeks <= {}), validation={} (weeks <= {}), test={}",
            split.train.len(),
            train_through,
            split.validation.len(),
            validation_through,
            split.test.len()
        );
        Ok(split)
    }

    pub fn rows(&self) -> usize {
        self.test.end
    }

    /// Fold of a row index
    pub fn fold_of(&self, row: usize) -> Option<Fold> {
        if self.train.contains(&row) {
            Some(Fold::Train)
        } else if self.validation.contains(&row) {
            Some(Fold::Validation)
        } else if self.test.contains(&row) {
            Some(Fold::Test)
        } else {
            None
        }
    }

    pub fn range(&self, fold: Fold) -> Range<usize> {
        match fold {
            Fold::Train => self.train.clone(),
            Fold::Validation => self.validation.clone(),
            Fold::Test => self.test.clone(),
        }
    }
}
