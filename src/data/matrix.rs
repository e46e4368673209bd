//! Model matrix: the pipeline's final table
//!
//! One row per retained play with identifiers, fold label, the selected
//! features and the `is_pass` target. Written as CSV and read back for the
//! model search, where the header is checked against the persisted
//! selection.

use std::path::Path;

use crate::data::dataset::SplitPartitions;
use crate::data::split::{Fold, FoldSplit};
use crate::features::selection::FeatureSelection;
use crate::{PlayCallError, Result};

const ID_COLUMNS: [&str; 5] = ["game_id", "play_id", "week", "posteam", "fold"];
const TARGET_COLUMN: &str = "is_pass";

/// One play in the matrix
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRow {
    pub game_id: String,
    pub play_id: u32,
    pub week: u8,
    pub posteam: String,
    pub fold: Fold,
    pub features: Vec<f32>,
    pub is_pass: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl ModelMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, fold: Fold) -> usize {
        self.rows.iter().filter(|r| r.fold == fold).count()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let header = ID_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(self.feature_names.iter().cloned())
            .chain(std::iter::once(TARGET_COLUMN.to_string()));
        writer.write_record(header)?;

        for row in &self.rows {
            let record = [
                row.game_id.clone(),
                row.play_id.to_string(),
                row.week.to_string(),
                row.posteam.clone(),
                row.fold.code().to_string(),
            ]
            .into_iter()
            .chain(row.features.iter().map(|v| v.to_string()))
            .chain(std::iter::once(row.is_pass.to_string()));
            writer.write_record(record)?;
        }
        writer.flush()?;

        log::info!(
            "Wrote {} rows x {} features to {}",
            self.rows.len(),
            self.feature_names.len(),
            path.display()
        );
        Ok(())
    }

    /// Read a matrix written by `write_csv`; its feature columns must match
    /// `selection` exactly
    pub fn read_csv(path: &Path, selection: &FeatureSelection) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

        for (i, name) in ID_COLUMNS.iter().enumerate() {
            if header.get(i).map(String::as_str) != Some(*name) {
                return Err(PlayCallError::MissingColumn(name.to_string()));
            }
        }
        if header.last().map(String::as_str) != Some(TARGET_COLUMN) || header.len() <= ID_COLUMNS.len() {
            return Err(PlayCallError::MissingColumn(TARGET_COLUMN.to_string()));
        }
        let feature_names = header[ID_COLUMNS.len()..header.len() - 1].to_vec();
        selection.validate_columns(&feature_names)?;

        let parse = |value: &str, column: &str| -> Result<f32> {
            value.parse::<f32>().map_err(|e| {
                PlayCallError::Parse(format!("{} = {:?}: {}", column, value, e))
            })
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default();

            let features = feature_names
                .iter()
                .enumerate()
                .map(|(j, name)| parse(field(ID_COLUMNS.len() + j), name))
                .collect::<Result<Vec<_>>>()?;

            rows.push(MatrixRow {
                game_id: field(0).to_string(),
                play_id: field(1)
                    .parse()
                    .map_err(|e| PlayCallError::Parse(format!("play_id: {}", e)))?,
                week: field(2)
                    .parse()
                    .map_err(|e| PlayCallError::Parse(format!("week: {}", e)))?,
                posteam: field(3).to_string(),
                fold: Fold::from_code(field(4))
                    .ok_or_else(|| PlayCallError::Parse(format!("unknown fold {:?}", field(4))))?,
                features,
                is_pass: parse(field(header.len() - 1), TARGET_COLUMN)?,
            });
        }

        log::info!("Read {} matrix rows from {}", rows.len(), path.display());
        Ok(ModelMatrix {
            feature_names,
            rows,
        })
    }

    /// Fold ranges implied by the row labels; folds must be contiguous and
    /// in train, validation, test order
    pub fn fold_split(&self) -> Result<FoldSplit> {
        let order = |fold: Fold| match fold {
            Fold::Train => 0,
            Fold::Validation => 1,
            Fold::Test => 2,
        };
        if let Some(pos) = self
            .rows
            .windows(2)
            .position(|w| order(w[1].fold) < order(w[0].fold))
        {
            return Err(PlayCallError::Parse(format!(
                "matrix folds out of order at row {}",
                pos + 1
            )));
        }
        let train_end = self.count(Fold::Train);
        FoldSplit::from_boundaries(
            train_end,
            train_end + self.count(Fold::Validation),
            self.rows.len(),
        )
    }

    /// Train/validation/test partitions for the model search
    pub fn partitions(&self) -> Result<SplitPartitions> {
        let split = self.fold_split()?;
        let features: Vec<Vec<f32>> = self.rows.iter().map(|r| r.features.clone()).collect();
        let targets: Vec<f32> = self.rows.iter().map(|r| r.is_pass).collect();
        SplitPartitions::from_split(self.feature_names.clone(), &features, &targets, &split)
    }
}
