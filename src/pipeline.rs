//! Feature pipeline
//!
//! Runs the engineering stages in order over one season:
//! filter, weather defaults, encoding, team tendencies, lag window, fold
//! split, scaling and selection. Scaling and selection are fitted on the
//! training fold only.

use crate::data::extract::RawPlay;
use crate::data::matrix::{MatrixRow, ModelMatrix};
use crate::data::split::FoldSplit;
use crate::features::{
    add_lag_columns, add_tendency_columns, encode, fill_indoor_weather, filter_plays,
    ContinuousScaler, FeatureSelection, FilterSummary,
};
use crate::{Config, PlayCallError, Result};

/// Row counts through the stages
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSummary {
    pub filter: FilterSummary,
    pub weather_filled: usize,
    pub encoded_columns: usize,
    pub lag_dropped: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub matrix: ModelMatrix,
    pub selection: FeatureSelection,
    pub summary: PipelineSummary,
}

impl PipelineOutput {
    /// Write the matrix and the selection next to each other
    pub fn save(&self, config: &Config) -> Result<()> {
        self.matrix.write_csv(&config.matrix_path())?;
        self.selection.save(&config.selection_path())?;
        Ok(())
    }
}

pub struct FeaturePipeline<'a> {
    config: &'a Config,
}

impl<'a> FeaturePipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        FeaturePipeline { config }
    }

    pub fn run(&self, raw: Vec<RawPlay>) -> Result<PipelineOutput> {
        let features = &self.config.features;
        let split_config = &self.config.split;
        let mut summary = PipelineSummary::default();

        let (mut plays, filter) = filter_plays(raw)?;
        summary.filter = filter;
        if plays.is_empty() {
            return Err(PlayCallError::NoData(
                "no regular-season run/pass plays".to_string(),
            ));
        }

        let fill = fill_indoor_weather(&mut plays);
        summary.weather_filled = fill.temp_filled.max(fill.wind_filled);

        let mut table = encode(plays)?;
        add_tendency_columns(&mut table)?;
        summary.encoded_columns = table.frame.n_columns();
        summary.lag_dropped = add_lag_columns(&mut table, features.max_lag)?;

        let split = FoldSplit::by_week(
            &table.weeks(),
            split_config.train_through_week,
            split_config.validation_through_week,
        )?;
        summary.train_rows = split.train.len();
        summary.validation_rows = split.validation.len();
        summary.test_rows = split.test.len();

        let scaler = ContinuousScaler::fit(&table.frame, &features.continuous, split.train.clone())?;
        scaler.transform(&mut table.frame)?;

        let targets = table.targets();
        let selection = FeatureSelection::fit(
            &table.frame,
            &targets,
            split.train.clone(),
            features.top_k,
            scaler,
        )?;

        let mut rows = Vec::with_capacity(table.len());
        for (i, play) in table.plays.iter().enumerate() {
            let fold = split
                .fold_of(i)
                .ok_or(PlayCallError::SplitOutOfRange {
                    boundary: i,
                    rows: split.rows(),
                })?;
            rows.push(MatrixRow {
                game_id: play.game_id.clone(),
                play_id: play.play_id,
                week: play.week,
                posteam: play.posteam.clone(),
                fold,
                features: selection.row(&table.frame, i)?,
                is_pass: targets[i],
            });
        }

        let matrix = ModelMatrix {
            feature_names: selection.names.clone(),
            rows,
        };
        log::info!(
            "Feature pipeline: {} rows (train {}, validation {}, test {}), {} of {} features selected",
            matrix.len(),
            summary.train_rows,
            summary.validation_rows,
            summary.test_rows,
            selection.names.len(),
            selection.candidates
        );

        Ok(PipelineOutput {
            matrix,
            selection,
            summary,
        })
    }
}
