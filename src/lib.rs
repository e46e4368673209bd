//! Run/pass play-call prediction from NFL play-by-play data
//!
//! Turns one season of play-by-play records into a causal feature matrix and
//! compares baseline classifiers on a fixed, time-ordered split.

pub mod data;
pub mod features;
pub mod pipeline;
pub mod training;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Observed play call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayType {
    Pass,
    Run,
}

impl PlayType {
    /// Parse the source's `play_type` value. Anything other than a run or a
    /// pass (kickoffs, punts, kneels, no-plays, ...) is not a play call.
    pub fn from_source(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pass" => Some(PlayType::Pass),
            "run" => Some(PlayType::Run),
            _ => None,
        }
    }

    /// 1.0 for a pass, 0.0 for a run
    pub fn indicator(&self) -> f32 {
        match self {
            PlayType::Pass => 1.0,
            PlayType::Run => 0.0,
        }
    }
}

impl fmt::Display for PlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayType::Pass => write!(f, "pass"),
            PlayType::Run => write!(f, "run"),
        }
    }
}

/// Stadium roof type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Roof {
    Dome,
    Outdoors,
    Closed,
    Open,
}

impl Roof {
    pub const ALL: [Roof; 4] = [Roof::Dome, Roof::Outdoors, Roof::Closed, Roof::Open];

    pub fn from_source(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dome" => Some(Roof::Dome),
            "outdoors" => Some(Roof::Outdoors),
            "closed" => Some(Roof::Closed),
            "open" => Some(Roof::Open),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Roof::Dome => "dome",
            Roof::Outdoors => "outdoors",
            Roof::Closed => "closed",
            Roof::Open => "open",
        }
    }

    /// Played with the weather shut out
    pub fn is_indoor(&self) -> bool {
        matches!(self, Roof::Dome | Roof::Closed)
    }
}

/// Half of the game a play belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameHalf {
    First,
    Second,
    Overtime,
}

impl GameHalf {
    pub const ALL: [GameHalf; 3] = [GameHalf::First, GameHalf::Second, GameHalf::Overtime];

    pub fn from_source(value: &str) -> Option<Self> {
        match value.trim() {
            "Half1" => Some(GameHalf::First),
            "Half2" => Some(GameHalf::Second),
            "Overtime" => Some(GameHalf::Overtime),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GameHalf::First => "1",
            GameHalf::Second => "2",
            GameHalf::Overtime => "ot",
        }
    }
}

/// A regular-season run or pass play, projected to pre-snap columns plus the
/// observed outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRecord {
    pub game_id: String,
    pub play_id: u32,
    pub week: u8,
    pub game_date: NaiveDate,
    /// Possessing team
    pub posteam: String,
    /// Defending team
    pub defteam: String,
    pub qtr: u8,
    pub down: u8,
    pub ydstogo: f32,
    /// Distance to the opponent's end zone
    pub yardline_100: f32,
    pub game_seconds_remaining: f32,
    pub half_seconds_remaining: f32,
    pub game_half: GameHalf,
    /// Possessing team score minus defending team score
    pub score_differential: f32,
    pub shotgun: bool,
    pub no_huddle: bool,
    pub posteam_timeouts_remaining: f32,
    pub defteam_timeouts_remaining: f32,
    pub roof: Roof,
    pub temp: Option<f32>,
    pub wind: Option<f32>,
    /// Target
    pub play_type: PlayType,
    pub yards_gained: f32,
}

impl PlayRecord {
    /// Chronological sort key within a season
    pub fn sequence_key(&self) -> (u8, NaiveDate, &str, u32) {
        (self.week, self.game_date, self.game_id.as_str(), self.play_id)
    }

    pub fn is_pass(&self) -> bool {
        self.play_type == PlayType::Pass
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum PlayCallError {
    #[error("Missing input column: {0}")]
    MissingColumn(String),

    #[error("Missing value for {column} in game {game_id}, play {play_id}")]
    MissingValue {
        column: String,
        game_id: String,
        play_id: u32,
    },

    #[error("Plays for {team} are out of chronological order at game {game_id}, play {play_id}")]
    OutOfOrder {
        team: String,
        game_id: String,
        play_id: u32,
    },

    #[error("Fold boundary {boundary} exceeds available rows ({rows})")]
    SplitOutOfRange { boundary: usize, rows: usize },

    #[error("Feature mismatch: selection has [{expected}], matrix has [{found}]")]
    FeatureMismatch { expected: String, found: String },

    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlayCallError>;

/// Where the run reads and writes files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Local,
    Cluster,
}

/// Application configuration loaded from playcall.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub paths: PathsConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub season: u16,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub local: PathSet,
    pub cluster: PathSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSet {
    pub data_dir: String,
    pub output_dir: String,
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Columns standardized and min-max normalized before selection
    pub continuous: Vec<String>,
    /// Number of previous play calls appended per row
    pub max_lag: usize,
    /// Number of features kept by mutual information
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Last week (inclusive) of the training fold
    pub train_through_week: u8,
    /// Last week (inclusive) of the validation fold; later weeks are test
    pub validation_through_week: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub strategy: String,
    /// Trials per model family
    pub budget: usize,
    pub workers: usize,
    pub overwrite: bool,
    pub logistic: LogisticSpace,
    pub gbdt: GbdtSpace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticSpace {
    pub learning_rate: Vec<f64>,
    pub epochs: Vec<usize>,
    pub l2: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtSpace {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub subsample: Vec<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            run: RunConfig {
                mode: RunMode::Local,
                season: 2019,
                seed: 42,
            },
            paths: PathsConfig {
                local: PathSet {
                    data_dir: "data".to_string(),
                    output_dir: "output".to_string(),
                    database_path: "data/playcall.db".to_string(),
                },
                cluster: PathSet {
                    data_dir: "/shared/playcall/data".to_string(),
                    output_dir: "/shared/playcall/output".to_string(),
                    database_path: "/shared/playcall/data/playcall.db".to_string(),
                },
            },
            features: FeatureConfig {
                continuous: [
                    "ydstogo",
                    "yardline_100",
                    "game_seconds_remaining",
                    "half_seconds_remaining",
                    "score_differential",
                    "temp",
                    "wind",
                    "off_pass_yards_mean",
                    "off_run_yards_mean",
                    "def_pass_yards_mean",
                    "def_run_yards_mean",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                max_lag: 5,
                top_k: 30,
            },
            split: SplitConfig {
                train_through_week: 13,
                validation_through_week: 15,
            },
            search: SearchConfig {
                strategy: "random".to_string(),
                budget: 20,
                workers: 4,
                overwrite: false,
                logistic: LogisticSpace {
                    learning_rate: vec![0.01, 0.05, 0.1, 0.5],
                    epochs: vec![100, 200, 400],
                    l2: vec![0.0, 1e-4, 1e-3, 1e-2],
                },
                gbdt: GbdtSpace {
                    n_estimators: vec![50, 100, 200],
                    learning_rate: vec![0.05, 0.1, 0.2],
                    max_depth: vec![2, 3, 4],
                    min_samples_leaf: vec![5, 20, 50],
                    subsample: vec![0.7, 1.0],
                },
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlayCallError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PlayCallError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PlayCallError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path set for the configured run mode
    pub fn paths(&self) -> &PathSet {
        match self.run.mode {
            RunMode::Local => &self.paths.local,
            RunMode::Cluster => &self.paths.cluster,
        }
    }

    pub fn extract_path(&self) -> PathBuf {
        PathBuf::from(&self.paths().data_dir)
            .join(format!("play_by_play_{}.csv", self.run.season))
    }

    pub fn matrix_path(&self) -> PathBuf {
        PathBuf::from(&self.paths().output_dir).join(format!("features_{}.csv", self.run.season))
    }

    pub fn selection_path(&self) -> PathBuf {
        PathBuf::from(&self.paths().output_dir).join(format!("selection_{}.json", self.run.season))
    }

    pub fn trials_path(&self) -> PathBuf {
        PathBuf::from(&self.paths().output_dir).join(format!("trials_{}.jsonl", self.run.season))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.features.max_lag, 5);
        assert_eq!(parsed.run.mode, RunMode::Local);
        assert_eq!(parsed.search.gbdt.max_depth, vec![2, 3, 4]);
    }

    #[test]
    fn test_run_mode_selects_paths() {
        let mut config = Config::default();
        assert_eq!(config.paths().output_dir, "output");
        config.run.mode = RunMode::Cluster;
        assert!(config.matrix_path().starts_with("/shared/playcall/output"));
        assert!(config
            .trials_path()
            .to_string_lossy()
            .ends_with("trials_2019.jsonl"));
    }

    #[test]
    fn test_play_type_parsing() {
        assert_eq!(PlayType::from_source("pass"), Some(PlayType::Pass));
        assert_eq!(PlayType::from_source("run"), Some(PlayType::Run));
        assert_eq!(PlayType::from_source("punt"), None);
        assert_eq!(PlayType::from_source("qb_kneel"), None);
        assert_eq!(PlayType::Pass.indicator(), 1.0);
    }

    #[test]
    fn test_roof_indoor() {
        assert!(Roof::Dome.is_indoor());
        assert!(Roof::Closed.is_indoor());
        assert!(!Roof::Outdoors.is_indoor());
        assert!(!Roof::Open.is_indoor());
    }
}
