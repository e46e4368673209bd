//! Hyperparameter search over model families
//!
//! A strategy proposes points of a discrete search space, each family fits
//! a classifier per point on the training partition, and trials are scored
//! by validation accuracy. Trials run on a bounded rayon pool and are logged
//! as they finish, so an interrupted search resumes where it stopped.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use crate::data::dataset::{Partition, SplitPartitions};
use crate::training::metrics::Metrics;
use crate::training::trials::{TrialLog, TrialRecord};
use crate::{PlayCallError, Result, SearchConfig};

/// One hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(usize),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Realized hyperparameters of one trial, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparams(BTreeMap<String, ParamValue>);

impl Hyperparams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.0.get(name).copied()
    }

    /// Real-valued parameter; integers are widened
    pub fn float(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(ParamValue::Float(v)) => Ok(v),
            Some(ParamValue::Int(v)) => Ok(v as f64),
            None => Err(PlayCallError::InvalidHyperparameter(format!(
                "missing {}",
                name
            ))),
        }
    }

    /// Integer parameter
    pub fn count(&self, name: &str) -> Result<usize> {
        match self.get(name) {
            Some(ParamValue::Int(v)) => Ok(v),
            Some(ParamValue::Float(v)) => Err(PlayCallError::InvalidHyperparameter(format!(
                "{} must be an integer, got {}",
                name, v
            ))),
            None => Err(PlayCallError::InvalidHyperparameter(format!(
                "missing {}",
                name
            ))),
        }
    }
}

impl fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Cartesian grid of discrete hyperparameter values
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    pub family: String,
    pub dimensions: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new(family: &str) -> Self {
        SearchSpace {
            family: family.to_string(),
            dimensions: Vec::new(),
        }
    }

    pub fn dimension(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.dimensions.push(Dimension {
            name: name.to_string(),
            values,
        });
        self
    }

    pub fn floats(self, name: &str, values: &[f64]) -> Self {
        self.dimension(name, values.iter().map(|v| ParamValue::Float(*v)).collect())
    }

    pub fn ints(self, name: &str, values: &[usize]) -> Self {
        self.dimension(name, values.iter().map(|v| ParamValue::Int(*v)).collect())
    }

    /// Every dimension needs at least one value
    pub fn validate(&self) -> Result<()> {
        match self.dimensions.iter().find(|d| d.values.is_empty()) {
            Some(dim) => Err(PlayCallError::InvalidHyperparameter(format!(
                "{} search space has no values for {}",
                self.family, dim.name
            ))),
            None => Ok(()),
        }
    }

    /// Number of grid points
    pub fn size(&self) -> usize {
        self.dimensions.iter().map(|d| d.values.len()).product()
    }

    /// Grid point by index; the last dimension varies fastest
    pub fn point(&self, index: usize) -> Hyperparams {
        let mut rest = index;
        let mut params = Hyperparams::new();
        for dim in self.dimensions.iter().rev() {
            let n = dim.values.len().max(1);
            if let Some(value) = dim.values.get(rest % n) {
                params = params.with(&dim.name, *value);
            }
            rest /= n;
        }
        params
    }
}

/// Proposes the points a search evaluates
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// At most `budget` distinct points, in evaluation order
    fn propose(&self, space: &SearchSpace, budget: usize) -> Vec<Hyperparams>;
}

/// Uniform sampling of grid points without replacement from a seeded RNG
pub struct RandomSearch {
    seed: u64,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        RandomSearch { seed }
    }
}

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &'static str {
        "random"
    }

    fn propose(&self, space: &SearchSpace, budget: usize) -> Vec<Hyperparams> {
        let size = space.size();
        let mut rng = StdRng::seed_from_u64(self.seed);
        rand::seq::index::sample(&mut rng, size, budget.min(size))
            .into_iter()
            .map(|i| space.point(i))
            .collect()
    }
}

/// Grid points in order, truncated to the budget
pub struct GridSearch;

impl SearchStrategy for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn propose(&self, space: &SearchSpace, budget: usize) -> Vec<Hyperparams> {
        (0..space.size().min(budget)).map(|i| space.point(i)).collect()
    }
}

pub fn strategy_from_name(name: &str, seed: u64) -> Result<Box<dyn SearchStrategy>> {
    match name {
        "random" => Ok(Box::new(RandomSearch::new(seed))),
        "grid" => Ok(Box::new(GridSearch)),
        other => Err(PlayCallError::Config(format!(
            "unknown search strategy {:?} (expected random or grid)",
            other
        ))),
    }
}

/// A trained model producing pass probabilities
pub trait Classifier: Send {
    fn predict_proba(&self, data: &Partition) -> Vec<f32>;
}

pub fn evaluate(classifier: &dyn Classifier, data: &Partition) -> Metrics {
    Metrics::from_predictions(&classifier.predict_proba(data), &data.targets)
}

/// A family of classifiers sharing a hyperparameter space
pub trait ModelFamily: Send + Sync {
    fn name(&self) -> &'static str;

    fn space(&self, config: &SearchConfig) -> SearchSpace;

    fn fit(&self, params: &Hyperparams, train: &Partition) -> Result<Box<dyn Classifier>>;
}

/// Outcome of searching one family
#[derive(Debug, Clone)]
pub struct FamilyReport {
    pub family: String,
    pub trials_run: usize,
    pub trials_skipped: usize,
    /// Trials of this search, best validation accuracy first
    pub ranked: Vec<TrialRecord>,
    /// Best configuration refit on train, scored on test
    pub test: Metrics,
}

impl FamilyReport {
    pub fn best(&self) -> Option<&TrialRecord> {
        self.ranked.first()
    }
}

/// Order trials by validation accuracy, then by trial number
pub fn rank_trials(records: &mut [TrialRecord]) {
    records.sort_by(|a, b| {
        b.validation_accuracy
            .partial_cmp(&a.validation_accuracy)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.trial.cmp(&b.trial))
    });
}

pub struct ModelSearch {
    config: SearchConfig,
    strategy: Box<dyn SearchStrategy>,
    pool: rayon::ThreadPool,
    log: TrialLog,
}

impl ModelSearch {
    pub fn new(config: &SearchConfig, seed: u64, log: TrialLog) -> Result<Self> {
        let strategy = strategy_from_name(&config.strategy, seed)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .build()
            .map_err(|e| PlayCallError::Config(format!("Failed to build worker pool: {}", e)))?;

        Ok(ModelSearch {
            config: config.clone(),
            strategy,
            pool,
            log,
        })
    }

    pub fn log(&self) -> &TrialLog {
        &self.log
    }

    /// Search one family and report its best configuration
    pub fn run(&self, family: &dyn ModelFamily, data: &SplitPartitions) -> Result<FamilyReport> {
        for (fold, part) in [("train", &data.train), ("validation", &data.validation)] {
            if part.is_empty() {
                return Err(PlayCallError::NoData(format!(
                    "cannot search {} with an empty {} partition",
                    family.name(),
                    fold
                )));
            }
        }
        let space = family.space(&self.config);
        space.validate()?;
        let proposals = self.strategy.propose(&space, self.config.budget);
        let matrix = data.fingerprint();

        let pending: Vec<(usize, &Hyperparams)> = proposals
            .iter()
            .enumerate()
            .filter(|(_, params)| !self.log.contains(family.name(), &matrix, params))
            .collect();
        let skipped = proposals.len() - pending.len();

        log::info!(
            "{} search ({}): {} of {} grid points proposed, {} already logged, {} workers",
            family.name(),
            self.strategy.name(),
            proposals.len(),
            space.size(),
            skipped,
            self.config.workers.max(1)
        );

        self.pool.install(|| {
            pending
                .par_iter()
                .map(|(trial, params)| {
                    let record = run_trial(family, *trial, params, data, &matrix)?;
                    self.log.append(&record)?;
                    log::info!(
                        "  {} trial {}: {} -> train {:.2}%, validation {:.2}%",
                        record.family,
                        record.trial,
                        record.params,
                        record.train_accuracy * 100.0,
                        record.validation_accuracy * 100.0
                    );
                    Ok(())
                })
                .collect::<Result<Vec<()>>>()
        })?;

        let mut ranked: Vec<TrialRecord> = self
            .log
            .records_for(family.name())
            .into_iter()
            .filter(|r| r.matrix == matrix && proposals.contains(&r.params))
            .collect();
        rank_trials(&mut ranked);

        let best = ranked.first().ok_or_else(|| {
            PlayCallError::NoData(format!("no {} trials were evaluated", family.name()))
        })?;

        let model = family.fit(&best.params, &data.train)?;
        let test = evaluate(model.as_ref(), &data.test);
        log::info!(
            "{} best: {} (validation {:.2}%) -> test {}",
            family.name(),
            best.params,
            best.validation_accuracy * 100.0,
            test
        );

        Ok(FamilyReport {
            family: family.name().to_string(),
            trials_run: pending.len(),
            trials_skipped: skipped,
            ranked,
            test,
        })
    }
}

fn run_trial(
    family: &dyn ModelFamily,
    trial: usize,
    params: &Hyperparams,
    data: &SplitPartitions,
    matrix: &str,
) -> Result<TrialRecord> {
    let start = Instant::now();
    let model = family.fit(params, &data.train)?;
    let train = evaluate(model.as_ref(), &data.train);
    let validation = evaluate(model.as_ref(), &data.validation);

    Ok(TrialRecord {
        family: family.name().to_string(),
        matrix: matrix.to_string(),
        trial,
        params: params.clone(),
        train_accuracy: train.accuracy(),
        validation_accuracy: validation.accuracy(),
        validation_log_loss: validation.log_loss(),
        elapsed_secs: start.elapsed().as_secs_f64(),
        completed_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn space() -> SearchSpace {
        SearchSpace::new("toy")
            .floats("learning_rate", &[0.01, 0.1, 1.0])
            .ints("depth", &[1, 2, 3, 4])
    }

    #[test]
    fn test_grid_points() {
        let space = space();
        assert_eq!(space.size(), 12);
        let first = space.point(0);
        assert_eq!(first.float("learning_rate").unwrap(), 0.01);
        assert_eq!(first.count("depth").unwrap(), 1);
        let fifth = space.point(5);
        assert_eq!(fifth.float("learning_rate").unwrap(), 0.1);
        assert_eq!(fifth.count("depth").unwrap(), 2);

        let all: HashSet<String> = (0..12).map(|i| space.point(i).to_string()).collect();
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn test_random_search_is_seeded_and_without_replacement() {
        let space = space();
        let a = RandomSearch::new(7).propose(&space, 8);
        let b = RandomSearch::new(7).propose(&space, 8);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);

        let distinct: HashSet<String> = a.iter().map(|p| p.to_string()).collect();
        assert_eq!(distinct.len(), 8);

        // Budget larger than the grid covers it exactly once
        assert_eq!(RandomSearch::new(7).propose(&space, 100).len(), 12);
    }

    #[test]
    fn test_grid_search_order() {
        let points = GridSearch.propose(&space(), 3);
        assert_eq!(points, vec![space().point(0), space().point(1), space().point(2)]);
    }

    #[test]
    fn test_empty_dimension_rejected() {
        let space = SearchSpace::new("toy").floats("learning_rate", &[]);
        assert!(matches!(
            space.validate(),
            Err(PlayCallError::InvalidHyperparameter(_))
        ));
        assert!(strategy_from_name("bayes", 1).is_err());
    }

    #[test]
    fn test_hyperparams_json() {
        let params = Hyperparams::new()
            .with("l2", ParamValue::Float(0.0))
            .with("epochs", ParamValue::Int(200));
        let json = serde_json::to_string(&params).unwrap();
        let parsed: Hyperparams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
        assert!(parsed.count("l2").is_err());
    }

    /// Same probability for every row
    struct ConstantModel(f32);

    impl Classifier for ConstantModel {
        fn predict_proba(&self, data: &Partition) -> Vec<f32> {
            vec![self.0; data.len()]
        }
    }

    /// Predicts the training pass rate, shifted by `bias`
    struct ConstantFamily {
        fits: AtomicUsize,
    }

    impl ModelFamily for ConstantFamily {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn space(&self, _config: &SearchConfig) -> SearchSpace {
            SearchSpace::new("constant").floats("bias", &[-0.4, -0.1, 0.1, 0.4])
        }

        fn fit(&self, params: &Hyperparams, train: &Partition) -> Result<Box<dyn Classifier>> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            let p = train.pass_rate() + params.float("bias")? as f32;
            Ok(Box::new(ConstantModel(p)))
        }
    }

    fn partitions() -> SplitPartitions {
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32]).collect();
        let targets = [1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        let split = crate::data::split::FoldSplit::from_boundaries(6, 8, 10).unwrap();
        SplitPartitions::from_split(vec!["x".to_string()], &rows, &targets, &split).unwrap()
    }

    fn search_config(budget: usize) -> SearchConfig {
        let mut config = crate::Config::default().search;
        config.budget = budget;
        config.workers = 2;
        config
    }

    #[test]
    fn test_search_resumes_from_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.jsonl");
        let data = partitions();
        let family = ConstantFamily {
            fits: AtomicUsize::new(0),
        };

        let search = ModelSearch::new(&search_config(4), 3, TrialLog::open(&path, false).unwrap())
            .unwrap();
        let report = search.run(&family, &data).unwrap();
        assert_eq!(report.trials_run, 4);
        assert_eq!(report.ranked.len(), 4);
        // Pass rate 5/6; any negative-enough bias flips to run and loses
        assert!(report.best().unwrap().validation_accuracy >= 0.5);
        assert_eq!(family.fits.load(Ordering::SeqCst), 5);

        // Second run finds every trial logged and only refits the best
        let search = ModelSearch::new(&search_config(4), 3, TrialLog::open(&path, false).unwrap())
            .unwrap();
        let resumed = search.run(&family, &data).unwrap();
        assert_eq!(resumed.trials_run, 0);
        assert_eq!(resumed.trials_skipped, 4);
        assert_eq!(family.fits.load(Ordering::SeqCst), 6);
        assert_eq!(
            resumed.best().unwrap().params,
            report.best().unwrap().params
        );

        // Overwrite starts over
        let search = ModelSearch::new(&search_config(4), 3, TrialLog::open(&path, true).unwrap())
            .unwrap();
        assert_eq!(search.run(&family, &data).unwrap().trials_run, 4);
    }

    #[test]
    fn test_changed_matrix_reruns_logged_trials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.jsonl");
        let family = ConstantFamily {
            fits: AtomicUsize::new(0),
        };

        let search = ModelSearch::new(&search_config(4), 3, TrialLog::open(&path, false).unwrap())
            .unwrap();
        search.run(&family, &partitions()).unwrap();

        let mut rebuilt = partitions();
        rebuilt.feature_names = vec!["prev_play_1".to_string()];
        let search = ModelSearch::new(&search_config(4), 3, TrialLog::open(&path, false).unwrap())
            .unwrap();
        let report = search.run(&family, &rebuilt).unwrap();
        assert_eq!(report.trials_run, 4);
        assert_eq!(report.trials_skipped, 0);
        assert_eq!(report.ranked.len(), 4);
        assert!(report
            .ranked
            .iter()
            .all(|r| r.matrix == rebuilt.fingerprint()));
        assert_eq!(search.log().len(), 8);
    }

    #[test]
    fn test_empty_validation_partition_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = partitions();
        data.validation = Partition::default();
        let family = ConstantFamily {
            fits: AtomicUsize::new(0),
        };

        let search = ModelSearch::new(
            &search_config(4),
            3,
            TrialLog::open(&dir.path().join("trials.jsonl"), false).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            search.run(&family, &data),
            Err(PlayCallError::NoData(_))
        ));
        assert_eq!(family.fits.load(Ordering::SeqCst), 0);
        assert!(search.log().is_empty());
    }

    #[test]
    fn test_ranking_prefers_accuracy_then_trial() {
        let record = |trial: usize, acc: f64| TrialRecord {
            family: "constant".to_string(),
            matrix: String::new(),
            trial,
            params: Hyperparams::new().with("bias", ParamValue::Int(trial)),
            train_accuracy: 0.0,
            validation_accuracy: acc,
            validation_log_loss: 0.0,
            elapsed_secs: 0.0,
            completed_at: chrono::Utc::now(),
        };
        let mut records = vec![record(0, 0.6), record(1, 0.7), record(2, 0.7)];
        rank_trials(&mut records);
        let order: Vec<usize> = records.iter().map(|r| r.trial).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
