//! Trial results log
//!
//! JSON lines, one record per completed trial, appended and flushed as each
//! trial finishes. Reopening the log without `overwrite` loads the earlier
//! records so finished trials are not repeated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::training::search::Hyperparams;
use crate::{PlayCallError, Result};

/// One evaluated hyperparameter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub family: String,
    /// Fingerprint of the partitions the trial was scored on
    #[serde(default)]
    pub matrix: String,
    /// Position in the strategy's proposal order
    pub trial: usize,
    pub params: Hyperparams,
    pub train_accuracy: f64,
    pub validation_accuracy: f64,
    pub validation_log_loss: f64,
    pub elapsed_secs: f64,
    pub completed_at: DateTime<Utc>,
}

struct LogState {
    file: File,
    records: Vec<TrialRecord>,
}

pub struct TrialLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl TrialLog {
    /// Open for appending; `overwrite` truncates earlier results
    pub fn open(path: &Path, overwrite: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if overwrite {
            File::create(path)?;
            log::info!("Truncated trial log {}", path.display());
        }

        let records = if path.exists() {
            Self::read_records(path)?
        } else {
            Vec::new()
        };
        if !records.is_empty() {
            log::info!(
                "Loaded {} earlier trials from {}",
                records.len(),
                path.display()
            );
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(TrialLog {
            path: path.to_path_buf(),
            state: Mutex::new(LogState { file, records }),
        })
    }

    fn read_records(path: &Path) -> Result<Vec<TrialRecord>> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| {
                PlayCallError::Parse(format!("{} line {}: {}", path.display(), number + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record and flush it to disk
    pub fn append(&self, record: &TrialRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut state = self.lock();
        writeln!(state.file, "{}", line)?;
        state.file.flush()?;
        state.records.push(record.clone());
        Ok(())
    }

    /// Whether a trial of `family` with `params` was scored on `matrix`
    pub fn contains(&self, family: &str, matrix: &str, params: &Hyperparams) -> bool {
        self.lock()
            .records
            .iter()
            .any(|r| r.family == family && r.matrix == matrix && &r.params == params)
    }

    pub fn records_for(&self, family: &str) -> Vec<TrialRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.family == family)
            .cloned()
            .collect()
    }

    pub fn records(&self) -> Vec<TrialRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::search::ParamValue;

    fn record(family: &str, trial: usize, lr: f64) -> TrialRecord {
        TrialRecord {
            family: family.to_string(),
            matrix: "abc".to_string(),
            trial,
            params: Hyperparams::new()
                .with("learning_rate", ParamValue::Float(lr))
                .with("epochs", ParamValue::Int(100)),
            train_accuracy: 0.7,
            validation_accuracy: 0.65,
            validation_log_loss: 0.61,
            elapsed_secs: 0.5,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("trials_2019.jsonl");

        let log = TrialLog::open(&path, false).unwrap();
        assert!(log.is_empty());
        log.append(&record("logistic", 0, 0.1)).unwrap();
        log.append(&record("gbdt", 0, 0.1)).unwrap();
        drop(log);

        let log = TrialLog::open(&path, false).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains("logistic", "abc", &record("logistic", 5, 0.1).params));
        assert!(!log.contains("logistic", "abc", &record("logistic", 0, 0.5).params));
        assert!(!log.contains("logistic", "def", &record("logistic", 0, 0.1).params));
        assert_eq!(log.records_for("gbdt").len(), 1);
        let records = log.records();
        let first = &records[0];
        assert_eq!(first.family, "logistic");
        assert_eq!(first.params, record("logistic", 0, 0.1).params);
    }

    #[test]
    fn test_record_without_matrix_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.jsonl");
        let mut value = serde_json::to_value(record("gbdt", 0, 0.1)).unwrap();
        value.as_object_mut().unwrap().remove("matrix");
        std::fs::write(&path, format!("{}\n", value)).unwrap();

        let log = TrialLog::open(&path, false).unwrap();
        assert_eq!(log.records()[0].matrix, "");
        assert!(!log.contains("gbdt", "abc", &record("gbdt", 0, 0.1).params));
    }

    #[test]
    fn test_overwrite_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.jsonl");
        TrialLog::open(&path, false)
            .unwrap()
            .append(&record("logistic", 0, 0.1))
            .unwrap();

        let log = TrialLog::open(&path, true).unwrap();
        assert!(log.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_malformed_line_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        assert!(matches!(
            TrialLog::open(&path, false),
            Err(PlayCallError::Parse(_))
        ));
    }
}
