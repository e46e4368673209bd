//! Named column table aligned with a season's plays

use std::collections::HashMap;

use crate::{PlayCallError, PlayRecord, Result};

/// Column-major table of named `f32` features
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    names: Vec<String>,
    columns: Vec<Vec<f32>>,
    index: HashMap<String, usize>,
    n_rows: usize,
}

impl FeatureFrame {
    pub fn with_rows(n_rows: usize) -> Self {
        FeatureFrame {
            n_rows,
            ..Self::default()
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Append a column; names are unique and lengths must match
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f32>) -> Result<()> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(PlayCallError::Parse(format!(
                "column {} has {} rows, frame has {}",
                name,
                values.len(),
                self.n_rows
            )));
        }
        if self.index.contains_key(&name) {
            return Err(PlayCallError::Parse(format!("duplicate column {}", name)));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&[f32]> {
        self.index
            .get(name)
            .map(|&i| self.columns[i].as_slice())
            .ok_or_else(|| PlayCallError::MissingColumn(name.to_string()))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Vec<f32>> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.columns[i]),
            None => Err(PlayCallError::MissingColumn(name.to_string())),
        }
    }

    /// Keep rows where `keep` is true
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.n_rows);
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.retain(|_| *flags.next().unwrap_or(&false));
        }
        self.n_rows = keep.iter().filter(|k| **k).count();
    }

    /// Values of `names` at one row, in the given order
    pub fn row_values(&self, row: usize, names: &[String]) -> Result<Vec<f32>> {
        names
            .iter()
            .map(|name| self.column(name).map(|col| col[row]))
            .collect()
    }
}

/// Play records with their engineered features, row-aligned
#[derive(Debug, Clone)]
pub struct SeasonTable {
    pub plays: Vec<PlayRecord>,
    pub frame: FeatureFrame,
}

impl SeasonTable {
    pub fn new(plays: Vec<PlayRecord>) -> Self {
        let frame = FeatureFrame::with_rows(plays.len());
        SeasonTable { plays, frame }
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    /// Drop rows from plays and frame together
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.plays.retain(|_| *flags.next().unwrap_or(&false));
        self.frame.retain_rows(keep);
    }

    /// Binary target: 1.0 = pass
    pub fn targets(&self) -> Vec<f32> {
        self.plays.iter().map(|p| p.play_type.indicator()).collect()
    }

    pub fn weeks(&self) -> Vec<u8> {
        self.plays.iter().map(|p| p.week).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_lookup() {
        let mut frame = FeatureFrame::with_rows(3);
        frame.push_column("a", vec![1.0, 2.0, 3.0]).unwrap();
        frame.push_column("b", vec![4.0, 5.0, 6.0]).unwrap();
        assert_eq!(frame.column("b").unwrap(), &[4.0, 5.0, 6.0]);
        assert_eq!(
            frame.row_values(1, &["b".to_string(), "a".to_string()]).unwrap(),
            vec![5.0, 2.0]
        );
        assert!(matches!(
            frame.column("c"),
            Err(PlayCallError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_rejects_bad_columns() {
        let mut frame = FeatureFrame::with_rows(2);
        assert!(frame.push_column("a", vec![1.0]).is_err());
        frame.push_column("a", vec![1.0, 2.0]).unwrap();
        assert!(frame.push_column("a", vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_retain_rows() {
        let mut frame = FeatureFrame::with_rows(4);
        frame.push_column("a", vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        frame.retain_rows(&[false, true, false, true]);
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.column("a").unwrap(), &[2.0, 4.0]);
    }
}
