//! Temporal feature extraction
//!
//! Running play-call tendencies per team. Every value at a play is computed
//! from that team's earlier plays only, so nothing about the current play
//! (its type or its yardage) can leak into its own features.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::features::frame::SeasonTable;
use crate::{PlayCallError, PlayRecord, PlayType, Result};

/// Cumulative counts for one team
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningTally {
    pub pass_count: u32,
    pub run_count: u32,
    pub pass_yards: f32,
    pub run_yards: f32,
}

impl RunningTally {
    pub fn record(&mut self, play_type: PlayType, yards: f32) {
        match play_type {
            PlayType::Pass => {
                self.pass_count += 1;
                self.pass_yards += yards;
            }
            PlayType::Run => {
                self.run_count += 1;
                self.run_yards += yards;
            }
        }
    }

    /// Mean yards per pass so far, 0 before the first pass
    pub fn pass_yards_mean(&self) -> f32 {
        if self.pass_count == 0 {
            0.0
        } else {
            self.pass_yards / self.pass_count as f32
        }
    }

    /// Mean yards per run so far, 0 before the first run
    pub fn run_yards_mean(&self) -> f32 {
        if self.run_count == 0 {
            0.0
        } else {
            self.run_yards / self.run_count as f32
        }
    }

    /// Passes over all play calls so far, 0 before the first play
    pub fn pass_ratio(&self) -> f32 {
        let total = self.pass_count + self.run_count;
        if total == 0 {
            0.0
        } else {
            self.pass_count as f32 / total as f32
        }
    }
}

/// Tendency features of one team at one play
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TendencyFeatures {
    pub pass_yards_mean: f32,
    pub run_yards_mean: f32,
    pub pass_ratio: f32,
}

impl TendencyFeatures {
    pub const DIM: usize = 3;
    pub const NAMES: [&'static str; Self::DIM] =
        ["pass_yards_mean", "run_yards_mean", "pass_ratio"];

    pub fn to_vec(&self) -> Vec<f32> {
        vec![self.pass_yards_mean, self.run_yards_mean, self.pass_ratio]
    }
}

impl From<&RunningTally> for TendencyFeatures {
    fn from(tally: &RunningTally) -> Self {
        TendencyFeatures {
            pass_yards_mean: tally.pass_yards_mean(),
            run_yards_mean: tally.run_yards_mean(),
            pass_ratio: tally.pass_ratio(),
        }
    }
}

/// Which team a sequence is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRole {
    /// Possessing team
    Offense,
    /// Defending team: the tendencies it has faced
    Defense,
}

impl TeamRole {
    pub const ALL: [TeamRole; 2] = [TeamRole::Offense, TeamRole::Defense];

    pub fn prefix(&self) -> &'static str {
        match self {
            TeamRole::Offense => "off",
            TeamRole::Defense => "def",
        }
    }

    pub fn team<'a>(&self, play: &'a PlayRecord) -> &'a str {
        match self {
            TeamRole::Offense => &play.posteam,
            TeamRole::Defense => &play.defteam,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        TendencyFeatures::NAMES
            .iter()
            .map(|name| format!("{}_{}", self.prefix(), name))
            .collect()
    }
}

type SequenceKey = (u8, NaiveDate, String, u32);

/// Ordered fold over plays with running tallies per team
pub struct TemporalAggregator {
    role: TeamRole,
    tallies: HashMap<String, RunningTally>,
    last_seen: HashMap<String, SequenceKey>,
}

impl TemporalAggregator {
    pub fn new(role: TeamRole) -> Self {
        TemporalAggregator {
            role,
            tallies: HashMap::new(),
            last_seen: HashMap::new(),
        }
    }

    /// Features for a play (call BEFORE updating state)
    pub fn compute(&self, play: &PlayRecord) -> TendencyFeatures {
        self.tallies
            .get(self.role.team(play))
            .map(TendencyFeatures::from)
            .unwrap_or_default()
    }

    /// Fold a play into its team's tally. Fails if the play does not come
    /// strictly after the team's previous play.
    pub fn update(&mut self, play: &PlayRecord) -> Result<()> {
        let team = self.role.team(play);
        let (week, date, game_id, play_id) = play.sequence_key();

        if let Some(prev) = self.last_seen.get(team) {
            let prev_key = (prev.0, prev.1, prev.2.as_str(), prev.3);
            if prev_key >= (week, date, game_id, play_id) {
                return Err(PlayCallError::OutOfOrder {
                    team: team.to_string(),
                    game_id: play.game_id.clone(),
                    play_id: play.play_id,
                });
            }
        }

        self.last_seen.insert(
            team.to_string(),
            (week, date, game_id.to_string(), play_id),
        );
        self.tallies
            .entry(team.to_string())
            .or_default()
            .record(play.play_type, play.yards_gained);
        Ok(())
    }

    pub fn n_teams(&self) -> usize {
        self.tallies.len()
    }
}

/// Compute lagged tendencies for every play and append them as columns
pub fn tendency_columns(plays: &[PlayRecord], role: TeamRole) -> Result<Vec<(String, Vec<f32>)>> {
    let mut aggregator = TemporalAggregator::new(role);
    let mut columns: Vec<Vec<f32>> = vec![Vec::with_capacity(plays.len()); TendencyFeatures::DIM];

    for play in plays {
        let features = aggregator.compute(play);
        aggregator.update(play)?;
        for (column, value) in columns.iter_mut().zip(features.to_vec()) {
            column.push(value);
        }
    }

    log::debug!(
        "{} tendencies computed over {} teams",
        role.prefix(),
        aggregator.n_teams()
    );
    Ok(role.column_names().into_iter().zip(columns).collect())
}

/// Append `off_*` and `def_*` tendency columns to the table
pub fn add_tendency_columns(table: &mut SeasonTable) -> Result<()> {
    for role in TeamRole::ALL {
        for (name, values) in tendency_columns(&table.plays, role)? {
            table.frame.push_column(name, values)?;
        }
    }
    log::info!(
        "Added {} tendency columns",
        TeamRole::ALL.len() * TendencyFeatures::DIM
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::make_play;

    fn column<'a>(columns: &'a [(String, Vec<f32>)], name: &str) -> &'a [f32] {
        &columns.iter().find(|(n, _)| n == name).unwrap().1
    }

    #[test]
    fn test_three_play_sequence() {
        let plays = vec![
            make_play("GB", "CHI", 1, PlayType::Pass, 10.0),
            make_play("GB", "CHI", 2, PlayType::Run, 5.0),
            make_play("GB", "CHI", 3, PlayType::Pass, 8.0),
        ];
        let columns = tendency_columns(&plays, TeamRole::Offense).unwrap();

        assert_eq!(column(&columns, "off_pass_yards_mean"), &[0.0, 10.0, 10.0]);
        assert_eq!(column(&columns, "off_run_yards_mean"), &[0.0, 0.0, 5.0]);
        assert_eq!(column(&columns, "off_pass_ratio"), &[0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_pass_ratio_counts_prior_plays_only() {
        let types = [
            PlayType::Run,
            PlayType::Pass,
            PlayType::Pass,
            PlayType::Run,
            PlayType::Pass,
        ];
        let plays: Vec<PlayRecord> = types
            .iter()
            .enumerate()
            .map(|(i, t)| make_play("KC", "LV", i as u32 + 1, *t, 4.0))
            .collect();
        let columns = tendency_columns(&plays, TeamRole::Offense).unwrap();
        let ratio = column(&columns, "off_pass_ratio");

        for i in 0..plays.len() {
            let passes = plays[..i].iter().filter(|p| p.is_pass()).count() as f32;
            let expected = if i == 0 { 0.0 } else { passes / i as f32 };
            assert!((ratio[i] - expected).abs() < 1e-6, "row {}", i);
        }
    }

    #[test]
    fn test_perturbing_a_play_only_affects_later_rows() {
        let make = || -> Vec<PlayRecord> {
            (1..=6)
                .map(|i| {
                    let t = if i % 2 == 0 { PlayType::Run } else { PlayType::Pass };
                    make_play("SEA", "SF", i, t, i as f32)
                })
                .collect()
        };
        let base = make();
        let mut perturbed = make();
        perturbed[2].yards_gained = 55.0;
        perturbed[2].play_type = PlayType::Run;

        for role in TeamRole::ALL {
            let a = tendency_columns(&base, role).unwrap();
            let b = tendency_columns(&perturbed, role).unwrap();
            for ((name, before), (_, after)) in a.iter().zip(&b) {
                assert_eq!(before[..=2], after[..=2], "{} leaked", name);
            }
            let changed = a
                .iter()
                .zip(&b)
                .any(|((_, before), (_, after))| before[3..] != after[3..]);
            assert!(changed);
        }
    }

    #[test]
    fn test_defense_grouping() {
        let mut plays = vec![
            make_play("GB", "CHI", 1, PlayType::Pass, 12.0),
            make_play("MIN", "CHI", 2, PlayType::Pass, 6.0),
            make_play("GB", "DET", 3, PlayType::Run, 2.0),
            make_play("DET", "CHI", 4, PlayType::Run, 1.0),
        ];
        plays[3].week = 2;
        let columns = tendency_columns(&plays, TeamRole::Defense).unwrap();

        // CHI faced two passes before play 4; DET had faced nothing at play 3
        assert_eq!(column(&columns, "def_pass_yards_mean"), &[0.0, 12.0, 0.0, 9.0]);
        assert_eq!(column(&columns, "def_pass_ratio"), &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_out_of_order_fails() {
        let plays = vec![
            make_play("GB", "CHI", 5, PlayType::Pass, 10.0),
            make_play("GB", "CHI", 4, PlayType::Run, 5.0),
        ];
        match tendency_columns(&plays, TeamRole::Offense).unwrap_err() {
            PlayCallError::OutOfOrder { team, play_id, .. } => {
                assert_eq!(team, "GB");
                assert_eq!(play_id, 4);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_add_tendency_columns() {
        let plays = vec![
            make_play("GB", "CHI", 1, PlayType::Pass, 10.0),
            make_play("CHI", "GB", 2, PlayType::Run, 5.0),
        ];
        let mut table = SeasonTable::new(plays);
        add_tendency_columns(&mut table).unwrap();
        assert_eq!(table.frame.n_columns(), 6);
        // GB defended after possessing; its defensive tally is still empty
        assert_eq!(table.frame.column("def_pass_ratio").unwrap(), &[0.0, 0.0]);
    }
}
