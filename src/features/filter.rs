//! Row/column filter
//!
//! Keeps regular-season run and pass plays, projects them to pre-snap
//! columns, and orders them chronologically.

use crate::data::extract::RawPlay;
use crate::{GameHalf, PlayCallError, PlayRecord, PlayType, Result, Roof};

const REGULAR_SEASON: &str = "REG";

/// Counts of what the filter dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub input: usize,
    pub not_regular_season: usize,
    pub not_play_call: usize,
    pub no_down: usize,
    pub kept: usize,
}

/// Filter and project raw plays
pub fn filter_plays(raw: Vec<RawPlay>) -> Result<(Vec<PlayRecord>, FilterSummary)> {
    let mut summary = FilterSummary {
        input: raw.len(),
        ..FilterSummary::default()
    };
    let mut plays = Vec::new();

    for play in raw {
        if play.season_type != REGULAR_SEASON {
            summary.not_regular_season += 1;
            continue;
        }
        let Some(play_type) = play.play_type.as_deref().and_then(PlayType::from_source) else {
            summary.not_play_call += 1;
            continue;
        };
        // Two-point tries are run/pass plays without a down
        let Some(down) = play.down else {
            summary.no_down += 1;
            continue;
        };

        plays.push(project(play, play_type, down)?);
    }

    plays.sort_by(|a, b| a.sequence_key().cmp(&b.sequence_key()));
    summary.kept = plays.len();

    log::info!(
        "Filter kept {} of {} plays (dropped: {} non-regular-season, {} special teams/administrative, {} without a down)",
        summary.kept,
        summary.input,
        summary.not_regular_season,
        summary.not_play_call,
        summary.no_down
    );
    Ok((plays, summary))
}

/// Projection of a retained play. Every pre-snap column is required except
/// weather, which the normalizer handles.
fn project(play: RawPlay, play_type: PlayType, down: u8) -> Result<PlayRecord> {
    let missing = |column: &str| PlayCallError::MissingValue {
        column: column.to_string(),
        game_id: play.game_id.clone(),
        play_id: play.play_id,
    };

    let game_half_text = play.game_half.as_deref().ok_or_else(|| missing("game_half"))?;
    let game_half = GameHalf::from_source(game_half_text).ok_or_else(|| {
        PlayCallError::Parse(format!(
            "game {} play {}: unknown game_half {:?}",
            play.game_id, play.play_id, game_half_text
        ))
    })?;
    let roof_text = play.roof.as_deref().ok_or_else(|| missing("roof"))?;
    let roof = Roof::from_source(roof_text).ok_or_else(|| {
        PlayCallError::Parse(format!(
            "game {} play {}: unknown roof {:?}",
            play.game_id, play.play_id, roof_text
        ))
    })?;

    Ok(PlayRecord {
        posteam: play.posteam.clone().ok_or_else(|| missing("posteam"))?,
        defteam: play.defteam.clone().ok_or_else(|| missing("defteam"))?,
        qtr: play.qtr.ok_or_else(|| missing("qtr"))?,
        down,
        ydstogo: play.ydstogo.ok_or_else(|| missing("ydstogo"))?,
        yardline_100: play.yardline_100.ok_or_else(|| missing("yardline_100"))?,
        game_seconds_remaining: play
            .game_seconds_remaining
            .ok_or_else(|| missing("game_seconds_remaining"))?,
        half_seconds_remaining: play
            .half_seconds_remaining
            .ok_or_else(|| missing("half_seconds_remaining"))?,
        game_half,
        score_differential: play
            .score_differential
            .ok_or_else(|| missing("score_differential"))?,
        shotgun: play.shotgun.ok_or_else(|| missing("shotgun"))? == 1,
        no_huddle: play.no_huddle.ok_or_else(|| missing("no_huddle"))? == 1,
        posteam_timeouts_remaining: play
            .posteam_timeouts_remaining
            .ok_or_else(|| missing("posteam_timeouts_remaining"))?,
        defteam_timeouts_remaining: play
            .defteam_timeouts_remaining
            .ok_or_else(|| missing("defteam_timeouts_remaining"))?,
        roof,
        temp: play.temp,
        wind: play.wind,
        play_type,
        yards_gained: play.yards_gained.ok_or_else(|| missing("yards_gained"))?,
        week: play.week,
        game_date: play.game_date,
        play_id: play.play_id,
        game_id: play.game_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::read_extract;
    use crate::data::extract::tests::{header, row};

    fn extract(rows: &[String]) -> Vec<RawPlay> {
        let csv = format!("{}\n{}\n", header(), rows.join("\n"));
        read_extract(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_keeps_regular_season_run_pass() {
        let raw = extract(&[
            row("2019_01_GB_CHI", 1, "REG", 1, "GB", "CHI", "NA", "outdoors", "65", "8", "kickoff", 0.0),
            row("2019_01_GB_CHI", 2, "REG", 1, "GB", "CHI", "1", "outdoors", "65", "8", "run", 4.0),
            row("2019_01_GB_CHI", 3, "REG", 1, "GB", "CHI", "2", "outdoors", "65", "8", "pass", 9.0),
            row("2019_01_GB_CHI", 4, "REG", 1, "GB", "CHI", "4", "outdoors", "65", "8", "punt", 40.0),
            row("2019_01_GB_CHI", 5, "REG", 1, "GB", "CHI", "1", "outdoors", "65", "8", "no_play", 0.0),
            row("2019_01_GB_CHI", 6, "REG", 1, "GB", "CHI", "NA", "outdoors", "65", "8", "pass", 2.0),
            row("2019_20_KC_SF", 7, "POST", 20, "KC", "SF", "1", "outdoors", "65", "8", "pass", 9.0),
        ]);

        let (plays, summary) = filter_plays(raw).unwrap();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].play_type, PlayType::Run);
        assert_eq!(plays[1].play_type, PlayType::Pass);
        assert_eq!(summary.not_regular_season, 1);
        assert_eq!(summary.not_play_call, 3);
        assert_eq!(summary.no_down, 1);
        assert_eq!(summary.kept, 2);
    }

    #[test]
    fn test_orders_chronologically() {
        let raw = extract(&[
            row("2019_02_GB_MIN", 10, "REG", 2, "GB", "MIN", "1", "outdoors", "70", "3", "pass", 5.0),
            row("2019_01_GB_CHI", 20, "REG", 1, "GB", "CHI", "1", "outdoors", "65", "8", "run", 1.0),
            row("2019_01_GB_CHI", 5, "REG", 1, "GB", "CHI", "2", "outdoors", "65", "8", "run", 3.0),
        ]);
        let (plays, _) = filter_plays(raw).unwrap();
        let order: Vec<u32> = plays.iter().map(|p| p.play_id).collect();
        assert_eq!(order, vec![5, 20, 10]);
    }

    #[test]
    fn test_missing_required_value_fails() {
        let mut raw = extract(&[row(
            "2019_01_GB_CHI", 1, "REG", 1, "GB", "CHI", "1", "outdoors", "65", "8", "run", 4.0,
        )]);
        raw[0].score_differential = None;
        match filter_plays(raw).unwrap_err() {
            PlayCallError::MissingValue { column, play_id, .. } => {
                assert_eq!(column, "score_differential");
                assert_eq!(play_id, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
