//! Categorical encoder
//!
//! Projects play records into the numeric base columns of a feature frame and
//! expands down, game half, roof and team identity into indicator columns.
//! Play type becomes the target, not a feature.

use std::collections::BTreeSet;

use crate::features::frame::SeasonTable;
use crate::{GameHalf, PlayCallError, PlayRecord, Result, Roof};

/// Numeric columns taken directly from the play record
pub const BASE_COLUMNS: [&str; 12] = [
    "qtr",
    "ydstogo",
    "yardline_100",
    "game_seconds_remaining",
    "half_seconds_remaining",
    "score_differential",
    "shotgun",
    "no_huddle",
    "posteam_timeouts_remaining",
    "defteam_timeouts_remaining",
    "temp",
    "wind",
];

fn indicator(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn weather(play: &PlayRecord, column: &str, value: Option<f32>) -> Result<f32> {
    value.ok_or_else(|| PlayCallError::MissingValue {
        column: column.to_string(),
        game_id: play.game_id.clone(),
        play_id: play.play_id,
    })
}

/// Teams seen in either role, sorted
pub fn team_vocabulary(plays: &[PlayRecord]) -> Vec<String> {
    plays
        .iter()
        .flat_map(|p| [p.posteam.clone(), p.defteam.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Build the season table with base and indicator columns
pub fn encode(plays: Vec<PlayRecord>) -> Result<SeasonTable> {
    let temps = plays
        .iter()
        .map(|p| weather(p, "temp", p.temp))
        .collect::<Result<Vec<_>>>()?;
    let winds = plays
        .iter()
        .map(|p| weather(p, "wind", p.wind))
        .collect::<Result<Vec<_>>>()?;

    let teams = team_vocabulary(&plays);
    let mut table = SeasonTable::new(plays);
    let plays = &table.plays;

    let base: Vec<(&str, Vec<f32>)> = vec![
        ("qtr", plays.iter().map(|p| p.qtr as f32).collect()),
        ("ydstogo", plays.iter().map(|p| p.ydstogo).collect()),
        ("yardline_100", plays.iter().map(|p| p.yardline_100).collect()),
        (
            "game_seconds_remaining",
            plays.iter().map(|p| p.game_seconds_remaining).collect(),
        ),
        (
            "half_seconds_remaining",
            plays.iter().map(|p| p.half_seconds_remaining).collect(),
        ),
        (
            "score_differential",
            plays.iter().map(|p| p.score_differential).collect(),
        ),
        ("shotgun", plays.iter().map(|p| indicator(p.shotgun)).collect()),
        ("no_huddle", plays.iter().map(|p| indicator(p.no_huddle)).collect()),
        (
            "posteam_timeouts_remaining",
            plays.iter().map(|p| p.posteam_timeouts_remaining).collect(),
        ),
        (
            "defteam_timeouts_remaining",
            plays.iter().map(|p| p.defteam_timeouts_remaining).collect(),
        ),
        ("temp", temps),
        ("wind", winds),
    ];

    let mut indicators: Vec<(String, Vec<f32>)> = Vec::new();
    for down in 1..=4u8 {
        indicators.push((
            format!("down_{}", down),
            plays.iter().map(|p| indicator(p.down == down)).collect(),
        ));
    }
    for half in GameHalf::ALL {
        indicators.push((
            format!("game_half_{}", half.code()),
            plays.iter().map(|p| indicator(p.game_half == half)).collect(),
        ));
    }
    for roof in Roof::ALL {
        indicators.push((
            format!("roof_{}", roof.code()),
            plays.iter().map(|p| indicator(p.roof == roof)).collect(),
        ));
    }
    for team in &teams {
        indicators.push((
            format!("off_team_{}", team),
            plays.iter().map(|p| indicator(&p.posteam == team)).collect(),
        ));
    }
    for team in &teams {
        indicators.push((
            format!("def_team_{}", team),
            plays.iter().map(|p| indicator(&p.defteam == team)).collect(),
        ));
    }

    for (name, values) in base {
        table.frame.push_column(name, values)?;
    }
    for (name, values) in indicators {
        table.frame.push_column(name, values)?;
    }

    log::info!(
        "Encoded {} plays into {} columns ({} teams)",
        table.len(),
        table.frame.n_columns(),
        teams.len()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::make_play;
    use crate::PlayType;

    #[test]
    fn test_indicator_columns() {
        let mut plays = vec![
            make_play("GB", "CHI", 1, PlayType::Pass, 7.0),
            make_play("CHI", "GB", 2, PlayType::Run, 3.0),
        ];
        plays[1].down = 3;
        plays[1].game_half = GameHalf::Second;
        plays[1].roof = Roof::Dome;

        let table = encode(plays).unwrap();
        let frame = &table.frame;

        assert_eq!(frame.column("down_1").unwrap(), &[1.0, 0.0]);
        assert_eq!(frame.column("down_3").unwrap(), &[0.0, 1.0]);
        assert_eq!(frame.column("game_half_1").unwrap(), &[1.0, 0.0]);
        assert_eq!(frame.column("game_half_2").unwrap(), &[0.0, 1.0]);
        assert_eq!(frame.column("game_half_ot").unwrap(), &[0.0, 0.0]);
        assert_eq!(frame.column("roof_dome").unwrap(), &[0.0, 1.0]);
        assert_eq!(frame.column("off_team_GB").unwrap(), &[1.0, 0.0]);
        assert_eq!(frame.column("def_team_GB").unwrap(), &[0.0, 1.0]);
        assert_eq!(table.targets(), vec![1.0, 0.0]);
        // Target never leaks into the frame
        assert!(!frame.contains("is_pass"));
        assert!(!frame.contains("yards_gained"));
    }

    #[test]
    fn test_exactly_one_indicator_per_group() {
        let plays = vec![
            make_play("GB", "CHI", 1, PlayType::Pass, 7.0),
            make_play("MIN", "DET", 2, PlayType::Run, 3.0),
        ];
        let table = encode(plays).unwrap();
        let group_sum = |prefix: &str, row: usize| -> f32 {
            table
                .frame
                .names()
                .iter()
                .filter(|n| n.starts_with(prefix))
                .map(|n| table.frame.column(n).unwrap()[row])
                .sum()
        };
        for row in 0..table.len() {
            for prefix in ["down_", "game_half_", "roof_", "off_team_", "def_team_"] {
                assert_eq!(group_sum(prefix, row), 1.0, "{} at row {}", prefix, row);
            }
        }
        // No base column falls into an indicator group
        for base in BASE_COLUMNS {
            assert!(!["down_", "game_half_", "roof_", "off_team_", "def_team_"]
                .iter()
                .any(|prefix| base.starts_with(prefix)));
        }
    }

    #[test]
    fn test_outdoor_missing_weather_fails() {
        let mut plays = vec![make_play("GB", "CHI", 1, PlayType::Pass, 7.0)];
        plays[0].wind = None;
        match encode(plays).unwrap_err() {
            PlayCallError::MissingValue { column, .. } => assert_eq!(column, "wind"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
