//! Feature engineering
//!
//! Turns filtered play records into a causal, model-ready feature frame.

pub mod encoding;
pub mod filter;
pub mod frame;
pub mod lags;
pub mod scaling;
pub mod selection;
pub mod temporal;
pub mod weather;

pub use encoding::encode;
pub use filter::{filter_plays, FilterSummary};
pub use frame::{FeatureFrame, SeasonTable};
pub use lags::add_lag_columns;
pub use scaling::ContinuousScaler;
pub use selection::FeatureSelection;
pub use temporal::{add_tendency_columns, TemporalAggregator};
pub use weather::fill_indoor_weather;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use crate::{GameHalf, PlayRecord, PlayType, Roof};

    /// Week-1 outdoor first-down play with recorded weather
    pub fn make_play(
        posteam: &str,
        defteam: &str,
        play_id: u32,
        play_type: PlayType,
        yards: f32,
    ) -> PlayRecord {
        PlayRecord {
            game_id: format!("2019_01_{}_{}", posteam, defteam),
            play_id,
            week: 1,
            game_date: NaiveDate::from_ymd_opt(2019, 9, 8).unwrap(),
            posteam: posteam.to_string(),
            defteam: defteam.to_string(),
            qtr: 1,
            down: 1,
            ydstogo: 10.0,
            yardline_100: 75.0,
            game_seconds_remaining: 3600.0,
            half_seconds_remaining: 1800.0,
            game_half: GameHalf::First,
            score_differential: 0.0,
            shotgun: true,
            no_huddle: false,
            posteam_timeouts_remaining: 3.0,
            defteam_timeouts_remaining: 3.0,
            roof: Roof::Outdoors,
            temp: Some(65.0),
            wind: Some(5.0),
            play_type,
            yards_gained: yards,
        }
    }
}
