//! Missing-value normalizer for weather
//!
//! Indoor games carry no weather readings in the source. They get fixed
//! defaults; outdoor games keep whatever was recorded.

use crate::PlayRecord;

/// Temperature assumed for dome and closed-roof games (Fahrenheit)
pub const INDOOR_TEMP: f32 = 72.0;
/// Wind speed assumed for dome and closed-roof games (mph)
pub const INDOOR_WIND: f32 = 0.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeatherFill {
    pub temp_filled: usize,
    pub wind_filled: usize,
}

/// Fill missing temp/wind of indoor plays in place
pub fn fill_indoor_weather(plays: &mut [PlayRecord]) -> WeatherFill {
    let mut fill = WeatherFill::default();

    for play in plays.iter_mut().filter(|p| p.roof.is_indoor()) {
        if play.temp.is_none() {
            play.temp = Some(INDOOR_TEMP);
            fill.temp_filled += 1;
        }
        if play.wind.is_none() {
            play.wind = Some(INDOOR_WIND);
            fill.wind_filled += 1;
        }
    }

    log::debug!(
        "Indoor weather defaults: {} temp, {} wind",
        fill.temp_filled,
        fill.wind_filled
    );
    fill
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::make_play;
    use crate::{PlayType, Roof};

    #[test]
    fn test_indoor_defaults() {
        let mut plays = vec![
            make_play("NO", "HOU", 1, PlayType::Pass, 7.0),
            make_play("NO", "HOU", 2, PlayType::Run, 3.0),
        ];
        plays[0].roof = Roof::Dome;
        plays[0].temp = None;
        plays[0].wind = None;
        plays[1].roof = Roof::Closed;
        plays[1].temp = None;
        plays[1].wind = Some(4.0);
        plays[1].score_differential = -21.0;

        let fill = fill_indoor_weather(&mut plays);

        assert_eq!(plays[0].temp, Some(72.0));
        assert_eq!(plays[0].wind, Some(0.0));
        assert_eq!(plays[1].temp, Some(72.0));
        // A recorded value is never overwritten
        assert_eq!(plays[1].wind, Some(4.0));
        assert_eq!(fill.temp_filled, 2);
        assert_eq!(fill.wind_filled, 1);
    }

    #[test]
    fn test_outdoor_left_missing() {
        let mut plays = vec![make_play("GB", "CHI", 1, PlayType::Pass, 7.0)];
        plays[0].roof = Roof::Outdoors;
        plays[0].temp = None;

        let fill = fill_indoor_weather(&mut plays);
        assert_eq!(plays[0].temp, None);
        assert_eq!(fill, WeatherFill::default());
    }
}
