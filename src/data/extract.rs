//! Play-by-play extract reader
//!
//! Parses a season CSV (nflverse column names) into raw play rows. Every
//! column the pipeline reads must be present in the header; `NA` and empty
//! cells become `None`.

use crate::{PlayCallError, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Columns read from the extract
pub const REQUIRED_COLUMNS: [&str; 25] = [
    "game_id",
    "play_id",
    "season",
    "season_type",
    "week",
    "game_date",
    "posteam",
    "defteam",
    "qtr",
    "down",
    "ydstogo",
    "yardline_100",
    "game_seconds_remaining",
    "half_seconds_remaining",
    "game_half",
    "score_differential",
    "shotgun",
    "no_huddle",
    "posteam_timeouts_remaining",
    "defteam_timeouts_remaining",
    "roof",
    "temp",
    "wind",
    "play_type",
    "yards_gained",
];

/// One row of the source extract, before filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlay {
    pub game_id: String,
    pub play_id: u32,
    pub season: u16,
    pub season_type: String,
    pub week: u8,
    pub game_date: NaiveDate,
    pub posteam: Option<String>,
    pub defteam: Option<String>,
    pub qtr: Option<u8>,
    pub down: Option<u8>,
    pub ydstogo: Option<f32>,
    pub yardline_100: Option<f32>,
    pub game_seconds_remaining: Option<f32>,
    pub half_seconds_remaining: Option<f32>,
    pub game_half: Option<String>,
    pub score_differential: Option<f32>,
    pub shotgun: Option<u8>,
    pub no_huddle: Option<u8>,
    pub posteam_timeouts_remaining: Option<f32>,
    pub defteam_timeouts_remaining: Option<f32>,
    pub roof: Option<String>,
    pub temp: Option<f32>,
    pub wind: Option<f32>,
    pub play_type: Option<String>,
    pub yards_gained: Option<f32>,
}

/// Header lookup for one extract
struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let positions: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|col| !positions.contains_key(**col))
        {
            return Err(PlayCallError::MissingColumn(missing.to_string()));
        }

        Ok(ColumnIndex { positions })
    }

    /// Cell value, `None` for NA or empty
    fn get<'a>(&self, record: &'a StringRecord, column: &str) -> Option<&'a str> {
        let idx = *self.positions.get(column)?;
        record
            .get(idx)
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != "NA")
    }

    fn text(&self, record: &StringRecord, column: &str) -> Option<String> {
        self.get(record, column).map(str::to_string)
    }

    fn number<T: FromStr>(&self, record: &StringRecord, column: &str, line: u64) -> Result<Option<T>> {
        match self.get(record, column) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|_| {
                PlayCallError::Parse(format!(
                    "line {}: column {} has non-numeric value {:?}",
                    line, column, value
                ))
            }),
        }
    }

    /// Integer columns are sometimes written as floats ("1.0"). Values
    /// outside the target type fail instead of wrapping.
    fn whole<T: TryFrom<u64>>(
        &self,
        record: &StringRecord,
        column: &str,
        line: u64,
    ) -> Result<Option<T>> {
        let value = match self.number::<f64>(record, column, line)? {
            Some(v) => v.round(),
            None => return Ok(None),
        };
        let out_of_range = || {
            PlayCallError::Parse(format!(
                "line {}: column {} value {} is out of range",
                line, column, value
            ))
        };
        if !value.is_finite() || value < 0.0 {
            return Err(out_of_range());
        }
        T::try_from(value as u64).map(Some).map_err(|_| out_of_range())
    }

    fn required<T>(&self, value: Option<T>, column: &str, line: u64) -> Result<T> {
        value.ok_or_else(|| {
            PlayCallError::Parse(format!("line {}: column {} is empty", line, column))
        })
    }

    fn parse_row(&self, record: &StringRecord, line: u64) -> Result<RawPlay> {
        let game_id = self.required(self.text(record, "game_id"), "game_id", line)?;
        let play_id = self.required(self.whole::<u32>(record, "play_id", line)?, "play_id", line)?;
        let season = self.required(self.whole::<u16>(record, "season", line)?, "season", line)?;
        let week = self.required(self.whole::<u8>(record, "week", line)?, "week", line)?;
        let date_text = self.required(self.get(record, "game_date"), "game_date", line)?;
        let game_date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").map_err(|e| {
            PlayCallError::Parse(format!("line {}: bad game_date {:?}: {}", line, date_text, e))
        })?;

        Ok(RawPlay {
            game_id,
            play_id,
            season,
            season_type: self
                .text(record, "season_type")
                .unwrap_or_default(),
            week,
            game_date,
            posteam: self.text(record, "posteam"),
            defteam: self.text(record, "defteam"),
            qtr: self.whole(record, "qtr", line)?,
            down: self.whole(record, "down", line)?,
            ydstogo: self.number(record, "ydstogo", line)?,
            yardline_100: self.number(record, "yardline_100", line)?,
            game_seconds_remaining: self.number(record, "game_seconds_remaining", line)?,
            half_seconds_remaining: self.number(record, "half_seconds_remaining", line)?,
            game_half: self.text(record, "game_half"),
            score_differential: self.number(record, "score_differential", line)?,
            shotgun: self.whole(record, "shotgun", line)?,
            no_huddle: self.whole(record, "no_huddle", line)?,
            posteam_timeouts_remaining: self.number(record, "posteam_timeouts_remaining", line)?,
            defteam_timeouts_remaining: self.number(record, "defteam_timeouts_remaining", line)?,
            roof: self.text(record, "roof"),
            temp: self.number(record, "temp", line)?,
            wind: self.number(record, "wind", line)?,
            play_type: self.text(record, "play_type"),
            yards_gained: self.number(record, "yards_gained", line)?,
        })
    }
}

/// Read all plays from a CSV source
pub fn read_extract<R: Read>(reader: R) -> Result<Vec<RawPlay>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let index = ColumnIndex::from_headers(csv_reader.headers()?)?;

    let mut plays = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let line = i as u64 + 2;
        plays.push(index.parse_row(&record, line)?);
    }

    log::debug!("Read {} raw plays", plays.len());
    Ok(plays)
}

/// Read all plays from a CSV file on disk
pub fn read_extract_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawPlay>> {
    let path = path.as_ref();
    log::info!("Reading extract {}", path.display());
    let file = std::fs::File::open(path)?;
    read_extract(std::io::BufReader::new(file))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn header() -> String {
        REQUIRED_COLUMNS.join(",")
    }

    /// Build a CSV row in REQUIRED_COLUMNS order
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn row(
        game_id: &str,
        play_id: u32,
        season_type: &str,
        week: u8,
        posteam: &str,
        defteam: &str,
        down: &str,
        roof: &str,
        temp: &str,
        wind: &str,
        play_type: &str,
        yards: f32,
    ) -> String {
        format!(
            "{game_id},{play_id},2019,{season_type},{week},2019-09-{day:02},{posteam},{defteam},1,{down},10,75,3600,1800,Half1,0,1,0,3,3,{roof},{temp},{wind},{play_type},{yards}",
            day = 5 + week as u32,
        )
    }

    #[test]
    fn test_reads_rows_and_na() {
        let csv = format!(
            "{}\n{}\n{}\n",
            header(),
            row("2019_01_GB_CHI", 1, "REG", 1, "GB", "CHI", "1", "dome", "NA", "NA", "pass", 12.0),
            row("2019_01_GB_CHI", 2, "REG", 1, "GB", "CHI", "NA", "outdoors", "65", "8", "kickoff", 0.0),
        );
        let plays = read_extract(csv.as_bytes()).unwrap();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].posteam.as_deref(), Some("GB"));
        assert_eq!(plays[0].down, Some(1));
        assert_eq!(plays[0].temp, None);
        assert_eq!(plays[1].down, None);
        assert_eq!(plays[1].temp, Some(65.0));
        assert_eq!(plays[1].play_type.as_deref(), Some("kickoff"));
    }

    #[test]
    fn test_missing_column_fails() {
        let header = REQUIRED_COLUMNS
            .iter()
            .filter(|c| **c != "wind")
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        let err = read_extract(format!("{}\n", header).as_bytes()).unwrap_err();
        match err {
            PlayCallError::MissingColumn(col) => assert_eq!(col, "wind"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_out_of_range_week_fails() {
        let line = row("g", 1, "REG", 1, "GB", "CHI", "1", "dome", "70", "0", "run", 3.0)
            .replacen(",REG,1,", ",REG,300,", 1);
        let err = read_extract(format!("{}\n{}\n", header(), line).as_bytes()).unwrap_err();
        match err {
            PlayCallError::Parse(msg) => assert!(msg.contains("week"), "{}", msg),
            other => panic!("unexpected error: {}", other),
        }

        let line = row("g", 1, "REG", 1, "GB", "CHI", "-1", "dome", "70", "0", "run", 3.0);
        assert!(matches!(
            read_extract(format!("{}\n{}\n", header(), line).as_bytes()),
            Err(PlayCallError::Parse(_))
        ));
    }

    #[test]
    fn test_extract_without_unused_columns_reads() {
        let csv = format!(
            "{},home_team,away_team\n{},GB,CHI\n",
            header(),
            row("2019_01_GB_CHI", 1, "REG", 1, "GB", "CHI", "1", "dome", "NA", "NA", "pass", 12.0)
        );
        assert_eq!(read_extract(csv.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_number_fails() {
        let mut line = row("g", 1, "REG", 1, "GB", "CHI", "1", "dome", "70", "0", "run", 3.0);
        line = line.replace(",10,75,", ",ten,75,");
        let err = read_extract(format!("{}\n{}\n", header(), line).as_bytes()).unwrap_err();
        assert!(matches!(err, PlayCallError::Parse(_)));
    }
}
