//! SQLite storage for imported play-by-play extracts

use crate::data::extract::RawPlay;
use crate::{PlayCallError, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS plays (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id TEXT NOT NULL,
                play_id INTEGER NOT NULL,
                season INTEGER NOT NULL,
                season_type TEXT NOT NULL,
                week INTEGER NOT NULL,
                game_date TEXT NOT NULL,
                posteam TEXT,
                defteam TEXT,
                qtr INTEGER,
                down INTEGER,
                ydstogo REAL,
                yardline_100 REAL,
                game_seconds_remaining REAL,
                half_seconds_remaining REAL,
                game_half TEXT,
                score_differential REAL,
                shotgun INTEGER,
                no_huddle INTEGER,
                posteam_timeouts_remaining REAL,
                defteam_timeouts_remaining REAL,
                roof TEXT,
                temp REAL,
                wind REAL,
                play_type TEXT,
                yards_gained REAL,
                UNIQUE(game_id, play_id)
            );

            CREATE INDEX IF NOT EXISTS idx_plays_season ON plays(season, week);
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace plays; returns the number written
    pub fn upsert_plays(&self, plays: &[RawPlay]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO plays (game_id, play_id, season, season_type, week, game_date,
                                   posteam, defteam, qtr, down, ydstogo, yardline_100,
                                   game_seconds_remaining, half_seconds_remaining, game_half,
                                   score_differential, shotgun, no_huddle,
                                   posteam_timeouts_remaining, defteam_timeouts_remaining,
                                   roof, temp, wind, play_type, yards_gained)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                        ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
                ON CONFLICT(game_id, play_id) DO UPDATE SET
                    season = excluded.season,
                    season_type = excluded.season_type,
                    week = excluded.week,
                    game_date = excluded.game_date,
                    posteam = excluded.posteam,
                    defteam = excluded.defteam,
                    qtr = excluded.qtr,
                    down = excluded.down,
                    ydstogo = excluded.ydstogo,
                    yardline_100 = excluded.yardline_100,
                    game_seconds_remaining = excluded.game_seconds_remaining,
                    half_seconds_remaining = excluded.half_seconds_remaining,
                    game_half = excluded.game_half,
                    score_differential = excluded.score_differential,
                    shotgun = excluded.shotgun,
                    no_huddle = excluded.no_huddle,
                    posteam_timeouts_remaining = excluded.posteam_timeouts_remaining,
                    defteam_timeouts_remaining = excluded.defteam_timeouts_remaining,
                    roof = excluded.roof,
                    temp = excluded.temp,
                    wind = excluded.wind,
                    play_type = excluded.play_type,
                    yards_gained = excluded.yards_gained
                "#,
            )?;

            for play in plays {
                stmt.execute(params![
                    play.game_id,
                    play.play_id,
                    play.season,
                    play.season_type,
                    play.week,
                    play.game_date.format("%Y-%m-%d").to_string(),
                    play.posteam,
                    play.defteam,
                    play.qtr,
                    play.down,
                    play.ydstogo,
                    play.yardline_100,
                    play.game_seconds_remaining,
                    play.half_seconds_remaining,
                    play.game_half,
                    play.score_differential,
                    play.shotgun,
                    play.no_huddle,
                    play.posteam_timeouts_remaining,
                    play.defteam_timeouts_remaining,
                    play.roof,
                    play.temp,
                    play.wind,
                    play.play_type,
                    play.yards_gained,
                ])?;
            }
        }
        tx.commit()?;
        Ok(plays.len())
    }

    /// All stored plays of one season, in source order
    pub fn get_season_plays(&self, season: u16) -> Result<Vec<RawPlay>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, play_id, season, season_type, week, game_date,
                    posteam, defteam, qtr, down, ydstogo, yardline_100,
                    game_seconds_remaining, half_seconds_remaining, game_half,
                    score_differential, shotgun, no_huddle,
                    posteam_timeouts_remaining, defteam_timeouts_remaining,
                    roof, temp, wind, play_type, yards_gained
             FROM plays
             WHERE season = ?1
             ORDER BY id",
        )?;

        let plays = stmt
            .query_map(params![season], Self::row_to_play)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(plays)
    }

    fn row_to_play(row: &rusqlite::Row) -> rusqlite::Result<RawPlay> {
        let date_str: String = row.get(5)?;
        let game_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(RawPlay {
            game_id: row.get(0)?,
            play_id: row.get(1)?,
            season: row.get(2)?,
            season_type: row.get(3)?,
            week: row.get(4)?,
            game_date,
            posteam: row.get(6)?,
            defteam: row.get(7)?,
            qtr: row.get(8)?,
            down: row.get(9)?,
            ydstogo: row.get(10)?,
            yardline_100: row.get(11)?,
            game_seconds_remaining: row.get(12)?,
            half_seconds_remaining: row.get(13)?,
            game_half: row.get(14)?,
            score_differential: row.get(15)?,
            shotgun: row.get(16)?,
            no_huddle: row.get(17)?,
            posteam_timeouts_remaining: row.get(18)?,
            defteam_timeouts_remaining: row.get(19)?,
            roof: row.get(20)?,
            temp: row.get(21)?,
            wind: row.get(22)?,
            play_type: row.get(23)?,
            yards_gained: row.get(24)?,
        })
    }

    /// Delete all plays of one season; returns the number removed
    pub fn clear_season(&self, season: u16) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM plays WHERE season = ?1", params![season])?;
        Ok(removed)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let play_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM plays", [], |row| row.get(0))?;

        let game_count: i64 = self
            .conn
            .query_row("SELECT COUNT(DISTINCT game_id) FROM plays", [], |row| {
                row.get(0)
            })?;

        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT season FROM plays ORDER BY season")?;
        let seasons = stmt
            .query_map([], |row| row.get::<_, u16>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(game_date) FROM plays", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(game_date) FROM plays", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            play_count: play_count as usize,
            game_count: game_count as usize,
            seasons,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        })
    }

    /// Fail with a hint when a season has not been imported
    pub fn require_season(&self, season: u16) -> Result<Vec<RawPlay>> {
        let plays = self.get_season_plays(season)?;
        if plays.is_empty() {
            return Err(PlayCallError::NoData(format!(
                "no plays stored for season {}. Run 'playcall data import' first.",
                season
            )));
        }
        Ok(plays)
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub play_count: usize,
    pub game_count: usize,
    pub seasons: Vec<u16>,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::read_extract;
    use crate::data::extract::tests::{header, row};

    fn sample_plays() -> Vec<RawPlay> {
        let csv = format!(
            "{}\n{}\n{}\n",
            header(),
            row("2019_01_GB_CHI", 1, "REG", 1, "GB", "CHI", "1", "outdoors", "65", "8", "pass", 12.0),
            row("2019_01_GB_CHI", 2, "REG", 1, "CHI", "GB", "NA", "outdoors", "65", "8", "punt", 0.0),
        );
        read_extract(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.play_count, 0);
        assert!(stats.seasons.is_empty());
        assert!(stats.earliest_game.is_none());
    }

    #[test]
    fn test_upsert_and_read_back() {
        let db = Database::in_memory().unwrap();
        let plays = sample_plays();

        assert_eq!(db.upsert_plays(&plays).unwrap(), 2);
        // Re-import is idempotent
        db.upsert_plays(&plays).unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.play_count, 2);
        assert_eq!(stats.game_count, 1);
        assert_eq!(stats.seasons, vec![2019]);

        let stored = db.get_season_plays(2019).unwrap();
        assert_eq!(stored, plays);
    }

    #[test]
    fn test_require_season_without_data() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.require_season(2020),
            Err(PlayCallError::NoData(_))
        ));
    }
}
