//! Season extract download
//!
//! Fetches the nflverse play-by-play CSV for a season into the data
//! directory. A file already on disk is reused unless a refresh is forced.

use crate::{PlayCallError, Result};
use std::path::{Path, PathBuf};

const RELEASE_URL: &str = "https://github.com/nflverse/nflverse-data/releases/download/pbp";

/// Downloader for season extracts
pub struct SeasonSource {
    client: reqwest::blocking::Client,
    data_dir: PathBuf,
    /// If true, only use files already on disk
    offline_only: bool,
    /// If true, download even when a file exists
    refresh: bool,
}

impl SeasonSource {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("playcall/0.1")
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(SeasonSource {
            client,
            data_dir: data_dir.as_ref().to_path_buf(),
            offline_only: false,
            refresh: false,
        })
    }

    /// Set offline-only mode (no network requests, file must exist)
    pub fn offline_only(mut self, offline: bool) -> Self {
        self.offline_only = offline;
        self
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn season_url(season: u16) -> String {
        format!("{}/play_by_play_{}.csv", RELEASE_URL, season)
    }

    pub fn season_path(&self, season: u16) -> PathBuf {
        self.data_dir.join(format!("play_by_play_{}.csv", season))
    }

    /// Make the season extract available locally and return its path
    pub fn fetch_season(&self, season: u16) -> Result<PathBuf> {
        let path = self.season_path(season);

        if path.exists() && (!self.refresh || self.offline_only) {
            log::info!("Using existing extract {}", path.display());
            return Ok(path);
        }

        if self.offline_only {
            return Err(PlayCallError::NoData(format!(
                "offline mode and no extract at {}",
                path.display()
            )));
        }

        let url = Self::season_url(season);
        log::info!("Downloading {}", url);
        let response = self.client.get(&url).send()?.error_for_status()?;
        let body = response.bytes()?;

        std::fs::create_dir_all(&self.data_dir)?;
        // Only a finished download carries the final name
        let partial = path.with_extension("csv.part");
        std::fs::write(&partial, &body)?;
        std::fs::rename(&partial, &path)?;

        log::info!("Saved {} bytes to {}", body.len(), path.display());
        Ok(path)
    }
}
