//! Lag-window builder
//!
//! Previous play calls of the possessing team as features. Rows without a
//! full window of history are dropped.

use std::collections::{HashMap, VecDeque};

use crate::features::frame::SeasonTable;
use crate::Result;

pub fn lag_column_name(lag: usize) -> String {
    format!("prev_play_{}", lag)
}

/// Append `prev_play_1..=window` (1 = pass, 0 = run) and drop each team's
/// first `window` plays. Returns the number of rows dropped.
pub fn add_lag_columns(table: &mut SeasonTable, window: usize) -> Result<usize> {
    if window == 0 {
        return Ok(0);
    }

    let mut history: HashMap<&str, VecDeque<f32>> = HashMap::new();
    let mut columns: Vec<Vec<f32>> = vec![Vec::with_capacity(table.len()); window];
    let mut keep = Vec::with_capacity(table.len());

    for play in &table.plays {
        let recent = history.entry(play.posteam.as_str()).or_default();

        // Most recent first
        for (lag, column) in columns.iter_mut().enumerate() {
            column.push(recent.get(lag).copied().unwrap_or(0.0));
        }
        keep.push(recent.len() >= window);

        recent.push_front(play.play_type.indicator());
        recent.truncate(window);
    }

    for (lag, values) in columns.into_iter().enumerate() {
        table.frame.push_column(lag_column_name(lag + 1), values)?;
    }

    let before = table.len();
    table.retain_rows(&keep);
    let dropped = before - table.len();

    log::info!(
        "Lag window {}: dropped {} of {} rows without full history",
        window,
        dropped,
        before
    );
    Ok(dropped)
}
