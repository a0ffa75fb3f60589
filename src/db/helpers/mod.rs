use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use rusqlite::Row;

use crate::db::models::Sample;
use crate::phase::SleepPhase;

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_phase(value: &str) -> Result<SleepPhase> {
    value.parse()
}

pub const SAMPLE_COLUMNS: &str =
    "id, timestamp, motion, audio_level, sleep_start, alarm_time, sleep_phase";

pub fn row_to_sample(row: &Row) -> Result<Sample> {
    let motion: f64 = row.get("motion")?;
    let audio_level: f64 = row.get("audio_level")?;
    let sleep_phase: String = row.get("sleep_phase")?;

    Ok(Sample {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        motion: motion as f32,
        audio_level: audio_level as f32,
        session_start: row.get("sleep_start")?,
        alarm_time: row.get("alarm_time")?,
        sleep_phase: parse_phase(&sleep_phase)?,
    })
}
