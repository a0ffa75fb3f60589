//! Aggregate rows produced by storage-side queries over one session.

use serde::{Deserialize, Serialize};

use crate::phase::SleepPhase;

use super::Sample;

/// Share of a session's samples spent in one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStat {
    pub phase: SleepPhase,
    pub percentage: f32,
}

/// Time spent in one phase, estimated as sample count times the tick interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDuration {
    pub phase: SleepPhase,
    pub duration_secs: u64,
}

/// Headline averages for a session plus its time bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryRow {
    pub avg_motion: f32,
    pub avg_audio_level: f32,
    pub session_start: i64,
    pub alarm_time: i64,
    /// Timestamp of the most recent sample.
    pub last_timestamp: i64,
}

impl SessionSummaryRow {
    /// In-process equivalent of the storage-side summary query.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let count = samples.len() as f32;
        Some(Self {
            avg_motion: samples.iter().map(|s| s.motion).sum::<f32>() / count,
            avg_audio_level: samples.iter().map(|s| s.audio_level).sum::<f32>() / count,
            session_start: first.session_start,
            alarm_time: samples.iter().map(|s| s.alarm_time).max().unwrap_or(0),
            last_timestamp: samples.iter().map(|s| s.timestamp).max().unwrap_or(first.timestamp),
        })
    }
}
