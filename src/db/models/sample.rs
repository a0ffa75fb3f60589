//! Sleep sample data model.
//!
//! One row of `sleep_data`: a smoothed sensor reading stamped with the session it
//! belongs to. A session has no row of its own; it is the set of samples sharing
//! a `session_start`.

use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::SleepPhase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Surrogate key assigned by storage; `None` until persisted.
    pub id: Option<i64>,
    /// Epoch millis.
    pub timestamp: i64,
    pub motion: f32,
    pub audio_level: f32,
    /// Epoch millis identifying the session.
    pub session_start: i64,
    /// Epoch millis of the wake deadline, 0 when no alarm is set.
    pub alarm_time: i64,
    pub sleep_phase: SleepPhase,
}

impl Sample {
    pub fn new(
        timestamp: i64,
        motion: f32,
        audio_level: f32,
        session_start: i64,
        alarm_time: i64,
        sleep_phase: SleepPhase,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            motion,
            audio_level,
            session_start,
            alarm_time,
            sleep_phase,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timestamp <= 0 {
            bail!("sample timestamp must be positive, got {}", self.timestamp);
        }
        if self.session_start <= 0 {
            bail!("sample has no session start");
        }
        if self.session_start > self.timestamp {
            bail!(
                "sample at {} predates its session start {}",
                self.timestamp,
                self.session_start
            );
        }
        if self.alarm_time > 0 && self.alarm_time <= self.session_start {
            bail!(
                "alarm time {} is not after session start {}",
                self.alarm_time,
                self.session_start
            );
        }
        if !(self.motion.is_finite() && self.motion >= 0.0) {
            bail!("motion must be a non-negative number, got {}", self.motion);
        }
        if !(self.audio_level.is_finite() && self.audio_level >= 0.0) {
            bail!(
                "audio level must be a non-negative number, got {}",
                self.audio_level
            );
        }
        Ok(())
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        Sample::new(2_000, 0.1, 0.2, 1_000, 10_000, SleepPhase::LightSleep)
    }

    #[test]
    fn valid_sample_passes() {
        assert!(sample().validate().is_ok());
        assert!(Sample { alarm_time: 0, ..sample() }.validate().is_ok());
    }

    #[test]
    fn session_invariants_are_enforced() {
        assert!(Sample { session_start: 0, ..sample() }.validate().is_err());
        assert!(Sample { session_start: 3_000, ..sample() }.validate().is_err());
        assert!(Sample { alarm_time: 1_000, ..sample() }.validate().is_err());
        assert!(Sample { timestamp: 0, session_start: 0, ..sample() }.validate().is_err());
    }

    #[test]
    fn readings_must_be_non_negative() {
        assert!(Sample { motion: -0.1, ..sample() }.validate().is_err());
        assert!(Sample { audio_level: f32::NAN, ..sample() }.validate().is_err());
    }

    #[test]
    fn recorded_at_converts_epoch_millis() {
        let at = sample().recorded_at().unwrap();
        assert_eq!(at.timestamp_millis(), 2_000);
    }
}
