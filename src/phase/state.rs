use std::{fmt, str::FromStr};

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SleepPhase {
    #[default]
    Awake,
    LightSleep,
    DeepSleep,
    Rem,
}

impl SleepPhase {
    pub const ALL: [SleepPhase; 4] = [
        SleepPhase::Awake,
        SleepPhase::LightSleep,
        SleepPhase::DeepSleep,
        SleepPhase::Rem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SleepPhase::Awake => "AWAKE",
            SleepPhase::LightSleep => "LIGHT_SLEEP",
            SleepPhase::DeepSleep => "DEEP_SLEEP",
            SleepPhase::Rem => "REM",
        }
    }

    /// Phases shallow enough to wake the sleeper from without grogginess.
    pub fn is_light(&self) -> bool {
        matches!(self, SleepPhase::LightSleep | SleepPhase::Rem)
    }
}

impl fmt::Display for SleepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SleepPhase {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "AWAKE" => Ok(SleepPhase::Awake),
            "LIGHT_SLEEP" => Ok(SleepPhase::LightSleep),
            "DEEP_SLEEP" => Ok(SleepPhase::DeepSleep),
            "REM" => Ok(SleepPhase::Rem),
            other => Err(anyhow!("unknown sleep phase '{other}'")),
        }
    }
}

/// Runtime classifier state. Owned by the tracking loop, discarded on stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseState {
    pub phase: SleepPhase,
    pub phase_started_ms: i64,
    pub deep_streak: u32,
    pub light_streak: u32,
    pub rem_streak: u32,
}

impl PhaseState {
    pub fn new(started_ms: i64) -> Self {
        Self {
            phase: SleepPhase::Awake,
            phase_started_ms: started_ms,
            deep_streak: 0,
            light_streak: 0,
            rem_streak: 0,
        }
    }

    pub fn time_in_phase_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.phase_started_ms).max(0)
    }

    pub fn reset_streaks(&mut self) {
        self.deep_streak = 0;
        self.light_streak = 0;
        self.rem_streak = 0;
    }
}
