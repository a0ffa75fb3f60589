use log::debug;

use crate::signal::SignalFrame;

use super::{
    config::ClassifierConfig,
    state::{PhaseState, SleepPhase},
};

/// Result of one classification tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseUpdate {
    pub phase: SleepPhase,
    pub previous: SleepPhase,
}

impl PhaseUpdate {
    pub fn changed(&self) -> bool {
        self.phase != self.previous
    }
}

/// Hysteresis state machine over smoothed motion/audio levels.
///
/// Rules, first match wins:
/// 1. significant motion or high noise: AWAKE immediately, all streaks cleared
/// 2. quiet and still: count towards DEEP_SLEEP
/// 3. high motion variance after a long dwell: count towards REM
/// 4. low motion: count towards LIGHT_SLEEP
/// 5. otherwise stay put
#[derive(Debug, Clone)]
pub struct PhaseClassifier {
    config: ClassifierConfig,
    state: PhaseState,
}

impl PhaseClassifier {
    pub fn new(config: ClassifierConfig, started_ms: i64) -> Self {
        Self {
            config,
            state: PhaseState::new(started_ms),
        }
    }

    pub fn phase(&self) -> SleepPhase {
        self.state.phase
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&mut self, frame: &SignalFrame, now_ms: i64) -> PhaseUpdate {
        let previous = self.state.phase;
        let time_in_phase = self.state.time_in_phase_ms(now_ms);
        let cfg = &self.config;
        let state = &mut self.state;

        let next = if frame.motion > cfg.significant_motion || frame.audio_level > cfg.high_noise {
            state.reset_streaks();
            SleepPhase::Awake
        } else if frame.motion < cfg.deep_motion && frame.audio_level < cfg.deep_noise {
            state.deep_streak += 1;
            if state.deep_streak >= cfg.deep_streak {
                SleepPhase::DeepSleep
            } else {
                previous
            }
        } else if frame.motion_variance > cfg.rem_variance && time_in_phase > cfg.rem_min_dwell_ms {
            state.rem_streak += 1;
            if state.rem_streak >= cfg.rem_streak {
                SleepPhase::Rem
            } else {
                previous
            }
        } else if frame.motion < cfg.light_motion {
            state.light_streak += 1;
            if state.light_streak >= cfg.light_streak {
                SleepPhase::LightSleep
            } else {
                previous
            }
        } else {
            previous
        };

        if next != previous {
            debug!("Sleep phase changed from {previous} to {next}");
            state.phase = next;
            state.phase_started_ms = now_ms;
        }

        PhaseUpdate {
            phase: next,
            previous,
        }
    }

    /// Back to AWAKE with cleared streaks, as at the start of a session.
    pub fn reset(&mut self, now_ms: i64) {
        self.state = PhaseState::new(now_ms);
    }
}
