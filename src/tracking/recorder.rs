use crate::{
    db::models::Sample,
    error::TrackingError,
    phase::SleepPhase,
    signal::SignalFrame,
};

use super::alarm::{deadline_reached, in_smart_window};

/// Turns each tick's frame and phase into a sample stamped with the session's
/// start and alarm, and decides when the alarm should fire.
#[derive(Debug, Clone)]
pub struct SampleRecorder {
    session_start: i64,
    alarm_time: i64,
    smart_window_ms: Option<i64>,
    last_timestamp: Option<i64>,
    woken: bool,
}

impl SampleRecorder {
    pub fn new(
        session_start: i64,
        alarm_time: i64,
        smart_window_ms: Option<i64>,
    ) -> Result<Self, TrackingError> {
        if session_start <= 0 {
            return Err(TrackingError::invalid(format!(
                "session start must be positive, got {session_start}"
            )));
        }
        if alarm_time < 0 {
            return Err(TrackingError::invalid(format!(
                "alarm time must not be negative, got {alarm_time}"
            )));
        }
        if alarm_time > 0 && alarm_time <= session_start {
            return Err(TrackingError::invalid(
                "alarm deadline must be after the session start",
            ));
        }

        Ok(Self {
            session_start,
            alarm_time,
            smart_window_ms,
            last_timestamp: None,
            woken: false,
        })
    }

    pub fn session_start(&self) -> i64 {
        self.session_start
    }

    pub fn alarm_time(&self) -> i64 {
        self.alarm_time
    }

    pub fn woken(&self) -> bool {
        self.woken
    }

    /// Move the deadline of the running session. A time already in the past
    /// takes effect on the next deadline check; 0 clears it.
    pub fn set_alarm(&mut self, alarm_time: i64) {
        self.alarm_time = alarm_time.max(0);
        self.woken = false;
    }

    pub fn deadline_reached(&self, now_ms: i64) -> bool {
        deadline_reached(now_ms, self.alarm_time)
    }

    /// Marks the session as woken; returns false if it already was.
    pub fn mark_woken(&mut self) -> bool {
        !std::mem::replace(&mut self.woken, true)
    }

    /// True exactly once per deadline: in the smart window, in a light phase.
    pub fn check_smart_wake(&mut self, now_ms: i64, phase: SleepPhase) -> bool {
        let Some(window_ms) = self.smart_window_ms else {
            return false;
        };
        if !phase.is_light() || !in_smart_window(now_ms, self.alarm_time, window_ms) {
            return false;
        }
        self.mark_woken()
    }

    /// Timestamps never precede the session start and strictly increase.
    pub fn record(&mut self, now_ms: i64, frame: &SignalFrame, phase: SleepPhase) -> Sample {
        let mut timestamp = now_ms.max(self.session_start);
        if let Some(last) = self.last_timestamp {
            timestamp = timestamp.max(last + 1);
        }
        self.last_timestamp = Some(timestamp);

        Sample::new(
            timestamp,
            frame.motion,
            frame.audio_level,
            self.session_start,
            self.alarm_time,
            phase,
        )
    }
}
