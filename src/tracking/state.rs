use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::phase::SleepPhase;

use super::events::StopReason;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    #[default]
    Idle,
    Tracking,
    Stopped,
}

/// Snapshot of the tracking subsystem as seen by the host.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub status: TrackingStatus,
    pub session_start: Option<i64>,
    pub alarm_time: i64,
    pub started_at: Option<DateTime<Utc>>,
    /// Live phase; `None` when no session is running.
    pub phase: Option<SleepPhase>,
    pub samples_recorded: u64,
    pub woken: bool,
    pub last_stop: Option<StopReason>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.status == TrackingStatus::Tracking
    }

    pub fn begin_session(&mut self, session_start: i64, alarm_time: i64) {
        *self = Self {
            status: TrackingStatus::Tracking,
            session_start: Some(session_start),
            alarm_time,
            started_at: DateTime::from_timestamp_millis(session_start),
            phase: Some(SleepPhase::Awake),
            samples_recorded: 0,
            woken: false,
            last_stop: None,
        };
    }

    pub fn record(&mut self, phase: SleepPhase) {
        self.phase = Some(phase);
        self.samples_recorded += 1;
    }

    /// Keeps the session identity and counters for display; drops the live phase.
    pub fn finish(&mut self, reason: StopReason) {
        self.status = TrackingStatus::Stopped;
        self.phase = None;
        self.last_stop = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lifecycle() {
        let mut state = TrackingState::new();
        assert!(!state.is_active());

        state.begin_session(1_700_000_000_000, 0);
        assert!(state.is_active());
        assert_eq!(state.phase, Some(SleepPhase::Awake));
        assert!(state.started_at.is_some());

        state.record(SleepPhase::LightSleep);
        state.record(SleepPhase::LightSleep);
        assert_eq!(state.samples_recorded, 2);

        state.finish(StopReason::UserRequest);
        assert_eq!(state.status, TrackingStatus::Stopped);
        assert_eq!(state.phase, None);
        assert_eq!(state.session_start, Some(1_700_000_000_000));
        assert_eq!(state.last_stop, Some(StopReason::UserRequest));
    }
}
