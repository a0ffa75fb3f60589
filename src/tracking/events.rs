use serde::Serialize;

use crate::{db::models::Sample, phase::SleepPhase};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WakeReason {
    /// Light sleep inside the smart-alarm window.
    Smart,
    /// Hard deadline reached.
    Deadline,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    UserRequest,
    AlarmDeadline,
    StorageUnavailable,
    /// A new session was started while this one was active.
    Replaced,
}

/// Notifications published by the tracking controller.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackingEvent {
    #[serde(rename_all = "camelCase")]
    SampleRecorded { phase: SleepPhase, sample: Sample },
    #[serde(rename_all = "camelCase")]
    PhaseChanged {
        from: SleepPhase,
        to: SleepPhase,
        at: i64,
    },
    /// The alarm collaborator should fire now.
    #[serde(rename_all = "camelCase")]
    WakeNow { reason: WakeReason, at: i64 },
    #[serde(rename_all = "camelCase")]
    Stopped {
        session_start: i64,
        reason: StopReason,
    },
}
