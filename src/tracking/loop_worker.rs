use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::{
    sync::{broadcast, mpsc::UnboundedSender, watch, Mutex},
    time::{Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{db::models::Sample, phase::PhaseClassifier};

use super::{
    clock::Clock,
    events::{TrackingEvent, WakeReason},
    recorder::SampleRecorder,
    sensors::{AudioSource, SensorHub},
    state::TrackingState,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Why the tick loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    AlarmDeadline,
    StorageUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Recorded,
    DeadlineReached,
}

/// Everything one tracking session's tick loop owns. The classifier and
/// recorder live only here and are dropped when the loop returns.
pub struct TrackingLoop {
    pub hub: SensorHub,
    pub audio: Arc<dyn AudioSource>,
    pub classifier: PhaseClassifier,
    pub recorder: SampleRecorder,
    pub clock: Arc<dyn Clock>,
    pub tick_interval: Duration,
    pub samples: UnboundedSender<Sample>,
    pub events: broadcast::Sender<TrackingEvent>,
    pub alarm: watch::Receiver<i64>,
    pub state: Arc<Mutex<TrackingState>>,
}

pub async fn tracking_loop(
    mut run: TrackingLoop,
    cancel_token: CancellationToken,
    storage_lost: CancellationToken,
) -> LoopExit {
    let period = run.tick_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let session_start = run.recorder.session_start();
    log_info!(
        "tracking loop started for session {} (tick {}ms)",
        session_start,
        period.as_millis()
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("tracking loop for session {} shutting down", session_start);
                return LoopExit::Cancelled;
            }
            _ = storage_lost.cancelled() => {
                log_error!("stopping session {}: storage unavailable", session_start);
                return LoopExit::StorageUnavailable;
            }
            _ = ticker.tick() => {
                match run.tick().await {
                    Ok(TickOutcome::Recorded) => {}
                    Ok(TickOutcome::DeadlineReached) => {
                        log_info!("alarm deadline reached for session {}", session_start);
                        return LoopExit::AlarmDeadline;
                    }
                    Err(err) => {
                        log_error!("tracking tick failed for session {}: {err:?}", session_start);
                        if run.samples.is_closed() {
                            return LoopExit::StorageUnavailable;
                        }
                    }
                }
            }
        }
    }
}

impl TrackingLoop {
    async fn tick(&mut self) -> Result<TickOutcome> {
        let now = self.clock.now_ms();

        if self.alarm.has_changed().unwrap_or(false) {
            let alarm_time = *self.alarm.borrow_and_update();
            log_info!("alarm for session {} moved to {}", self.recorder.session_start(), alarm_time);
            self.recorder.set_alarm(alarm_time);
            let mut state = self.state.lock().await;
            state.alarm_time = alarm_time;
            state.woken = false;
        }

        if self.recorder.deadline_reached(now) {
            if self.recorder.mark_woken() {
                self.publish(TrackingEvent::WakeNow {
                    reason: WakeReason::Deadline,
                    at: now,
                });
            }
            self.state.lock().await.woken = true;
            return Ok(TickOutcome::DeadlineReached);
        }

        // A failed poll still records a sample from the last known level.
        match self.audio.poll_amplitude() {
            Ok(Some(amplitude)) => self.hub.on_amplitude(amplitude),
            Ok(None) => {}
            Err(err) => log_warn!("microphone poll failed: {err:?}"),
        }

        let frame = self.hub.frame();
        let update = self.classifier.classify(&frame, now);
        let sample = self.recorder.record(now, &frame, update.phase);

        self.samples
            .send(sample.clone())
            .map_err(|_| anyhow!("sample writer has shut down"))
            .context("failed to queue sample")?;

        {
            let mut state = self.state.lock().await;
            state.record(update.phase);
        }

        if update.changed() {
            self.publish(TrackingEvent::PhaseChanged {
                from: update.previous,
                to: update.phase,
                at: sample.timestamp,
            });
        }
        log_debug!(
            "sample at {}: motion={:.3} audio={:.3} phase={}",
            sample.timestamp,
            sample.motion,
            sample.audio_level,
            update.phase
        );
        self.publish(TrackingEvent::SampleRecorded {
            phase: update.phase,
            sample,
        });

        if self.recorder.check_smart_wake(now, update.phase) {
            log_info!("smart alarm: {} inside the wake window", update.phase);
            self.state.lock().await.woken = true;
            self.publish(TrackingEvent::WakeNow {
                reason: WakeReason::Smart,
                at: now,
            });
        }

        Ok(TickOutcome::Recorded)
    }

    fn publish(&self, event: TrackingEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
