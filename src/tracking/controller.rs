use std::sync::Arc;

use log::{error, info, warn};
use tokio::{
    sync::{broadcast, mpsc, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::SampleStore,
    error::TrackingError,
    phase::{ClassifierConfig, PhaseClassifier},
    settings::TrackingSettings,
    signal::SignalPreprocessor,
};

use super::{
    clock::{Clock, SystemClock},
    events::{StopReason, TrackingEvent},
    loop_worker::{tracking_loop, LoopExit, TrackingLoop},
    recorder::SampleRecorder,
    sensors::{AudioSource, MotionSource, SensorHub},
    state::TrackingState,
    writer::{persistence_loop, WriterReport},
};

/// Tick-loop tuning that is not exposed as a user setting.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub classifier: ClassifierConfig,
    /// Most samples written in one storage call.
    pub write_batch_size: usize,
    /// Consecutive failed writes before storage is declared unavailable.
    pub max_consecutive_write_failures: u32,
    pub event_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            write_batch_size: 32,
            max_consecutive_write_failures: 5,
            event_capacity: 256,
        }
    }
}

struct ActiveRun {
    session_start: i64,
    cancel_token: CancellationToken,
    stop_reason: watch::Sender<StopReason>,
    alarm: watch::Sender<i64>,
    handle: JoinHandle<StopReason>,
}

/// Owns at most one tracking session: its tick loop, its writer task and the
/// sensor sources for as long as the session runs.
pub struct TrackingController {
    store: Arc<dyn SampleStore>,
    motion: Arc<dyn MotionSource>,
    audio: Arc<dyn AudioSource>,
    clock: Arc<dyn Clock>,
    config: TrackingConfig,
    events: broadcast::Sender<TrackingEvent>,
    state: Arc<Mutex<TrackingState>>,
    active: Mutex<Option<ActiveRun>>,
}

impl TrackingController {
    pub fn new(
        store: Arc<dyn SampleStore>,
        motion: Arc<dyn MotionSource>,
        audio: Arc<dyn AudioSource>,
        config: TrackingConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            store,
            motion,
            audio,
            clock: Arc::new(SystemClock),
            config,
            events,
            state: Arc::new(Mutex::new(TrackingState::new())),
            active: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> TrackingState {
        self.state.lock().await.clone()
    }

    pub async fn is_tracking(&self) -> bool {
        self.state.lock().await.is_active()
    }

    /// Start a new session at the current time. `alarm_time` is the hard
    /// deadline in epoch millis, 0 for none.
    ///
    /// A session that is already running is stopped first and reported as
    /// `Replaced`. Nothing is acquired unless the settings and alarm are valid.
    pub async fn start_tracking(
        &self,
        settings: &TrackingSettings,
        alarm_time: i64,
    ) -> Result<TrackingState, TrackingError> {
        settings
            .validate()
            .map_err(|err| TrackingError::invalid(err.to_string()))?;

        let mut active = self.active.lock().await;

        let now = self.clock.now_ms();
        let previous_start = self.state.lock().await.session_start;
        let session_start = previous_start.map_or(now, |prev| now.max(prev + 1));
        let recorder = SampleRecorder::new(session_start, alarm_time, settings.smart_window_ms())?;

        self.store
            .check_available()
            .await
            .map_err(TrackingError::Storage)?;

        if let Some(previous) = active.take() {
            info!(
                "replacing active session {} with a new session",
                previous.session_start
            );
            self.finish_run(previous, StopReason::Replaced).await;
        }

        let hub = SensorHub::new(
            SignalPreprocessor::new(settings.motion_gain(), settings.audio_gain()),
            Arc::clone(&self.clock),
        );

        self.motion
            .start(hub.clone())
            .map_err(|source| TrackingError::ResourceUnavailable {
                resource: "motion sensor",
                source,
            })?;
        if let Err(source) = self.audio.start() {
            self.motion.stop();
            return Err(TrackingError::ResourceUnavailable {
                resource: "microphone",
                source,
            });
        }

        let cancel_token = CancellationToken::new();
        let storage_lost = CancellationToken::new();
        let (stop_reason_tx, stop_reason_rx) = watch::channel(StopReason::UserRequest);
        let (alarm_tx, alarm_rx) = watch::channel(alarm_time);
        let (samples_tx, samples_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(persistence_loop(
            Arc::clone(&self.store),
            samples_rx,
            self.config.write_batch_size,
            self.config.max_consecutive_write_failures,
            storage_lost.clone(),
        ));

        {
            let mut state = self.state.lock().await;
            state.begin_session(session_start, alarm_time);
        }

        let tracking = TrackingLoop {
            hub,
            audio: Arc::clone(&self.audio),
            classifier: PhaseClassifier::new(self.config.classifier.clone(), session_start),
            recorder,
            clock: Arc::clone(&self.clock),
            tick_interval: settings.tick_interval(),
            samples: samples_tx,
            events: self.events.clone(),
            alarm: alarm_rx,
            state: Arc::clone(&self.state),
        };

        let handle = tokio::spawn(run_session(SessionTask {
            tracking,
            writer,
            cancel_token: cancel_token.clone(),
            storage_lost,
            requested_stop: stop_reason_rx,
            motion: Arc::clone(&self.motion),
            audio: Arc::clone(&self.audio),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        }));

        *active = Some(ActiveRun {
            session_start,
            cancel_token,
            stop_reason: stop_reason_tx,
            alarm: alarm_tx,
            handle,
        });

        info!(
            "tracking started for session {} (alarm {}, tick {}s)",
            session_start, alarm_time, settings.update_interval
        );
        Ok(self.state().await)
    }

    /// Stop the active session and wait until everything queued is persisted.
    /// A no-op when nothing is running.
    pub async fn stop_tracking(&self) -> TrackingState {
        let run = self.active.lock().await.take();
        if let Some(run) = run {
            self.finish_run(run, StopReason::UserRequest).await;
        }
        self.state().await
    }

    /// Move the deadline of the running session; a time in the past fires on
    /// the next tick. 0 removes the deadline.
    pub async fn set_alarm(&self, alarm_time: i64) -> Result<(), TrackingError> {
        if alarm_time < 0 {
            return Err(TrackingError::invalid(format!(
                "alarm time must not be negative, got {alarm_time}"
            )));
        }

        let active = self.active.lock().await;
        let Some(run) = active.as_ref().filter(|run| !run.handle.is_finished()) else {
            return Err(TrackingError::invalid("no active tracking session"));
        };
        run.alarm.send_replace(alarm_time);
        self.state.lock().await.alarm_time = alarm_time;
        info!("alarm for session {} set to {}", run.session_start, alarm_time);
        Ok(())
    }

    async fn finish_run(&self, run: ActiveRun, reason: StopReason) {
        let _ = run.stop_reason.send(reason);
        run.cancel_token.cancel();

        if let Err(err) = run.handle.await {
            error!(
                "tracking task for session {} failed to join: {err}",
                run.session_start
            );
            self.motion.stop();
            self.audio.stop();
            self.state.lock().await.finish(reason);
        }
    }
}

struct SessionTask {
    tracking: TrackingLoop,
    writer: JoinHandle<WriterReport>,
    cancel_token: CancellationToken,
    storage_lost: CancellationToken,
    requested_stop: watch::Receiver<StopReason>,
    motion: Arc<dyn MotionSource>,
    audio: Arc<dyn AudioSource>,
    state: Arc<Mutex<TrackingState>>,
    events: broadcast::Sender<TrackingEvent>,
}

/// Runs one session to completion: tick loop, then writer drain, then release
/// of the sensor sources. Emits exactly one `Stopped` event.
async fn run_session(task: SessionTask) -> StopReason {
    let SessionTask {
        tracking,
        writer,
        cancel_token,
        storage_lost,
        requested_stop,
        motion,
        audio,
        state,
        events,
    } = task;

    let session_start = tracking.recorder.session_start();
    let hub = tracking.hub.clone();

    // Consumes the loop; its queue sender drops here and the writer drains.
    let exit = tracking_loop(tracking, cancel_token, storage_lost).await;

    let report = match writer.await {
        Ok(report) => report,
        Err(err) => {
            error!("sample writer for session {session_start} failed to join: {err}");
            WriterReport::default()
        }
    };

    motion.stop();
    audio.stop();
    hub.reset();

    let reason = match exit {
        LoopExit::Cancelled => *requested_stop.borrow(),
        LoopExit::AlarmDeadline => StopReason::AlarmDeadline,
        LoopExit::StorageUnavailable => StopReason::StorageUnavailable,
    };

    if report.dropped > 0 {
        warn!(
            "session {session_start} lost {} samples to storage failures",
            report.dropped
        );
    }
    info!(
        "session {session_start} stopped ({reason:?}), {} samples persisted",
        report.persisted
    );

    state.lock().await.finish(reason);
    let _ = events.send(TrackingEvent::Stopped {
        session_start,
        reason,
    });
    reason
}
