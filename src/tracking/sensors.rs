use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::signal::{SignalFrame, SignalPreprocessor};

use super::clock::Clock;

/// Accelerometer provider. Once started it pushes every event into the hub
/// from its own callback context.
pub trait MotionSource: Send + Sync {
    fn start(&self, hub: SensorHub) -> Result<()>;
    fn stop(&self);
}

/// Microphone provider, polled once per tick.
pub trait AudioSource: Send + Sync {
    fn start(&self) -> Result<()>;
    /// Peak amplitude (0..=32767) since the previous poll, `None` when nothing new.
    fn poll_amplitude(&self) -> Result<Option<f32>>;
    fn stop(&self);
}

/// Shared handle to a session's preprocessor. Sensor callbacks write through it
/// while the tick loop reads frames.
#[derive(Clone)]
pub struct SensorHub {
    preprocessor: Arc<Mutex<SignalPreprocessor>>,
    clock: Arc<dyn Clock>,
}

impl SensorHub {
    pub fn new(preprocessor: SignalPreprocessor, clock: Arc<dyn Clock>) -> Self {
        Self {
            preprocessor: Arc::new(Mutex::new(preprocessor)),
            clock,
        }
    }

    pub fn on_acceleration(&self, x: f32, y: f32, z: f32) {
        let now_ms = self.clock.now_ms();
        self.lock().on_acceleration([x, y, z], now_ms);
    }

    pub fn on_amplitude(&self, raw_amplitude: f32) {
        let now_ms = self.clock.now_ms();
        self.lock().on_amplitude(raw_amplitude, now_ms);
    }

    pub fn frame(&self) -> SignalFrame {
        self.lock().frame()
    }

    pub fn last_significant_motion_ms(&self) -> Option<i64> {
        self.lock().last_significant_motion_ms()
    }

    pub fn last_snore_ms(&self) -> Option<i64> {
        self.lock().last_snore_ms()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> MutexGuard<'_, SignalPreprocessor> {
        match self.preprocessor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::clock::SystemClock;

    #[test]
    fn callbacks_from_other_threads_reach_the_frame() {
        let hub = SensorHub::new(SignalPreprocessor::new(1.0, 1.0), Arc::new(SystemClock));

        let writer = hub.clone();
        std::thread::spawn(move || {
            for _ in 0..10 {
                writer.on_acceleration(0.0, 0.0, 9.81);
                writer.on_acceleration(6.0, 0.0, 9.81);
            }
        })
        .join()
        .unwrap();

        hub.on_amplitude(16_384.0);
        let frame = hub.frame();
        assert!(frame.motion > 0.0);
        assert!((frame.audio_level - 0.5).abs() < 0.01);

        hub.reset();
        assert_eq!(hub.frame(), SignalFrame::default());
    }
}
