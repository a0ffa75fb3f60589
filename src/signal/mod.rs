//! Signal preprocessing: raw accelerometer vectors and microphone peak amplitudes
//! in, smoothed scalar motion and audio levels out.

pub mod audio;
pub mod motion;
pub mod window;

pub use audio::{AudioFilter, AudioReading, SNORE_THRESHOLD};
pub use motion::{MotionFilter, MotionReading};
pub use window::MovingWindow;

/// Smoothed values handed to the phase classifier on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalFrame {
    pub motion: f32,
    pub audio_level: f32,
    pub motion_variance: f32,
    pub is_snoring: bool,
}

/// Owns both filters for one tracking session.
#[derive(Debug, Clone)]
pub struct SignalPreprocessor {
    motion: MotionFilter,
    audio: AudioFilter,
}

impl SignalPreprocessor {
    pub fn new(motion_gain: f32, audio_gain: f32) -> Self {
        Self {
            motion: MotionFilter::new(motion_gain),
            audio: AudioFilter::new(audio_gain),
        }
    }

    pub fn on_acceleration(&mut self, raw: [f32; 3], now_ms: i64) -> MotionReading {
        self.motion.process(raw, now_ms)
    }

    pub fn on_amplitude(&mut self, raw_amplitude: f32, now_ms: i64) -> AudioReading {
        self.audio.process(raw_amplitude, now_ms)
    }

    /// Latest smoothed values; zeros until data arrives.
    pub fn frame(&self) -> SignalFrame {
        let motion = self.motion.last();
        let audio = self.audio.last();
        SignalFrame {
            motion: motion.average,
            audio_level: audio.average,
            motion_variance: motion.variance,
            is_snoring: audio.is_snoring,
        }
    }

    pub fn last_significant_motion_ms(&self) -> Option<i64> {
        self.motion.last_significant_motion_ms()
    }

    pub fn last_snore_ms(&self) -> Option<i64> {
        self.audio.last_snore_ms()
    }

    pub fn reset(&mut self) {
        self.motion.reset();
        self.audio.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_defaults_to_zero_before_any_data() {
        let preprocessor = SignalPreprocessor::new(1.0, 1.0);
        assert_eq!(preprocessor.frame(), SignalFrame::default());
    }

    #[test]
    fn frame_reflects_latest_readings() {
        let mut preprocessor = SignalPreprocessor::new(1.0, 1.0);
        preprocessor.on_acceleration([0.0, 0.0, 9.8], 0);
        preprocessor.on_amplitude(audio::MAX_AMPLITUDE / 2.0, 0);

        let frame = preprocessor.frame();
        assert!(frame.motion > 0.0);
        assert!((frame.audio_level - 0.5).abs() < 1e-6);

        preprocessor.reset();
        assert_eq!(preprocessor.frame(), SignalFrame::default());
    }
}
