use super::window::MovingWindow;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Full-scale value of a 16-bit microphone peak-amplitude reading.
pub const MAX_AMPLITUDE: f32 = 32_767.0;
pub const NOISE_WINDOW_SIZE: usize = 20;
/// Audio level loud enough to count as snoring.
pub const SNORE_THRESHOLD: f32 = 0.4;
/// Rise-fall-rise shapes needed in a full window before it reads as snoring.
const SNORE_PATTERN_MIN_MATCHES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioReading {
    /// Normalized, gain-scaled amplitude of the latest reading in `[0, 1]`.
    pub amplitude: f32,
    /// Window average in `[0, 1]`.
    pub average: f32,
    pub is_snoring: bool,
}

#[derive(Debug, Clone)]
pub struct AudioFilter {
    window: MovingWindow,
    gain: f32,
    last: AudioReading,
    last_snore_ms: Option<i64>,
}

impl AudioFilter {
    pub fn new(gain: f32) -> Self {
        Self {
            window: MovingWindow::new(NOISE_WINDOW_SIZE),
            gain,
            last: AudioReading::default(),
            last_snore_ms: None,
        }
    }

    /// Feed one raw peak-amplitude reading (0..=32767).
    pub fn process(&mut self, raw_amplitude: f32, now_ms: i64) -> AudioReading {
        let raw = if raw_amplitude.is_finite() && raw_amplitude >= 0.0 {
            raw_amplitude
        } else {
            log_warn!("Replacing invalid microphone amplitude {raw_amplitude} with 0");
            0.0
        };

        let amplitude = (raw / MAX_AMPLITUDE * self.gain).clamp(0.0, 1.0);
        self.window.push(amplitude);

        let is_snoring = detect_snoring(&self.window);
        if is_snoring {
            self.last_snore_ms = Some(now_ms);
        }

        self.last = AudioReading {
            amplitude,
            average: self.window.average().clamp(0.0, 1.0),
            is_snoring,
        };
        self.last
    }

    pub fn last(&self) -> AudioReading {
        self.last
    }

    pub fn last_snore_ms(&self) -> Option<i64> {
        self.last_snore_ms
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.gain);
    }
}

/// Snoring shows up as a rhythmic rise-fall-rise pattern at a loud average level.
fn detect_snoring(window: &MovingWindow) -> bool {
    if !window.is_full() {
        return false;
    }

    let values: Vec<f32> = window.iter().copied().collect();
    let matches = values
        .windows(4)
        .filter(|w| w[0] < w[1] && w[1] > w[2] && w[2] < w[3])
        .count();

    matches >= SNORE_PATTERN_MIN_MATCHES && window.average() > SNORE_THRESHOLD
}
